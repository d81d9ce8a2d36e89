//! Draft identification and meta-schema recognition.
//!
//! Every schema is evaluated under exactly one draft of the JSON Schema
//! specification. The draft is either declared through `$schema`,
//! requested through [`EvalOptions::evaluate_as`](../validator/struct.EvalOptions.html#method.evaluate_as),
//! or detected from the keywords the schema uses.

use url::Url;

/// A published draft of the JSON Schema specification.
///
/// The ordering of the variants is the ordering of publication, so
/// `max` over a set of drafts yields the newest member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Draft {
    /// No draft requested; the engine detects one.
    Unspecified,
    /// `http://json-schema.org/draft-06/schema#`
    Draft6,
    /// `http://json-schema.org/draft-07/schema#`
    Draft7,
    /// `https://json-schema.org/draft/2019-09/schema`
    Draft201909,
    /// `https://json-schema.org/draft/2020-12/schema`
    Draft202012,
    /// `https://json-schema.org/draft/next/schema`
    DraftNext,
}

pub const META_DRAFT6: &str = "http://json-schema.org/draft-06/schema";
pub const META_DRAFT7: &str = "http://json-schema.org/draft-07/schema";
pub const META_DRAFT201909: &str = "https://json-schema.org/draft/2019-09/schema";
pub const META_DRAFT202012: &str = "https://json-schema.org/draft/2020-12/schema";
pub const META_DRAFT_NEXT: &str = "https://json-schema.org/draft/next/schema";

impl Draft {
    /// Recognizes a meta-schema identifier. The fragment is ignored, so
    /// both `.../draft-07/schema` and `.../draft-07/schema#` match.
    pub fn from_meta_schema(uri: &Url) -> Option<Draft> {
        let mut stripped = uri.clone();
        stripped.set_fragment(None);
        match stripped.as_str() {
            META_DRAFT6 => Some(Draft::Draft6),
            META_DRAFT7 => Some(Draft::Draft7),
            META_DRAFT201909 => Some(Draft::Draft201909),
            META_DRAFT202012 => Some(Draft::Draft202012),
            META_DRAFT_NEXT => Some(Draft::DraftNext),
            _ => None,
        }
    }

    /// The canonical identifier of this draft's meta-schema.
    pub fn meta_schema_id(self) -> Option<&'static str> {
        match self {
            Draft::Unspecified => None,
            Draft::Draft6 => Some(META_DRAFT6),
            Draft::Draft7 => Some(META_DRAFT7),
            Draft::Draft201909 => Some(META_DRAFT201909),
            Draft::Draft202012 => Some(META_DRAFT202012),
            Draft::DraftNext => Some(META_DRAFT_NEXT),
        }
    }

    /// Drafts 6 and 7 give `$ref` exclusive control of its schema
    /// object: sibling keywords are ignored and identifiers beneath the
    /// reference are not resolved.
    pub fn ref_takes_precedence(self) -> bool {
        matches!(self, Draft::Draft6 | Draft::Draft7)
    }

    fn bit(self) -> u8 {
        match self {
            Draft::Unspecified => 0,
            Draft::Draft6 => 1,
            Draft::Draft7 => 1 << 1,
            Draft::Draft201909 => 1 << 2,
            Draft::Draft202012 => 1 << 3,
            Draft::DraftNext => 1 << 4,
        }
    }
}

/// A set of drafts, used by keywords to declare which drafts they are
/// defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftSet(u8);

impl DraftSet {
    /// All supported drafts.
    pub const ALL: DraftSet = DraftSet(0b1_1111);
    /// Drafts 6 and 7 only.
    pub const LEGACY: DraftSet = DraftSet(0b0_0011);
    /// Draft 6 only.
    pub const SIX: DraftSet = DraftSet(0b0_0001);
    /// Draft 7 and later.
    pub const SEVEN_UP: DraftSet = DraftSet(0b1_1110);
    /// Draft 2019-09 and later.
    pub const MODERN: DraftSet = DraftSet(0b1_1100);
    /// Draft 2019-09 only.
    pub const NINETEEN: DraftSet = DraftSet(0b0_0100);
    /// Draft 2020-12 and later.
    pub const TWENTY_UP: DraftSet = DraftSet(0b1_1000);
    /// Drafts up to and including 2019-09.
    pub const THROUGH_NINETEEN: DraftSet = DraftSet(0b0_0111);

    pub fn contains(self, draft: Draft) -> bool {
        self.0 & draft.bit() != 0
    }

    pub fn intersect(self, other: DraftSet) -> DraftSet {
        DraftSet(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The newest draft in the set, if any.
    pub fn newest(self) -> Option<Draft> {
        [
            Draft::DraftNext,
            Draft::Draft202012,
            Draft::Draft201909,
            Draft::Draft7,
            Draft::Draft6,
        ]
        .iter()
        .copied()
        .find(|d| self.contains(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_schema_recognition() {
        let with_fragment: Url = "http://json-schema.org/draft-07/schema#".parse().unwrap();
        assert_eq!(Draft::from_meta_schema(&with_fragment), Some(Draft::Draft7));

        let bare: Url = "https://json-schema.org/draft/2020-12/schema".parse().unwrap();
        assert_eq!(Draft::from_meta_schema(&bare), Some(Draft::Draft202012));

        let custom: Url = "https://example.com/my-meta".parse().unwrap();
        assert_eq!(Draft::from_meta_schema(&custom), None);
    }

    #[test]
    fn newest_of_intersection() {
        let set = DraftSet::ALL.intersect(DraftSet::MODERN);
        assert_eq!(set.newest(), Some(Draft::DraftNext));

        let legacy = DraftSet::LEGACY.intersect(DraftSet::THROUGH_NINETEEN);
        assert_eq!(legacy.newest(), Some(Draft::Draft7));

        let empty = DraftSet::LEGACY.intersect(DraftSet::TWENTY_UP);
        assert!(empty.is_empty());
        assert_eq!(empty.newest(), None);
    }

    #[test]
    fn draft_ordering_is_publication_order() {
        assert!(Draft::Draft6 < Draft::Draft7);
        assert!(Draft::Draft7 < Draft::Draft201909);
        assert!(Draft::Draft202012 < Draft::DraftNext);
    }
}
