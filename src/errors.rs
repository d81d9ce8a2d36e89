//! An error type for all schema-evaluation operations.

use crate::draft::Draft;
use failure::Fail;

/// Returns early with a typed error. `failure::bail!` flattens its
/// argument into a message string; this keeps the [`JsvError`] kind
/// intact so callers can downcast on it.
macro_rules! fail {
    ($e:expr) => {
        return Err(::failure::Error::from($e))
    };
}

/// An enum of possible errors that can emerge from this crate.
///
/// A negative validation outcome is *not* an error: evaluating an
/// instance that does not conform to its schema produces a
/// [`Results`](../output/struct.Results.html) tree with `valid == false`.
/// The variants here all abort the operation that raised them.
#[derive(Debug, Fail, PartialEq)]
pub enum JsvError {
    /// The schema JSON is malformed, or a keyword's value does not
    /// satisfy that keyword's type or range constraints.
    ///
    /// `location` names the offending keyword, when one is known.
    #[fail(display = "schema parse error at {}: {}", location, reason)]
    Parse { location: String, reason: String },

    /// A schema uses a construct that is incompatible with the draft it
    /// is being evaluated under.
    ///
    /// For example, positional `items` under draft 2020-12 (which moved
    /// that form to `prefixItems`), or a fragment-only `$id` under
    /// drafts 2019-09 and later (which moved it to `$anchor`).
    #[fail(display = "keyword {} is not supported by {:?}", keyword, draft)]
    UnsupportedSchema { keyword: String, draft: Draft },

    /// A `$ref`, `$dynamicRef`, or `$recursiveRef` target could not be
    /// located in the registry or through the configured resolver.
    ///
    /// `evaluation_path` names the reference keyword that failed to
    /// resolve, so the caller can find it in a deeply nested schema.
    #[fail(display = "unresolved reference {} at {}", uri, evaluation_path)]
    UnresolvedReference {
        uri: String,
        evaluation_path: String,
    },

    /// A custom meta-schema chain does not terminate at a supported
    /// draft identifier.
    ///
    /// This is raised both when a chain cannot be fetched to its end and
    /// when it revisits an identifier it has already passed through, so
    /// multi-step cycles terminate rather than looping.
    #[fail(
        display = "meta-schema chain through {} does not resolve to a supported draft",
        uri
    )]
    UnresolvableMetaSchema { uri: String },

    /// Two distinct schemas attempted to register the same absolute
    /// identifier.
    ///
    /// Re-registering the *same* schema under its identifier is allowed,
    /// which is what makes initialization idempotent.
    #[fail(display = "schema already registered: {}", uri)]
    DuplicateRegistration { uri: String },

    /// The maximum reference depth was exceeded during evaluation.
    ///
    /// This likely means that your configured `max_depth` is too small,
    /// or that the schema contains a reference cycle that never consumes
    /// any of the instance, such as a bare `{"$ref": "#"}`.
    #[fail(display = "maximum reference depth exceeded during evaluation")]
    MaxDepthExceeded,
}
