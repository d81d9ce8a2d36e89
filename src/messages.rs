//! Localized, overridable failure messages.
//!
//! Every failure a keyword records is rendered from a template selected
//! by (keyword name, culture identifier). Templates contain `[[name]]`
//! tokens that are substituted from the evaluator's named parameters.
//! Lookup falls back from the full culture (`de-DE`) through its
//! language (`de`) to the neutral culture.
//!
//! The table is writable so callers can localize or reword messages:
//!
//! ```
//! use jsv::messages;
//!
//! messages::set_message("minItems", "de", "mindestens [[limit]] Elemente erwartet");
//! assert_eq!(
//!     messages::get_message("minItems", "de-DE").unwrap(),
//!     "mindestens [[limit]] Elemente erwartet",
//! );
//! messages::reset();
//! ```

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// The neutral culture identifier.
pub const NEUTRAL: &str = "";

type Table = HashMap<String, HashMap<String, String>>;

lazy_static! {
    static ref MESSAGES: RwLock<Table> = RwLock::new(defaults());
}

fn defaults() -> Table {
    let neutral: &[(&str, &str)] = &[
        ("falseSchema", "All values fail against the false schema"),
        ("type", "Value is \"[[received]]\" but should be \"[[expected]]\""),
        ("enum", "Value should match one of the values specified by the enum"),
        ("const", "Expected [[expected]]"),
        ("minimum", "[[received]] should be at least [[limit]]"),
        ("maximum", "[[received]] should be at most [[limit]]"),
        ("exclusiveMinimum", "[[received]] should be greater than [[limit]]"),
        ("exclusiveMaximum", "[[received]] should be less than [[limit]]"),
        ("multipleOf", "[[received]] should be a multiple of [[divisor]]"),
        (
            "minLength",
            "Value should be at least [[limit]] characters long but was [[received]]",
        ),
        (
            "maxLength",
            "Value should be at most [[limit]] characters long but was [[received]]",
        ),
        ("pattern", "The string value should match the pattern [[pattern]]"),
        ("minItems", "Value should have at least [[limit]] items but had [[received]]"),
        ("maxItems", "Value should have at most [[limit]] items but had [[received]]"),
        ("uniqueItems", "Array items at [[duplicates]] are not unique"),
        (
            "contains",
            "The array should contain at least one item matching the subschema",
        ),
        (
            "minContains",
            "The array should contain at least [[limit]] matching items but had [[received]]",
        ),
        (
            "maxContains",
            "The array should contain at most [[limit]] matching items but had [[received]]",
        ),
        ("required", "Required properties [[missing]] are not present"),
        (
            "minProperties",
            "Value should have at least [[limit]] properties but had [[received]]",
        ),
        (
            "maxProperties",
            "Value should have at most [[limit]] properties but had [[received]]",
        ),
        (
            "dependentRequired",
            "Properties [[missing]] are required when [[property]] is present",
        ),
        (
            "dependencies",
            "Properties [[missing]] are required when [[property]] is present",
        ),
        ("allOf", "[[failed]] of the subschemas did not match"),
        ("anyOf", "Expected at least one matching subschema but none matched"),
        ("oneOf", "Expected exactly one matching subschema but [[count]] matched"),
        ("not", "The value matched the schema it must not match"),
        ("dependentSchemas", "The schemas for properties [[failed]] did not match"),
    ];

    let mut table = Table::new();
    let mut neutral_map = HashMap::with_capacity(neutral.len());
    for (keyword, template) in neutral {
        neutral_map.insert((*keyword).to_owned(), (*template).to_owned());
    }
    table.insert(NEUTRAL.to_owned(), neutral_map);
    table
}

/// Looks up the message template for a keyword, falling back from the
/// culture through its language tag to the neutral culture.
pub fn get_message(keyword: &str, culture: &str) -> Option<String> {
    let table = MESSAGES.read();
    let mut candidates = Vec::with_capacity(3);
    candidates.push(culture);
    if let Some(language) = culture.split('-').next() {
        if language != culture {
            candidates.push(language);
        }
    }
    if culture != NEUTRAL {
        candidates.push(NEUTRAL);
    }
    for candidate in candidates {
        if let Some(template) = table.get(candidate).and_then(|map| map.get(keyword)) {
            return Some(template.clone());
        }
    }
    None
}

/// Installs or replaces the message template for a keyword and culture.
pub fn set_message(keyword: &str, culture: &str, template: &str) {
    MESSAGES
        .write()
        .entry(culture.to_owned())
        .or_insert_with(HashMap::new)
        .insert(keyword.to_owned(), template.to_owned());
}

/// Restores the built-in messages, discarding every override. Intended
/// for test isolation.
pub fn reset() {
    *MESSAGES.write() = defaults();
}

/// Renders the message for a keyword, substituting `[[name]]` tokens
/// from the named parameters.
pub(crate) fn render(keyword: &str, culture: &str, params: &[(&str, Value)]) -> String {
    let mut message = get_message(keyword, culture)
        .unwrap_or_else(|| format!("Value fails against the {} keyword", keyword));
    for (name, value) in params {
        message = message.replace(&format!("[[{}]]", name), &value_text(value));
    }
    message
}

/// Strings substitute bare; everything else substitutes as JSON text.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokens_are_substituted() {
        let rendered = render(
            "minItems",
            NEUTRAL,
            &[("limit", json!(2)), ("received", json!(1))],
        );
        assert_eq!(rendered, "Value should have at least 2 items but had 1");
    }

    #[test]
    fn culture_lookup_falls_back_through_the_language() {
        set_message("minItems", "fr", "au moins [[limit]] éléments");
        assert_eq!(
            get_message("minItems", "fr-CA").unwrap(),
            "au moins [[limit]] éléments"
        );
        assert_eq!(
            get_message("minItems", "es").unwrap(),
            "Value should have at least [[limit]] items but had [[received]]"
        );
        reset();
    }

    #[test]
    fn overrides_replace_missing_builtins() {
        assert_eq!(
            render("x-custom", NEUTRAL, &[]),
            "Value fails against the x-custom keyword"
        );
        set_message("x-custom", NEUTRAL, "nothing is allowed here");
        assert_eq!(render("x-custom", NEUTRAL, &[]), "nothing is allowed here");
        reset();
    }
}
