//! `jsv` is a JSON Schema evaluator supporting drafts 6 through "next"
//! of the [JSON Schema][json-schema] specification.
//!
//! A schema is parsed once into a keyword-typed document, initialized
//! (identifiers resolved, anchors collected, resource roots registered),
//! compiled into a constraint graph cached per dynamic scope, and then
//! evaluated against any number of instances — concurrently, if you
//! like.
//!
//! # Evaluating instances
//!
//! ```
//! use serde_json::json;
//! use jsv::{Draft, EvalOptions, OutputFormat, Schema};
//! use failure::Error;
//!
//! fn main() -> Result<(), Error> {
//!     let schema: Schema = serde_json::from_value(json!({
//!         "$id": "https://example.com/person",
//!         "type": "object",
//!         "properties": {
//!             "name": {"type": "string"},
//!             "age": {"type": "integer", "minimum": 0},
//!         },
//!         "required": ["name"],
//!     }))?;
//!
//!     // The default output is a bare verdict.
//!     let ok = schema.evaluate(&json!({"name": "Ada", "age": 36}), &EvalOptions::new())?;
//!     assert!(ok.valid());
//!
//!     // The hierarchical format keeps the full diagnostic tree.
//!     let mut options = EvalOptions::new();
//!     options.output_format(OutputFormat::Hierarchical);
//!     let results = schema.evaluate(&json!({"age": -3}), &options)?;
//!     assert!(!results.valid());
//!
//!     // The failures sit where the schema put them: `required` at the
//!     // root, `minimum` under /properties/age.
//!     let flat = results.flatten();
//!     assert!(flat
//!         .iter()
//!         .any(|node| node.errors().iter().any(|(kw, _)| kw == "required")));
//!     assert!(flat.iter().any(|node| {
//!         node.evaluation_path().to_string() == "/properties/age"
//!             && node.errors().iter().any(|(kw, _)| kw == "minimum")
//!     }));
//!
//!     // The draft was detected from the keywords; you can also pin it.
//!     let mut pinned = EvalOptions::new();
//!     pinned.evaluate_as(Draft::Draft202012);
//!     assert!(schema.evaluate(&json!({"name": "Ada"}), &pinned)?.valid());
//!     Ok(())
//! }
//! ```
//!
//! # References, anchors, and dynamic scope
//!
//! Schemas may reference themselves and one another with `$ref`,
//! `$dynamicRef`, and `$recursiveRef`; identifiers resolve through a
//! [`Registry`](struct.Registry.html). The process-wide default registry
//! holds the bundled meta-schemas, and every evaluation registers the
//! resource roots it initializes. Pass a per-call registry through
//! [`EvalOptions::registry`](struct.EvalOptions.html#method.registry) to
//! keep test schemas out of the shared namespace, and a
//! [`Resolver`](trait.Resolver.html) to supply documents the registry
//! does not hold.
//!
//! # Failure messages
//!
//! Failure messages render from an overridable table keyed by keyword
//! and culture; see the [`messages`](messages/index.html) module.
//!
//! [json-schema]: https://json-schema.org

#[macro_use]
pub mod errors;

mod compile;
mod init;
mod vm;

pub mod draft;
pub mod messages;
pub mod output;
pub mod registry;
pub mod schema;
pub mod serde;
pub mod validator;

pub(crate) mod keywords;

pub use crate::draft::Draft;
pub use crate::errors::JsvError;
pub use crate::output::{OutputFormat, Results};
pub use crate::registry::{global as global_registry, Registry, Resolver};
pub use crate::schema::Schema;
pub use crate::validator::EvalOptions;

use serde_json::Value;

/// Validates `instance` against `schema` with default options. The
/// draft is detected automatically; schema errors count as invalid.
pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    Schema::from_value(schema)
        .and_then(|parsed| parsed.evaluate(instance, &EvalOptions::new()))
        .map(|results| results.valid())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_valid() {
        let schema = json!({"minLength": 5});
        let valid = json!("foobar");
        let invalid = json!("foo");
        assert!(is_valid(&schema, &valid));
        assert!(!is_valid(&schema, &invalid));
    }

    #[test]
    fn malformed_schemas_are_simply_invalid() {
        assert!(!is_valid(&json!(42), &json!("anything")));
    }
}
