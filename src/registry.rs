//! The schema registry: absolute identifiers mapped to schema documents.
//!
//! Every resource root a schema tree declares is registered here during
//! initialization, and every reference resolves through here. A
//! process-wide default registry (preloaded with the bundled
//! meta-schemas) backs all evaluations unless a call supplies its own;
//! per-call registries still fall back to the default for anything they
//! do not contain, so the meta-schemas are always reachable.

use crate::draft::Draft;
use crate::errors::JsvError;
use crate::init;
use crate::schema::{self, Schema, SchemaRef};
use failure::Error;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Supplies schema documents for identifiers the registry does not hold.
///
/// The registry never fetches anything on its own; network access, file
/// access, and trust decisions all belong to the resolver you supply.
pub trait Resolver: Send + Sync {
    /// Returns the schema JSON for `id`, `Ok(None)` when the identifier
    /// is unknown, or an error to abort the evaluation.
    fn resolve(&self, id: &Url) -> Result<Option<Value>, Error>;
}

/// Maps absolute identifiers (fragments stripped) to schema documents.
///
/// ```
/// use jsv::{EvalOptions, Registry, Resolver, Schema};
/// use serde_json::{json, Value};
/// use failure::Error;
/// use url::Url;
/// use std::sync::Arc;
///
/// struct Fixtures;
///
/// impl Resolver for Fixtures {
///     fn resolve(&self, id: &Url) -> Result<Option<Value>, Error> {
///         // Your resolver decides what may be fetched; never execute
///         // arbitrary schemas from the network.
///         if id.as_str() == "https://schemas.example.com/user.json" {
///             Ok(Some(json!({
///                 "$id": "https://schemas.example.com/user.json",
///                 "type": "object",
///                 "required": ["name"],
///             })))
///         } else {
///             Ok(None)
///         }
///     }
/// }
///
/// fn main() -> Result<(), Error> {
///     let schema: Schema = serde_json::from_value(json!({
///         "$id": "https://schemas.example.com/roster.json",
///         "type": "array",
///         "items": {"$ref": "user.json"},
///     }))?;
///
///     let registry = Arc::new(Registry::new());
///     let mut options = EvalOptions::new();
///     options.registry(registry.clone()).resolver(Arc::new(Fixtures));
///
///     let results = schema.evaluate(&json!([{"name": "ada"}]), &options)?;
///     assert!(results.valid());
///
///     // The fetched document is registered for later calls.
///     let id: Url = "https://schemas.example.com/user.json".parse()?;
///     assert!(registry.get(&id).is_some());
///     Ok(())
/// }
/// ```
pub struct Registry {
    schemas: Mutex<HashMap<Url, SchemaRef>>,
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Registry {
    /// Constructs a new, empty registry.
    pub fn new() -> Registry {
        Registry {
            schemas: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a schema under an identifier. The fragment is ignored.
    ///
    /// Registering the same schema twice is a no-op; registering a
    /// *different* schema under an identifier already taken fails with
    /// `DuplicateRegistration`.
    pub fn register(&self, id: &Url, schema: &Schema) -> Result<(), Error> {
        self.register_node(&init::strip_fragment(id), &schema.root)
    }

    pub(crate) fn register_node(&self, id: &Url, node: &SchemaRef) -> Result<(), Error> {
        let mut schemas = self.schemas.lock();
        if let Some(existing) = schemas.get(id) {
            if Arc::ptr_eq(existing, node) {
                return Ok(());
            }
            fail!(JsvError::DuplicateRegistration {
                uri: id.to_string(),
            });
        }
        schemas.insert(id.clone(), node.clone());
        Ok(())
    }

    /// Looks up a schema in this registry alone.
    pub fn get(&self, id: &Url) -> Option<Schema> {
        self.get_node(&init::strip_fragment(id))
            .map(|root| Schema { root })
    }

    pub(crate) fn get_node(&self, id: &Url) -> Option<SchemaRef> {
        self.schemas.lock().get(id).cloned()
    }

    /// Looks up a schema here, then in the default registry, then — if a
    /// resolver is supplied — fetches, initializes, and registers it.
    pub fn fetch(
        &self,
        id: &Url,
        resolver: Option<&dyn Resolver>,
    ) -> Result<Option<Schema>, Error> {
        Ok(self
            .fetch_node(&init::strip_fragment(id), resolver)?
            .map(|root| Schema { root }))
    }

    pub(crate) fn fetch_node(
        &self,
        id: &Url,
        resolver: Option<&dyn Resolver>,
    ) -> Result<Option<SchemaRef>, Error> {
        if let Some(found) = self.get_node(id) {
            return Ok(Some(found));
        }
        let default = global();
        if !std::ptr::eq(self, default.as_ref() as *const Registry) {
            if let Some(found) = default.get_node(id) {
                return Ok(Some(found));
            }
        }
        if let Some(resolver) = resolver {
            if let Some(value) = resolver.resolve(id)? {
                let node = schema::parse_node(&value)?;
                // Register under the retrieval URI before initializing:
                // meta-schema chains that lead back here must find the
                // document instead of fetching it again, or a cyclic
                // chain would recurse forever.
                self.register_node(id, &node)?;
                init::initialize(
                    &node,
                    self,
                    Draft::Unspecified,
                    Some(resolver),
                    Some(id.clone()),
                )?;
                return Ok(Some(node));
            }
        }
        Ok(None)
    }
}

const BUNDLED_META_SCHEMAS: &[(Draft, &str)] = &[
    (Draft::Draft6, include_str!("metaschemas/draft6.json")),
    (Draft::Draft7, include_str!("metaschemas/draft7.json")),
    (Draft::Draft201909, include_str!("metaschemas/draft2019_09.json")),
    (Draft::Draft202012, include_str!("metaschemas/draft2020_12.json")),
    (Draft::DraftNext, include_str!("metaschemas/draft_next.json")),
];

lazy_static! {
    static ref GLOBAL: Arc<Registry> = Arc::new(bundled());
}

fn bundled() -> Registry {
    let registry = Registry::new();
    for (draft, source) in BUNDLED_META_SCHEMAS {
        let value: Value =
            serde_json::from_str(source).expect("bundled meta-schemas are valid JSON");
        let node = schema::parse_node(&value).expect("bundled meta-schemas parse");
        init::initialize(&node, &registry, *draft, None, None)
            .expect("bundled meta-schemas initialize");
    }
    registry
}

/// The process-wide default registry, holding the bundled meta-schemas
/// plus everything initialized without a per-call registry override.
pub fn global() -> Arc<Registry> {
    GLOBAL.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_registration_of_a_different_schema_fails() {
        let registry = Registry::new();
        let id: Url = "https://example.com/dup".parse().unwrap();

        let first = Schema::from_value(&json!({"type": "string"})).unwrap();
        let second = Schema::from_value(&json!({"type": "integer"})).unwrap();

        registry.register(&id, &first).unwrap();
        // The same schema again is fine; a different one is not.
        registry.register(&id, &first).unwrap();
        let err = registry.register(&id, &second).unwrap_err();
        assert!(err.to_string().contains("already registered"));

        // The failed registration did not clobber the original.
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn identifiers_compare_with_fragments_stripped() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!(true)).unwrap();
        let plain: Url = "https://example.com/frag".parse().unwrap();
        let with_fragment: Url = "https://example.com/frag#/defs/a".parse().unwrap();

        registry.register(&with_fragment, &schema).unwrap();
        assert!(registry.get(&plain).is_some());
    }

    #[test]
    fn the_default_registry_holds_every_bundled_meta_schema() {
        let default = global();
        for id in &[
            "http://json-schema.org/draft-06/schema",
            "http://json-schema.org/draft-07/schema",
            "https://json-schema.org/draft/2019-09/schema",
            "https://json-schema.org/draft/2020-12/schema",
            "https://json-schema.org/draft/next/schema",
        ] {
            let url: Url = id.parse().unwrap();
            assert!(default.get(&url).is_some(), "missing meta-schema {}", id);
        }
    }

    #[test]
    fn per_call_registries_fall_back_to_the_default() {
        let local = Registry::new();
        let meta: Url = "https://json-schema.org/draft/2020-12/schema".parse().unwrap();
        assert!(local.get(&meta).is_none());
        assert!(local.fetch_node(&meta, None).unwrap().is_some());
    }
}
