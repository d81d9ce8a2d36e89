//! The in-memory representation of a schema document.
//!
//! A schema is either a boolean (`true` accepts everything, `false`
//! rejects everything) or an insertion-ordered collection of keywords.
//! Parsing is entirely structural: each property of a schema object is
//! looked up in the keyword factory table and turned into a typed
//! [`Keyword`](../keywords/enum.Keyword.html); unknown properties are
//! preserved as unrecognized keywords so that they survive
//! round-tripping and can be targeted by references.
//!
//! Schema nodes are shared through `Arc` so that anchors, the registry,
//! and compiled constraints can all point at the same node. The fields
//! written by the initializer (base URI, draft, anchors) sit behind
//! locks; after initialization they are only read.

use crate::compile::{DynamicScope, SchemaConstraint};
use crate::draft::Draft;
use crate::errors::JsvError;
use crate::keywords::{self, Keyword};
use failure::Error;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use url::Url;

pub(crate) type SchemaRef = Arc<SchemaNode>;

/// A parsed schema document.
///
/// `Schema` is a cheap handle over a shared schema tree; cloning it does
/// not clone the tree. Construct one with [`from_value`](#method.from_value)
/// or through the serde glue (`serde_json::from_value::<Schema>`), then
/// call [`evaluate`](#method.evaluate) with an instance.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) root: SchemaRef,
}

impl Schema {
    /// Parses a schema from a JSON value.
    ///
    /// A JSON boolean becomes a boolean schema. A JSON object becomes a
    /// keyword schema; any other value is a parse error.
    pub fn from_value(value: &Value) -> Result<Schema, Error> {
        Ok(Schema {
            root: parse_node(value)?,
        })
    }

    /// Parses a schema from UTF-8 JSON text.
    pub fn from_str(text: &str) -> Result<Schema, Error> {
        let value: Value = serde_json::from_str(text)?;
        Schema::from_value(&value)
    }

    /// Parses a schema from a UTF-8 JSON byte stream.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Schema, Error> {
        let value: Value = serde_json::from_reader(reader)?;
        Schema::from_value(&value)
    }

    /// Writes the schema back to a JSON value.
    ///
    /// Keyword order is preserved, including unrecognized keywords, so a
    /// parse/serialize round trip is structurally faithful.
    pub fn to_value(&self) -> Value {
        node_to_value(&self.root)
    }

    /// The boolean carried by a boolean schema, or `None` for keyword
    /// schemas.
    pub fn bool_value(&self) -> Option<bool> {
        self.root.bool_value()
    }

    /// The base identifier in effect for this schema. Absolute once the
    /// schema has been initialized (which `evaluate` does on first use).
    pub fn base_uri(&self) -> Url {
        self.root.base_uri()
    }

    /// The draft this schema was determined to follow. `Unspecified`
    /// until initialization.
    pub fn draft(&self) -> Draft {
        self.root.draft()
    }

    /// Whether this schema introduces its own resource (an outermost
    /// schema, or one with an absolute-resolving `$id`).
    pub fn is_resource_root(&self) -> bool {
        self.root.is_resource_root()
    }

    /// Looks up an anchor declared on this resource root.
    pub fn get_anchor(&self, name: &str) -> Option<Schema> {
        self.root
            .anchor(name)
            .map(|(target, _)| Schema { root: target })
    }
}

/// The two shapes a schema node can take.
#[derive(Debug)]
pub(crate) enum Form {
    Bool(bool),
    Keywords(Vec<Keyword>),
}

pub(crate) struct AnchorEntry {
    pub target: Weak<SchemaNode>,
    pub dynamic: bool,
}

/// One node of the shared schema tree.
pub(crate) struct SchemaNode {
    pub(crate) form: Form,
    /// The synthetic identifier assigned at parse time. The initializer
    /// resolves `$id` against this on the outermost node, so it must
    /// stay fixed for initialization to be idempotent.
    seed_uri: Url,
    base_uri: RwLock<Url>,
    is_resource_root: AtomicBool,
    draft: RwLock<Draft>,
    anchors: RwLock<HashMap<String, AnchorEntry>>,
    recursive_anchor: RwLock<Option<Weak<SchemaNode>>>,
    /// JSON Pointer tokens from the owning resource root to this node,
    /// assigned by the initializer.
    location: RwLock<Vec<String>>,
    dynamic: Mutex<Option<bool>>,
    /// Per-dynamic-scope constraints for schemas that resolve
    /// dynamically. Compile-then-insert happens under this lock.
    pub(crate) constraints: Mutex<Vec<(DynamicScope, Arc<SchemaConstraint>)>>,
    /// Single-entry fast path for schemas with no dynamic references;
    /// such schemas compile identically in every scope.
    pub(crate) static_constraint: RwLock<Option<Arc<SchemaConstraint>>>,
}

impl std::fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SchemaNode")
            .field("form", &self.form)
            .field("base_uri", &self.base_uri.read().as_str())
            .finish()
    }
}

static ANONYMOUS_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Seeds the base identifier of a freshly parsed node. The initializer
/// overwrites it everywhere except on an outermost schema with no `$id`.
fn synthetic_base() -> Url {
    let n = ANONYMOUS_COUNTER.fetch_add(1, Ordering::Relaxed);
    Url::parse(&format!("https://jsv.rs/anonymous/{}", n))
        .expect("synthetic base identifiers always parse")
}

impl SchemaNode {
    fn new(form: Form) -> SchemaRef {
        let seed = synthetic_base();
        Arc::new(SchemaNode {
            form,
            seed_uri: seed.clone(),
            base_uri: RwLock::new(seed),
            is_resource_root: AtomicBool::new(false),
            draft: RwLock::new(Draft::Unspecified),
            anchors: RwLock::new(HashMap::new()),
            recursive_anchor: RwLock::new(None),
            location: RwLock::new(Vec::new()),
            dynamic: Mutex::new(None),
            constraints: Mutex::new(Vec::new()),
            static_constraint: RwLock::new(None),
        })
    }

    pub fn bool_value(&self) -> Option<bool> {
        match self.form {
            Form::Bool(b) => Some(b),
            Form::Keywords(_) => None,
        }
    }

    pub fn keywords(&self) -> &[Keyword] {
        match &self.form {
            Form::Bool(_) => &[],
            Form::Keywords(kws) => kws,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords().iter().find(|k| k.name() == name)
    }

    pub fn seed_uri(&self) -> Url {
        self.seed_uri.clone()
    }

    pub fn base_uri(&self) -> Url {
        self.base_uri.read().clone()
    }

    pub fn set_base_uri(&self, uri: Url) {
        *self.base_uri.write() = uri;
    }

    pub fn is_resource_root(&self) -> bool {
        self.is_resource_root.load(Ordering::Acquire)
    }

    pub fn set_resource_root(&self) {
        self.is_resource_root.store(true, Ordering::Release);
    }

    pub fn draft(&self) -> Draft {
        *self.draft.read()
    }

    pub fn set_draft(&self, draft: Draft) {
        *self.draft.write() = draft;
    }

    pub fn location(&self) -> Vec<String> {
        self.location.read().clone()
    }

    pub fn set_location(&self, location: Vec<String>) {
        *self.location.write() = location;
    }

    pub fn add_anchor(&self, name: &str, target: &SchemaRef, dynamic: bool) {
        self.anchors.write().insert(
            name.to_owned(),
            AnchorEntry {
                target: Arc::downgrade(target),
                dynamic,
            },
        );
    }

    /// Resolves any anchor (dynamic or not) declared on this resource.
    pub fn anchor(&self, name: &str) -> Option<(SchemaRef, bool)> {
        let anchors = self.anchors.read();
        let entry = anchors.get(name)?;
        let target = entry.target.upgrade()?;
        Some((target, entry.dynamic))
    }

    /// Resolves an anchor only if it was declared with `$dynamicAnchor`.
    pub fn dynamic_anchor(&self, name: &str) -> Option<SchemaRef> {
        match self.anchor(name) {
            Some((target, true)) => Some(target),
            _ => None,
        }
    }

    pub fn set_recursive_anchor(&self, target: &SchemaRef) {
        *self.recursive_anchor.write() = Some(Arc::downgrade(target));
    }

    pub fn recursive_anchor(&self) -> Option<SchemaRef> {
        self.recursive_anchor.read().as_ref()?.upgrade()
    }

    /// Whether this schema transitively contains a `$dynamicRef` or
    /// `$recursiveRef`. Dynamic schemas must be compiled per dynamic
    /// scope; static schemas compile once. The recursion is structural
    /// (references are not followed) and memoized.
    pub fn is_dynamic(&self) -> bool {
        if let Some(known) = *self.dynamic.lock() {
            return known;
        }
        let computed = self.keywords().iter().any(|kw| {
            matches!(kw, Keyword::DynamicRef(_) | Keyword::RecursiveRef)
                || kw.subschemas().iter().any(|(_, sub)| sub.is_dynamic())
        });
        *self.dynamic.lock() = Some(computed);
        computed
    }
}

/// Parses one node of a schema tree.
pub(crate) fn parse_node(value: &Value) -> Result<SchemaRef, Error> {
    match value {
        Value::Bool(b) => Ok(SchemaNode::new(Form::Bool(*b))),
        Value::Object(map) => {
            let mut kws = Vec::with_capacity(map.len());
            for (name, v) in map {
                kws.push(keywords::parse(name, v)?);
            }
            Ok(SchemaNode::new(Form::Keywords(kws)))
        }
        other => fail!(JsvError::Parse {
            location: String::new(),
            reason: format!("a schema must be a boolean or an object, found {}", type_name(other)),
        }),
    }
}

pub(crate) fn node_to_value(node: &SchemaRef) -> Value {
    match &node.form {
        Form::Bool(b) => Value::Bool(*b),
        Form::Keywords(kws) => {
            let mut map = serde_json::Map::with_capacity(kws.len());
            for kw in kws {
                map.insert(kw.name().to_owned(), kw.to_value());
            }
            Value::Object(map)
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walks JSON Pointer tokens down a schema document, consulting each
/// keyword's structural interface for how many segments it consumes.
pub(crate) fn resolve_pointer(root: &SchemaRef, tokens: &[String]) -> Option<SchemaRef> {
    let mut node = root.clone();
    let mut i = 0;
    while i < tokens.len() {
        let (child, consumed) = {
            let kw = node.keyword(&tokens[i])?;
            let (child, consumed) = kw.find_subschema(&tokens[i + 1..])?;
            (child.clone(), consumed)
        };
        node = child;
        i += 1 + consumed;
    }
    Some(node)
}

/// Splits a URI fragment of the form `/a/b` into unescaped JSON Pointer
/// tokens. The fragment must already be percent-decoded.
pub(crate) fn pointer_tokens(fragment: &str) -> Vec<String> {
    fragment
        .split('/')
        .skip(1)
        .map(|tok| tok.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Percent-decodes a URI fragment. `url` exposes fragments in their
/// encoded form; JSON Pointer tokens need the decoded text.
pub(crate) fn decode_fragment(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booleans_and_objects_parse() {
        assert_eq!(Schema::from_value(&json!(true)).unwrap().bool_value(), Some(true));
        assert_eq!(Schema::from_value(&json!(false)).unwrap().bool_value(), Some(false));
        assert_eq!(
            Schema::from_value(&json!({"type": "string"})).unwrap().bool_value(),
            None
        );
        assert!(Schema::from_value(&json!(42)).is_err());
        assert!(Schema::from_value(&json!("nope")).is_err());
    }

    #[test]
    fn unknown_keywords_round_trip() {
        let source = json!({
            "x-mine": {"y": 1},
            "type": "string"
        });
        let schema = Schema::from_value(&source).unwrap();
        assert_eq!(schema.to_value(), source);
    }

    #[test]
    fn pointer_walk_through_keyed_and_sequenced_keywords() {
        let schema = Schema::from_value(&json!({
            "properties": {
                "a": {"allOf": [{"type": "string"}, {"minLength": 1}]}
            }
        }))
        .unwrap();

        let tokens: Vec<String> = ["properties", "a", "allOf", "1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let target = resolve_pointer(&schema.root, &tokens).unwrap();
        assert!(target.keyword("minLength").is_some());

        let missing: Vec<String> = ["properties", "b"].iter().map(|s| s.to_string()).collect();
        assert!(resolve_pointer(&schema.root, &missing).is_none());
    }

    #[test]
    fn pointer_token_unescaping() {
        assert_eq!(pointer_tokens("/a~1b/c~0d"), vec!["a/b", "c~d"]);
        assert_eq!(decode_fragment("/a%20b"), "/a b");
    }
}
