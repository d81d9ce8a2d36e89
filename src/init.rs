//! The initialization pass.
//!
//! One walk over a freshly parsed schema tree establishes everything
//! evaluation needs: the draft each node follows, base identifiers,
//! resource roots (registered with the registry), anchor tables, and
//! each node's pointer location within its resource. The pass is
//! idempotent; `evaluate` runs it on every call and re-registration of
//! the same node is a no-op.

use crate::compile::Context;
use crate::draft::Draft;
use crate::errors::JsvError;
use crate::keywords::Keyword;
use crate::registry::{Registry, Resolver};
use crate::schema::SchemaRef;
use failure::Error;
use std::collections::HashSet;
use url::Url;

/// Initializes a schema tree against a registry.
///
/// `default_base` overrides the node's seeded base identifier; it is the
/// retrieval URI when the schema arrived through a resolver.
pub(crate) fn initialize(
    root: &SchemaRef,
    registry: &Registry,
    evaluate_as: Draft,
    resolver: Option<&dyn Resolver>,
    default_base: Option<Url>,
) -> Result<(), Error> {
    let draft = determine_draft(root, registry, evaluate_as, resolver, &mut HashSet::new())?;
    // Resolve against the parse-time seed, never the previously
    // resolved base: a relative $id must join the same way every run.
    let seed = match default_base {
        Some(base) => base,
        None => root.seed_uri(),
    };
    walk(WalkArgs {
        registry,
        resolver,
        evaluate_as,
        outermost: true,
    }, root, &seed, root, draft, Vec::new())
}

/// Late initialization for a pointer-resolved node that the main pass
/// skipped — the subtree beneath a drafts-6/7 `$ref`.
pub(crate) fn initialize_fragment(
    node: &SchemaRef,
    resource_root: &SchemaRef,
    location: Vec<String>,
    ctx: &mut Context,
) -> Result<(), Error> {
    let registry = ctx.registry.clone();
    walk(
        WalkArgs {
            registry: &registry,
            resolver: ctx.options.resolver.as_deref(),
            evaluate_as: ctx.options.evaluate_as,
            outermost: false,
        },
        node,
        &resource_root.base_uri(),
        resource_root,
        resource_root.draft(),
        location,
    )
}

struct WalkArgs<'a> {
    registry: &'a Registry,
    resolver: Option<&'a dyn Resolver>,
    evaluate_as: Draft,
    outermost: bool,
}

fn walk(
    args: WalkArgs<'_>,
    node: &SchemaRef,
    current_base: &Url,
    current_root: &SchemaRef,
    draft: Draft,
    location: Vec<String>,
) -> Result<(), Error> {
    node.set_location(location.clone());
    node.set_draft(draft);

    if node.bool_value().is_some() {
        node.set_base_uri(current_base.clone());
        return Ok(());
    }

    // Drafts 6/7: a $ref suppresses sibling keywords, so identifiers
    // beneath this node are not resolved. Pointer-resolved references
    // into the subtree are initialized lazily instead.
    if draft.ref_takes_precedence() && node.keyword("$ref").is_some() {
        node.set_base_uri(current_base.clone());
        if args.outermost {
            node.set_resource_root();
            args.registry.register_node(&strip_fragment(current_base), node)?;
        }
        return Ok(());
    }

    let mut base = current_base.clone();
    let mut effective_draft = draft;
    let mut new_root = false;

    let id_value = node.keywords().iter().find_map(|kw| match kw {
        Keyword::Id(value) | Keyword::LegacyId(value) => Some(value.as_str()),
        _ => None,
    });

    if let Some(id) = id_value {
        if let Some(name) = id.strip_prefix('#') {
            // A fragment-only identifier names this location, a shape
            // drafts 2019-09 and later moved to $anchor.
            if !draft.ref_takes_precedence() {
                fail!(JsvError::UnsupportedSchema {
                    keyword: "$id".to_owned(),
                    draft,
                });
            }
            if !crate::keywords::is_anchor_name(name) {
                fail!(JsvError::Parse {
                    location: "$id".to_owned(),
                    reason: format!("{:?} is not a valid anchor name", name),
                });
            }
            current_root.add_anchor(name, node, false);
        } else {
            let joined = current_base.join(id).map_err(|e| JsvError::Parse {
                location: "$id".to_owned(),
                reason: format!("cannot resolve {:?} against {}: {}", id, current_base, e),
            })?;
            base = strip_fragment(&joined);
            new_root = true;
        }
    }

    if new_root {
        node.set_base_uri(base.clone());
        node.set_resource_root();
        node.set_location(Vec::new());
        args.registry.register_node(&base, node)?;
        effective_draft = determine_draft(
            node,
            args.registry,
            args.evaluate_as,
            args.resolver,
            &mut HashSet::new(),
        )?;
        node.set_draft(effective_draft);
    } else {
        node.set_base_uri(base.clone());
        if args.outermost {
            node.set_resource_root();
            args.registry.register_node(&strip_fragment(&base), node)?;
        }
    }

    let root = if new_root { node } else { current_root };

    for kw in node.keywords() {
        match kw {
            Keyword::Anchor(name) => root.add_anchor(name, node, false),
            Keyword::DynamicAnchor(name) => root.add_anchor(name, node, true),
            Keyword::RecursiveAnchor(true) => root.set_recursive_anchor(node),
            _ => {}
        }
    }

    for kw in node.keywords() {
        for (tail, sub) in kw.subschemas() {
            let mut sub_location = node.location();
            sub_location.push(kw.name().to_owned());
            sub_location.extend(tail);
            walk(
                WalkArgs {
                    registry: args.registry,
                    resolver: args.resolver,
                    evaluate_as: args.evaluate_as,
                    outermost: false,
                },
                sub,
                &base,
                root,
                effective_draft,
                sub_location,
            )?;
        }
    }
    Ok(())
}

/// Determines the draft governing `node`, per the precedence: an
/// explicit `$schema`, then the requested draft, then the newest draft
/// every known keyword in the subtree supports (`DraftNext` when the
/// intersection is empty).
pub(crate) fn determine_draft(
    node: &SchemaRef,
    registry: &Registry,
    evaluate_as: Draft,
    resolver: Option<&dyn Resolver>,
    visited: &mut HashSet<Url>,
) -> Result<Draft, Error> {
    if let Some(Keyword::MetaSchema(uri)) = node.keyword("$schema") {
        let url = Url::parse(uri).map_err(|e| JsvError::Parse {
            location: "$schema".to_owned(),
            reason: format!("{:?} is not an absolute identifier: {}", uri, e),
        })?;
        return meta_schema_draft(&url, registry, resolver, visited);
    }
    if evaluate_as != Draft::Unspecified {
        return Ok(evaluate_as);
    }
    let mut supported = crate::draft::DraftSet::ALL;
    collect_keyword_drafts(node, &mut supported);
    Ok(supported.newest().unwrap_or(Draft::DraftNext))
}

fn collect_keyword_drafts(node: &SchemaRef, supported: &mut crate::draft::DraftSet) {
    for kw in node.keywords() {
        if !matches!(kw, Keyword::Unrecognized { .. }) {
            *supported = supported.intersect(kw.supports());
        }
        for (_, sub) in kw.subschemas() {
            // Nested resources and $schema-bearing nodes determine their
            // own draft.
            let independent = sub.keyword("$schema").is_some()
                || sub.keywords().iter().any(|k| {
                    matches!(k, Keyword::Id(_) | Keyword::LegacyId(_))
                });
            if !independent {
                collect_keyword_drafts(sub, supported);
            }
        }
    }
}

/// Follows a custom meta-schema chain until it reaches a recognized
/// draft identifier. Every identifier passed through goes into
/// `visited`, so chains that revisit one terminate as unresolvable.
fn meta_schema_draft(
    uri: &Url,
    registry: &Registry,
    resolver: Option<&dyn Resolver>,
    visited: &mut HashSet<Url>,
) -> Result<Draft, Error> {
    if let Some(draft) = Draft::from_meta_schema(uri) {
        return Ok(draft);
    }
    let key = strip_fragment(uri);
    if !visited.insert(key.clone()) {
        fail!(JsvError::UnresolvableMetaSchema {
            uri: uri.to_string(),
        });
    }
    let meta = match registry.fetch_node(&key, resolver)? {
        Some(meta) => meta,
        None => fail!(JsvError::UnresolvableMetaSchema {
            uri: uri.to_string(),
        }),
    };
    match meta.keyword("$schema") {
        Some(Keyword::MetaSchema(next)) => {
            let next_url = Url::parse(next).map_err(|e| JsvError::Parse {
                location: "$schema".to_owned(),
                reason: format!("{:?} is not an absolute identifier: {}", next, e),
            })?;
            meta_schema_draft(&next_url, registry, resolver, visited)
        }
        _ => fail!(JsvError::UnresolvableMetaSchema {
            uri: uri.to_string(),
        }),
    }
}

pub(crate) fn strip_fragment(uri: &Url) -> Url {
    let mut stripped = uri.clone();
    stripped.set_fragment(None);
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::schema::Schema;
    use serde_json::json;

    fn init(schema: &Schema, registry: &Registry) {
        initialize(&schema.root, registry, Draft::Unspecified, None, None).unwrap();
    }

    #[test]
    fn resource_roots_get_absolute_bases() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "$id": "https://example.com/root",
            "$defs": {
                "leaf": {"$id": "leaf", "type": "string"},
            },
        }))
        .unwrap();
        init(&schema, &registry);

        assert_eq!(schema.base_uri().as_str(), "https://example.com/root");
        let leaf: Url = "https://example.com/leaf".parse().unwrap();
        assert!(registry.get(&leaf).is_some());
    }

    #[test]
    fn anchors_resolve_on_their_resource_root() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "$id": "https://example.com/anchored",
            "$defs": {
                "node": {"$anchor": "node", "type": "integer"},
            },
        }))
        .unwrap();
        init(&schema, &registry);

        let target = schema.get_anchor("node").expect("anchor resolves");
        assert!(target.root.keyword("type").is_some());
        assert!(schema.get_anchor("missing").is_none());
    }

    #[test]
    fn initialization_is_idempotent() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "$id": "https://example.com/idempotent",
            "properties": {"a": {"$anchor": "a"}},
        }))
        .unwrap();

        init(&schema, &registry);
        let base_once = schema.base_uri();
        init(&schema, &registry);
        init(&schema, &registry);
        assert_eq!(schema.base_uri(), base_once);
        assert!(schema.get_anchor("a").is_some());
    }

    #[test]
    fn keyword_intersection_picks_the_newest_draft() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "type": "integer",
            "exclusiveMinimum": 5,
        }))
        .unwrap();
        init(&schema, &registry);
        assert_eq!(schema.draft(), Draft::DraftNext);

        let legacy = Schema::from_value(&json!({
            "dependencies": {"a": ["b"]},
        }))
        .unwrap();
        init(&legacy, &registry);
        assert_eq!(legacy.draft(), Draft::Draft7);
    }

    #[test]
    fn declared_meta_schema_wins() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "integer",
        }))
        .unwrap();
        init(&schema, &registry);
        assert_eq!(schema.draft(), Draft::Draft7);
    }

    #[test]
    fn unknown_meta_schema_chains_fail() {
        let registry = Registry::new();
        let schema = Schema::from_value(&json!({
            "$schema": "https://example.com/meta/unknown",
        }))
        .unwrap();
        let err = initialize(&schema.root, &registry, Draft::Unspecified, None, None)
            .unwrap_err();
        assert!(err.to_string().contains("meta-schema"));
    }
}
