//! Reference keywords and other core-vocabulary constraints.
//!
//! The identity keywords (`$id`, `$schema`, anchors) do their work
//! during initialization and compile to nothing. The reference keywords
//! compile to evaluators that resolve lazily: `$ref` against the
//! registry, `$dynamicRef` and `$recursiveRef` against the runtime
//! dynamic-scope stack.
//!
//! Reference evaluation is transparent in the evaluation path: the
//! target's results appear at the referencing schema's path, so a type
//! failure behind `properties/next → $ref → #` surfaces at
//! `/properties/next/type`.

use crate::compile::{self, Context, KeywordConstraint, SchemaConstraint};
use crate::draft::Draft;
use crate::errors::JsvError;
use crate::init;
use crate::schema::{self, SchemaRef};
use crate::vm::{self, Evaluation};
use failure::Error;
use json_pointer::JsonPointer;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub(crate) fn ref_constraint(
    reference: &str,
    sc: &Arc<SchemaConstraint>,
) -> Result<KeywordConstraint, Error> {
    let target = join_reference(&sc.base_uri, reference)?;
    Ok(KeywordConstraint::new(
        "$ref",
        Arc::new(move |ev, ctx| {
            enter_reference(ctx)?;
            let outcome = match resolve_static(&target, ctx, &ev.evaluation_path) {
                Ok(found) => evaluate_target(&found, ev, ctx),
                Err(error) => Err(error),
            };
            ctx.ref_depth -= 1;
            outcome
        }),
    ))
}

pub(crate) fn dynamic_ref_constraint(
    reference: &str,
    sc: &Arc<SchemaConstraint>,
) -> Result<KeywordConstraint, Error> {
    let target = join_reference(&sc.base_uri, reference)?;
    let anchor = target
        .fragment()
        .map(schema::decode_fragment)
        .filter(|fragment| !fragment.is_empty() && !fragment.starts_with('/'));
    Ok(KeywordConstraint::new(
        "$dynamicRef",
        Arc::new(move |ev, ctx| {
            enter_reference(ctx)?;
            let outcome = match resolve_dynamic(&target, anchor.as_deref(), ev, ctx) {
                Ok(found) => evaluate_target(&found, ev, ctx),
                Err(error) => Err(error),
            };
            ctx.ref_depth -= 1;
            outcome
        }),
    ))
}

pub(crate) fn recursive_ref_constraint(_sc: &Arc<SchemaConstraint>) -> KeywordConstraint {
    KeywordConstraint::new(
        "$recursiveRef",
        Arc::new(move |ev, ctx| {
            enter_reference(ctx)?;
            let outcome = match resolve_recursive(ev, ctx) {
                Ok(found) => evaluate_target(&found, ev, ctx),
                Err(error) => Err(error),
            };
            ctx.ref_depth -= 1;
            outcome
        }),
    )
}

/// Unrecognized keywords assert nothing; when custom-keyword processing
/// is enabled they surface their raw value as an annotation.
pub(crate) fn unrecognized_constraint(name: &str, value: &Value) -> KeywordConstraint {
    let name = name.to_owned();
    let value = value.clone();
    KeywordConstraint::new(
        &name.clone(),
        Arc::new(move |ev, _ctx| {
            ev.annotate(&name, value.clone());
            Ok(())
        }),
    )
}

fn enter_reference(ctx: &mut Context) -> Result<(), Error> {
    ctx.ref_depth += 1;
    if ctx.ref_depth > ctx.options.max_depth {
        ctx.ref_depth -= 1;
        fail!(JsvError::MaxDepthExceeded);
    }
    Ok(())
}

fn join_reference(base: &Url, reference: &str) -> Result<Url, Error> {
    base.join(reference).map_err(|e| {
        JsvError::Parse {
            location: "$ref".to_owned(),
            reason: format!("cannot resolve {:?} against {}: {}", reference, base, e),
        }
        .into()
    })
}

fn unresolved(uri: &str, evaluation_path: &[String]) -> Error {
    JsvError::UnresolvedReference {
        uri: uri.to_owned(),
        evaluation_path: JsonPointer::new(evaluation_path.to_vec()).to_string(),
    }
    .into()
}

/// Resolves a reference against the registry: fetch the document, then
/// follow a JSON Pointer fragment or look up an anchor name.
fn resolve_static(
    target: &Url,
    ctx: &mut Context,
    evaluation_path: &[String],
) -> Result<SchemaRef, Error> {
    let mut document = target.clone();
    document.set_fragment(None);
    let root = ctx
        .registry
        .fetch_node(&document, ctx.options.resolver.as_deref())?
        .ok_or_else(|| unresolved(target.as_str(), evaluation_path))?;

    match target.fragment() {
        None | Some("") => Ok(root),
        Some(fragment) => {
            let decoded = schema::decode_fragment(fragment);
            if decoded.starts_with('/') {
                let tokens = schema::pointer_tokens(&decoded);
                let found = schema::resolve_pointer(&root, &tokens)
                    .ok_or_else(|| unresolved(target.as_str(), evaluation_path))?;
                // Drafts 6/7 leave the subtree beneath a `$ref` untouched
                // during initialization; give late-resolved targets their
                // identifiers now.
                if found.draft() == Draft::Unspecified {
                    init::initialize_fragment(&found, &root, tokens, ctx)?;
                }
                Ok(found)
            } else {
                root.anchor(&decoded)
                    .map(|(found, _)| found)
                    .ok_or_else(|| unresolved(target.as_str(), evaluation_path))
            }
        }
    }
}

/// `$dynamicRef`: the outermost resource in the dynamic scope that
/// declares the anchor as dynamic wins; without one, the reference
/// degrades to static `$ref` resolution.
fn resolve_dynamic(
    target: &Url,
    anchor: Option<&str>,
    ev: &Evaluation<'_>,
    ctx: &mut Context,
) -> Result<SchemaRef, Error> {
    if let Some(name) = anchor {
        let mut found = None;
        for uri in ctx.scope.outermost_first() {
            if let Some(root) = ctx.registry.get_node(uri) {
                if let Some(schema) = root.dynamic_anchor(name) {
                    found = Some(schema);
                    break;
                }
            }
        }
        if let Some(schema) = found {
            return Ok(schema);
        }
    }
    resolve_static(target, ctx, &ev.evaluation_path)
}

/// `$recursiveRef`: the outermost resource in the dynamic scope carrying
/// `$recursiveAnchor: true` wins; without one, the current resource root.
fn resolve_recursive(ev: &Evaluation<'_>, ctx: &mut Context) -> Result<SchemaRef, Error> {
    let mut found = None;
    for uri in ctx.scope.outermost_first() {
        if let Some(root) = ctx.registry.get_node(uri) {
            if let Some(schema) = root.recursive_anchor() {
                found = Some(schema);
                break;
            }
        }
    }
    if let Some(schema) = found {
        return Ok(schema);
    }
    let current = ctx.scope.top().clone();
    ctx.registry
        .get_node(&current)
        .ok_or_else(|| unresolved("#", &ev.evaluation_path))
}

/// Compiles the resolved target in the current dynamic scope and
/// evaluates it in place.
fn evaluate_target(
    found: &SchemaRef,
    ev: &mut Evaluation<'_>,
    ctx: &mut Context,
) -> Result<(), Error> {
    let constraint =
        compile::get_constraint(found, Vec::new(), ev.instance_location.clone(), Vec::new(), ctx)?;
    let results = vm::eval_in_place(&constraint, ev, ctx)?;
    if !ev.detail(results) {
        ev.mark_invalid();
    }
    Ok(())
}
