//! Boolean-logic and conditional applicators.

use crate::compile::{self, Context, KeywordConstraint, SchemaConstraint};
use crate::keywords::Dependency;
use crate::schema::SchemaRef;
use crate::vm;
use failure::Error;
use serde_json::{json, Value};
use std::sync::Arc;

/// Compiles the members of a sequenced applicator such as `allOf`.
fn seq_children(
    name: &str,
    subs: &[SchemaRef],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<Vec<Arc<SchemaConstraint>>, Error> {
    subs.iter()
        .enumerate()
        .map(|(index, sub)| {
            compile::get_constraint(
                sub,
                vec![name.to_owned(), index.to_string()],
                sc.base_instance_location.clone(),
                Vec::new(),
                ctx,
            )
        })
        .collect()
}

fn keyed_children(
    name: &str,
    map: &[(String, SchemaRef)],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<Vec<(String, Arc<SchemaConstraint>)>, Error> {
    map.iter()
        .map(|(key, sub)| {
            compile::get_constraint(
                sub,
                vec![name.to_owned(), key.clone()],
                sc.base_instance_location.clone(),
                Vec::new(),
                ctx,
            )
            .map(|constraint| (key.clone(), constraint))
        })
        .collect()
}

pub(crate) fn all_of_constraint(
    subs: &[SchemaRef],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let children = seq_children("allOf", subs, sc, ctx)?;
    Ok(KeywordConstraint::new(
        "allOf",
        Arc::new(move |ev, ctx| {
            let mut failed = 0;
            for child in &children {
                let results = vm::eval_in_place(child, ev, ctx)?;
                if !ev.detail(results) {
                    failed += 1;
                }
            }
            if failed > 0 {
                ev.fail(ctx, "allOf", &[("failed", json!(failed))]);
            }
            Ok(())
        }),
    ))
}

pub(crate) fn any_of_constraint(
    subs: &[SchemaRef],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let children = seq_children("anyOf", subs, sc, ctx)?;
    Ok(KeywordConstraint::new(
        "anyOf",
        Arc::new(move |ev, ctx| {
            let mut any_valid = false;
            for child in &children {
                let results = vm::eval_in_place(child, ev, ctx)?;
                any_valid |= ev.detail(results);
            }
            if !any_valid {
                ev.fail(ctx, "anyOf", &[]);
            }
            Ok(())
        }),
    ))
}

pub(crate) fn one_of_constraint(
    subs: &[SchemaRef],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let children = seq_children("oneOf", subs, sc, ctx)?;
    Ok(KeywordConstraint::new(
        "oneOf",
        Arc::new(move |ev, ctx| {
            let mut valid = 0;
            for child in &children {
                let results = vm::eval_in_place(child, ev, ctx)?;
                if ev.detail(results) {
                    valid += 1;
                }
            }
            if valid != 1 {
                ev.fail(ctx, "oneOf", &[("count", json!(valid))]);
            }
            Ok(())
        }),
    ))
}

pub(crate) fn not_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["not".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;
    Ok(KeywordConstraint::new(
        "not",
        Arc::new(move |ev, ctx| {
            let results = vm::eval_in_place(&child, ev, ctx)?;
            if ev.detail(results) {
                ev.fail(ctx, "not", &[]);
            }
            Ok(())
        }),
    ))
}

/// `if` never fails; it annotates its verdict for `then` and `else`.
pub(crate) fn if_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["if".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;
    Ok(KeywordConstraint::new(
        "if",
        Arc::new(move |ev, ctx| {
            let results = vm::eval_in_place(&child, ev, ctx)?;
            let valid = ev.detail(results);
            ev.annotate("if", Value::Bool(valid));
            Ok(())
        }),
    ))
}

/// `then` and `else` are inert without an `if` sibling and gated at
/// runtime on its annotation.
pub(crate) fn then_else_constraint(
    sub: &SchemaRef,
    name: &'static str,
    runs_when: bool,
    sc: &Arc<SchemaConstraint>,
    compiled: &[KeywordConstraint],
    ctx: &mut Context,
) -> Result<Option<KeywordConstraint>, Error> {
    if !compiled.iter().any(|kc| kc.keyword == "if") {
        return Ok(None);
    }
    let child = compile::get_constraint(
        sub,
        vec![name.to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;
    Ok(Some(
        KeywordConstraint::new(
            name,
            Arc::new(move |ev, ctx| {
                let applies =
                    matches!(ev.annotation("if"), Some(Value::Bool(verdict)) if *verdict == runs_when);
                if !applies {
                    return Ok(());
                }
                let results = vm::eval_in_place(&child, ev, ctx)?;
                if !ev.detail(results) {
                    ev.mark_invalid();
                }
                Ok(())
            }),
        )
        .depending_on(&["if"]),
    ))
}

pub(crate) fn dependent_schemas_constraint(
    map: &[(String, SchemaRef)],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let children = keyed_children("dependentSchemas", map, sc, ctx)?;
    Ok(KeywordConstraint::new(
        "dependentSchemas",
        Arc::new(move |ev, ctx| {
            if !ev.instance.is_object() {
                return Ok(());
            }
            let mut failed: Vec<Value> = Vec::new();
            for (key, child) in &children {
                let present = ev
                    .instance
                    .as_object()
                    .map(|obj| obj.contains_key(key))
                    .unwrap_or(false);
                if !present {
                    continue;
                }
                let results = vm::eval_in_place(child, ev, ctx)?;
                if !ev.detail(results) {
                    failed.push(Value::String(key.clone()));
                }
            }
            if !failed.is_empty() {
                ev.fail(ctx, "dependentSchemas", &[("failed", Value::Array(failed))]);
            }
            Ok(())
        }),
    ))
}

/// The drafts-6/7 `dependencies` keyword mixes the shapes that later
/// drafts split into `dependentRequired` and `dependentSchemas`.
pub(crate) fn dependencies_constraint(
    entries: &[(String, Dependency)],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    enum Compiled {
        Schema(Arc<SchemaConstraint>),
        Required(Vec<String>),
    }

    let mut children = Vec::with_capacity(entries.len());
    for (key, dependency) in entries {
        let compiled = match dependency {
            Dependency::Schema(sub) => Compiled::Schema(compile::get_constraint(
                sub,
                vec!["dependencies".to_owned(), key.clone()],
                sc.base_instance_location.clone(),
                Vec::new(),
                ctx,
            )?),
            Dependency::Required(names) => Compiled::Required(names.clone()),
        };
        children.push((key.clone(), compiled));
    }

    Ok(KeywordConstraint::new(
        "dependencies",
        Arc::new(move |ev, ctx| {
            if !ev.instance.is_object() {
                return Ok(());
            }
            for (key, compiled) in &children {
                let present = ev
                    .instance
                    .as_object()
                    .map(|obj| obj.contains_key(key))
                    .unwrap_or(false);
                if !present {
                    continue;
                }
                match compiled {
                    Compiled::Schema(child) => {
                        let results = vm::eval_in_place(child, ev, ctx)?;
                        if !ev.detail(results) {
                            ev.mark_invalid();
                        }
                    }
                    Compiled::Required(names) => {
                        let missing: Vec<Value> = {
                            let obj = match ev.instance.as_object() {
                                Some(obj) => obj,
                                None => continue,
                            };
                            names
                                .iter()
                                .filter(|name| !obj.contains_key(*name))
                                .map(|name| Value::String(name.clone()))
                                .collect()
                        };
                        if !missing.is_empty() {
                            ev.fail(
                                ctx,
                                "dependencies",
                                &[
                                    ("property", Value::String(key.clone())),
                                    ("missing", Value::Array(missing)),
                                ],
                            );
                        }
                    }
                }
            }
            Ok(())
        }),
    ))
}
