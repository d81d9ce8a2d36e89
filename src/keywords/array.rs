//! Array keywords: the items family, `contains`, cardinality
//! assertions, and `unevaluatedItems`.
//!
//! Positional coverage is communicated through annotations: `true` means
//! every element was covered, a number means elements up to that index
//! were, and `contains` reports the matching indices. `additionalItems`
//! and `unevaluatedItems` read those annotations rather than recomputing
//! coverage.

use crate::compile::{self, Context, KeywordConstraint, SchemaConstraint};
use crate::draft::Draft;
use crate::keywords::{ItemsForm, Keyword};
use crate::schema::SchemaRef;
use crate::vm;
use failure::Error;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

fn indexed_children(
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

/// The annotation for positional coverage of `count` children over an
/// array of `len` elements.
fn positional_annotation(count: usize, len: usize) -> Value {
    if len <= count {
        Value::Bool(true)
    } else {
        json!(count - 1)
    }
}

pub(crate) fn prefix_items_constraint(
    subs: &[SchemaRef],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let children = indexed_children("prefixItems", subs, sc, ctx)?;
    Ok(KeywordConstraint::new(
        "prefixItems",
        Arc::new(move |ev, ctx| {
            let instance = ev.instance.clone();
            let array = match instance.as_array() {
                Some(array) => array,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let upto = children.len().min(array.len());
            let mut all_valid = true;
            for index in 0..upto {
                let results = vm::evaluate_child(
                    &children[index],
                    Cow::Borrowed(&array[index]),
                    &location,
                    &path,
                    &[index.to_string()],
                    ctx,
                )?;
                all_valid &= ev.detail(results);
            }
            if upto > 0 || array.is_empty() {
                ev.annotate("prefixItems", positional_annotation(upto, array.len()));
            }
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

pub(crate) fn items_constraint(
    form: &ItemsForm,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    match form {
        ItemsForm::Positional(subs) => {
            // The pre-2020 positional form; 2020-12 rejects it at the
            // draft-support check before compilation gets here.
            let children = indexed_children("items", subs, sc, ctx)?;
            Ok(KeywordConstraint::new(
                "items",
                Arc::new(move |ev, ctx| {
                    let instance = ev.instance.clone();
                    let array = match instance.as_array() {
                        Some(array) => array,
                        None => return Ok(()),
                    };
                    let location = ev.instance_location.clone();
                    let path = ev.evaluation_path.clone();

                    let upto = children.len().min(array.len());
                    let mut all_valid = true;
                    for index in 0..upto {
                        let results = vm::evaluate_child(
                            &children[index],
                            Cow::Borrowed(&array[index]),
                            &location,
                            &path,
                            &[index.to_string()],
                            ctx,
                        )?;
                        all_valid &= ev.detail(results);
                    }
                    ev.annotate("items", positional_annotation(upto, array.len()));
                    if !all_valid {
                        ev.mark_invalid();
                    }
                    Ok(())
                }),
            ))
        }
        ItemsForm::Single(sub) => {
            let child = compile::get_constraint(
                sub,
                vec!["items".to_owned()],
                sc.base_instance_location.clone(),
                Vec::new(),
                ctx,
            )?;
            // Under 2020-12 `items` picks up after `prefixItems`; in the
            // earlier drafts it applies from the first element.
            let after_prefix = sc.schema.draft() >= Draft::Draft202012;
            Ok(KeywordConstraint::new(
                "items",
                Arc::new(move |ev, ctx| {
                    let start = if after_prefix {
                        match ev.annotation("prefixItems") {
                            Some(Value::Bool(true)) => usize::max_value(),
                            Some(Value::Number(n)) => {
                                n.as_u64().map(|n| n as usize + 1).unwrap_or(0)
                            }
                            _ => 0,
                        }
                    } else {
                        0
                    };

                    let instance = ev.instance.clone();
                    let array = match instance.as_array() {
                        Some(array) => array,
                        None => return Ok(()),
                    };
                    let location = ev.instance_location.clone();
                    let path = ev.evaluation_path.clone();

                    let mut all_valid = true;
                    for index in start..array.len() {
                        let results = vm::evaluate_child(
                            &child,
                            Cow::Borrowed(&array[index]),
                            &location,
                            &path,
                            &[index.to_string()],
                            ctx,
                        )?;
                        all_valid &= ev.detail(results);
                    }
                    if start < array.len() || start == 0 {
                        ev.annotate("items", Value::Bool(true));
                    }
                    if !all_valid {
                        ev.mark_invalid();
                    }
                    Ok(())
                }),
            ))
        }
    }
}

/// Inert unless a positional `items` sibling exists; gated at runtime on
/// its annotation.
pub(crate) fn additional_items_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    compiled: &[KeywordConstraint],
    ctx: &mut Context,
) -> Result<Option<KeywordConstraint>, Error> {
    let positional = matches!(
        sc.schema.keyword("items"),
        Some(Keyword::Items(ItemsForm::Positional(_)))
    );
    if !positional || !compiled.iter().any(|kc| kc.keyword == "items") {
        return Ok(None);
    }

    let child = compile::get_constraint(
        sub,
        vec!["additionalItems".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;
    Ok(Some(
        KeywordConstraint::new(
            "additionalItems",
            Arc::new(move |ev, ctx| {
                let start = match ev.annotation("items") {
                    Some(Value::Bool(true)) => return Ok(()),
                    Some(Value::Number(n)) => n.as_u64().map(|n| n as usize + 1).unwrap_or(0),
                    _ => return Ok(()),
                };

                let instance = ev.instance.clone();
                let array = match instance.as_array() {
                    Some(array) => array,
                    None => return Ok(()),
                };
                let location = ev.instance_location.clone();
                let path = ev.evaluation_path.clone();

                let mut all_valid = true;
                for index in start..array.len() {
                    let results = vm::evaluate_child(
                        &child,
                        Cow::Borrowed(&array[index]),
                        &location,
                        &path,
                        &[index.to_string()],
                        ctx,
                    )?;
                    all_valid &= ev.detail(results);
                }
                if start < array.len() {
                    ev.annotate("additionalItems", Value::Bool(true));
                }
                if !all_valid {
                    ev.mark_invalid();
                }
                Ok(())
            }),
        )
        .depending_on(&["items"]),
    ))
}

pub(crate) fn contains_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["contains".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;
    // minContains: 0 makes an empty match acceptable; the sibling is
    // inspected at compile time.
    let zero_allowed = matches!(sc.schema.keyword("minContains"), Some(Keyword::MinContains(0)));

    Ok(KeywordConstraint::new(
        "contains",
        Arc::new(move |ev, ctx| {
            let instance = ev.instance.clone();
            let array = match instance.as_array() {
                Some(array) => array,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut indices = Vec::new();
            for (index, element) in array.iter().enumerate() {
                let results = vm::evaluate_child(
                    &child,
                    Cow::Borrowed(element),
                    &location,
                    &path,
                    &[index.to_string()],
                    ctx,
                )?;
                if ev.detail(results) {
                    indices.push(json!(index));
                }
            }
            let empty = indices.is_empty();
            ev.annotate("contains", Value::Array(indices));
            if empty && !zero_allowed {
                ev.fail(ctx, "contains", &[]);
            }
            Ok(())
        }),
    ))
}

pub(crate) fn min_contains_constraint(
    limit: u64,
    compiled: &[KeywordConstraint],
) -> Option<KeywordConstraint> {
    if !compiled.iter().any(|kc| kc.keyword == "contains") {
        return None;
    }
    Some(
        KeywordConstraint::new(
            "minContains",
            Arc::new(move |ev, ctx| {
                let count = contains_count(ev.annotation("contains"));
                if count < limit {
                    ev.fail(
                        ctx,
                        "minContains",
                        &[("limit", json!(limit)), ("received", json!(count))],
                    );
                }
                Ok(())
            }),
        )
        .depending_on(&["contains"]),
    )
}

pub(crate) fn max_contains_constraint(
    limit: u64,
    compiled: &[KeywordConstraint],
) -> Option<KeywordConstraint> {
    if !compiled.iter().any(|kc| kc.keyword == "contains") {
        return None;
    }
    Some(
        KeywordConstraint::new(
            "maxContains",
            Arc::new(move |ev, ctx| {
                let count = contains_count(ev.annotation("contains"));
                if count > limit {
                    ev.fail(
                        ctx,
                        "maxContains",
                        &[("limit", json!(limit)), ("received", json!(count))],
                    );
                }
                Ok(())
            }),
        )
        .depending_on(&["contains"]),
    )
}

fn contains_count(annotation: Option<&Value>) -> u64 {
    annotation
        .and_then(Value::as_array)
        .map(|indices| indices.len() as u64)
        .unwrap_or(0)
}

pub(crate) fn min_items_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "minItems",
        Arc::new(move |ev, ctx| {
            let count = match ev.instance.as_array() {
                Some(array) => array.len() as u64,
                None => return Ok(()),
            };
            if count < limit {
                ev.fail(
                    ctx,
                    "minItems",
                    &[("received", json!(count)), ("limit", json!(limit))],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn max_items_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "maxItems",
        Arc::new(move |ev, ctx| {
            let count = match ev.instance.as_array() {
                Some(array) => array.len() as u64,
                None => return Ok(()),
            };
            if count > limit {
                ev.fail(
                    ctx,
                    "maxItems",
                    &[("received", json!(count)), ("limit", json!(limit))],
                );
            }
            Ok(())
        }),
    )
}

/// `uniqueItems: false` asserts nothing and compiles to nothing.
pub(crate) fn unique_items_constraint(unique: bool) -> Option<KeywordConstraint> {
    if !unique {
        return None;
    }
    Some(KeywordConstraint::new(
        "uniqueItems",
        Arc::new(move |ev, ctx| {
            let duplicates: Vec<Value> = match ev.instance.as_array() {
                Some(array) => {
                    let mut pairs = Vec::new();
                    for i in 0..array.len() {
                        for j in i + 1..array.len() {
                            if array[i] == array[j] {
                                pairs.push(json!([i, j]));
                            }
                        }
                    }
                    pairs
                }
                None => return Ok(()),
            };
            if !duplicates.is_empty() {
                ev.fail(
                    ctx,
                    "uniqueItems",
                    &[("duplicates", Value::Array(duplicates))],
                );
            }
            Ok(())
        }),
    ))
}

pub(crate) fn unevaluated_items_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["unevaluatedItems".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;

    const SOURCES: &[&str] = &[
        "prefixItems",
        "items",
        "additionalItems",
        "contains",
        "unevaluatedItems",
    ];

    Ok(KeywordConstraint::new(
        "unevaluatedItems",
        Arc::new(move |ev, ctx| {
            let mut values = Vec::new();
            ev.gather_annotations(SOURCES, &mut values);

            let mut all_covered = false;
            let mut covered_prefix: Option<u64> = None;
            let mut covered_indices: HashSet<u64> = HashSet::new();
            for value in &values {
                match value {
                    Value::Bool(true) => all_covered = true,
                    Value::Number(n) => {
                        if let Some(n) = n.as_u64() {
                            covered_prefix =
                                Some(covered_prefix.map(|prev| prev.max(n)).unwrap_or(n));
                        }
                    }
                    Value::Array(indices) => {
                        covered_indices.extend(indices.iter().filter_map(Value::as_u64));
                    }
                    _ => {}
                }
            }

            let instance = ev.instance.clone();
            let array = match instance.as_array() {
                Some(array) => array,
                None => return Ok(()),
            };
            if all_covered {
                return Ok(());
            }
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut applied = false;
            let mut all_valid = true;
            for (index, element) in array.iter().enumerate() {
                let in_prefix = covered_prefix
                    .map(|max| index as u64 <= max)
                    .unwrap_or(false);
                if in_prefix || covered_indices.contains(&(index as u64)) {
                    continue;
                }
                applied = true;
                let results = vm::evaluate_child(
                    &child,
                    Cow::Borrowed(element),
                    &location,
                    &path,
                    &[index.to_string()],
                    ctx,
                )?;
                all_valid &= ev.detail(results);
            }
            if applied {
                ev.annotate("unevaluatedItems", Value::Bool(true));
            }
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}
