//! Object keywords: the properties family, presence assertions, and
//! `unevaluatedProperties`.
//!
//! `properties` and `patternProperties` annotate the property names they
//! matched. `additionalProperties` reads those sibling annotations to
//! find what is left over; `unevaluatedProperties` widens the same idea
//! to everything any valid in-place subschema evaluated.

use crate::compile::{self, Context, KeywordConstraint, SchemaConstraint};
use crate::keywords::PatternSchema;
use crate::schema::SchemaRef;
use crate::vm;
use failure::Error;
use regex::Regex;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

pub(crate) fn properties_constraint(
    map: &[(String, SchemaRef)],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let mut children = Vec::with_capacity(map.len());
    for (name, sub) in map {
        let child = compile::get_constraint(
            sub,
            vec!["properties".to_owned(), name.clone()],
            sc.base_instance_location.clone(),
            vec![name.clone()],
            ctx,
        )?;
        children.push((name.clone(), child));
    }

    Ok(KeywordConstraint::new(
        "properties",
        Arc::new(move |ev, ctx| {
            let instance = ev.instance.clone();
            let object = match instance.as_object() {
                Some(object) => object,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut matched = Vec::new();
            let mut all_valid = true;
            for (name, child) in &children {
                if let Some(value) = object.get(name) {
                    matched.push(Value::String(name.clone()));
                    let results =
                        vm::evaluate_child(child, Cow::Borrowed(value), &location, &path, &[], ctx)?;
                    all_valid &= ev.detail(results);
                }
            }
            ev.annotate("properties", Value::Array(matched));
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

pub(crate) fn pattern_properties_constraint(
    entries: &[PatternSchema],
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let mut children: Vec<(Regex, Arc<SchemaConstraint>)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let child = compile::get_constraint(
            &entry.schema,
            vec!["patternProperties".to_owned(), entry.source.clone()],
            sc.base_instance_location.clone(),
            Vec::new(),
            ctx,
        )?;
        children.push((entry.regex.clone(), child));
    }

    Ok(KeywordConstraint::new(
        "patternProperties",
        Arc::new(move |ev, ctx| {
            let instance = ev.instance.clone();
            let object = match instance.as_object() {
                Some(object) => object,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut matched: Vec<Value> = Vec::new();
            let mut all_valid = true;
            for (regex, child) in &children {
                for (key, value) in object {
                    if !regex.is_match(key) {
                        continue;
                    }
                    if !matched.iter().any(|m| m == &Value::String(key.clone())) {
                        matched.push(Value::String(key.clone()));
                    }
                    let results = vm::evaluate_child(
                        child,
                        Cow::Borrowed(value),
                        &location,
                        &path,
                        &[key.clone()],
                        ctx,
                    )?;
                    all_valid &= ev.detail(results);
                }
            }
            ev.annotate("patternProperties", Value::Array(matched));
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

pub(crate) fn additional_properties_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["additionalProperties".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;

    Ok(KeywordConstraint::new(
        "additionalProperties",
        Arc::new(move |ev, ctx| {
            let covered = annotated_names(ev.annotation("properties"))
                .chain(annotated_names(ev.annotation("patternProperties")))
                .collect::<HashSet<String>>();

            let instance = ev.instance.clone();
            let object = match instance.as_object() {
                Some(object) => object,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut evaluated = Vec::new();
            let mut all_valid = true;
            for (key, value) in object {
                if covered.contains(key) {
                    continue;
                }
                evaluated.push(Value::String(key.clone()));
                let results = vm::evaluate_child(
                    &child,
                    Cow::Borrowed(value),
                    &location,
                    &path,
                    &[key.clone()],
                    ctx,
                )?;
                all_valid &= ev.detail(results);
            }
            ev.annotate("additionalProperties", Value::Array(evaluated));
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

pub(crate) fn property_names_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["propertyNames".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;

    Ok(KeywordConstraint::new(
        "propertyNames",
        Arc::new(move |ev, ctx| {
            let keys: Vec<String> = match ev.instance.as_object() {
                Some(object) => object.keys().cloned().collect(),
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut all_valid = true;
            for key in keys {
                let results = vm::evaluate_child(
                    &child,
                    Cow::Owned(Value::String(key.clone())),
                    &location,
                    &path,
                    &[key],
                    ctx,
                )?;
                all_valid &= ev.detail(results);
            }
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

pub(crate) fn required_constraint(names: &[String]) -> KeywordConstraint {
    let names = names.to_vec();
    KeywordConstraint::new(
        "required",
        Arc::new(move |ev, ctx| {
            let missing: Vec<Value> = match ev.instance.as_object() {
                Some(object) => names
                    .iter()
                    .filter(|name| !object.contains_key(*name))
                    .map(|name| Value::String(name.clone()))
                    .collect(),
                None => return Ok(()),
            };
            if !missing.is_empty() {
                ev.fail(ctx, "required", &[("missing", Value::Array(missing))]);
            }
            Ok(())
        }),
    )
}

pub(crate) fn min_properties_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "minProperties",
        Arc::new(move |ev, ctx| {
            let count = match ev.instance.as_object() {
                Some(object) => object.len() as u64,
                None => return Ok(()),
            };
            if count < limit {
                ev.fail(
                    ctx,
                    "minProperties",
                    &[("limit", json!(limit)), ("received", json!(count))],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn max_properties_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "maxProperties",
        Arc::new(move |ev, ctx| {
            let count = match ev.instance.as_object() {
                Some(object) => object.len() as u64,
                None => return Ok(()),
            };
            if count > limit {
                ev.fail(
                    ctx,
                    "maxProperties",
                    &[("limit", json!(limit)), ("received", json!(count))],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn dependent_required_constraint(
    entries: &[(String, Vec<String>)],
) -> KeywordConstraint {
    let entries = entries.to_vec();
    KeywordConstraint::new(
        "dependentRequired",
        Arc::new(move |ev, ctx| {
            let failures: Vec<(String, Vec<Value>)> = match ev.instance.as_object() {
                Some(object) => entries
                    .iter()
                    .filter(|(property, _)| object.contains_key(property))
                    .filter_map(|(property, required)| {
                        let missing: Vec<Value> = required
                            .iter()
                            .filter(|name| !object.contains_key(*name))
                            .map(|name| Value::String(name.clone()))
                            .collect();
                        if missing.is_empty() {
                            None
                        } else {
                            Some((property.clone(), missing))
                        }
                    })
                    .collect(),
                None => return Ok(()),
            };
            for (property, missing) in failures {
                ev.fail(
                    ctx,
                    "dependentRequired",
                    &[
                        ("property", Value::String(property)),
                        ("missing", Value::Array(missing)),
                    ],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn unevaluated_properties_constraint(
    sub: &SchemaRef,
    sc: &Arc<SchemaConstraint>,
    ctx: &mut Context,
) -> Result<KeywordConstraint, Error> {
    let child = compile::get_constraint(
        sub,
        vec!["unevaluatedProperties".to_owned()],
        sc.base_instance_location.clone(),
        Vec::new(),
        ctx,
    )?;

    const SOURCES: &[&str] = &[
        "properties",
        "patternProperties",
        "additionalProperties",
        "unevaluatedProperties",
    ];

    Ok(KeywordConstraint::new(
        "unevaluatedProperties",
        Arc::new(move |ev, ctx| {
            let mut values = Vec::new();
            ev.gather_annotations(SOURCES, &mut values);
            let mut covered = HashSet::new();
            for value in &values {
                for name in annotated_names(Some(value)) {
                    covered.insert(name);
                }
            }

            let instance = ev.instance.clone();
            let object = match instance.as_object() {
                Some(object) => object,
                None => return Ok(()),
            };
            let location = ev.instance_location.clone();
            let path = ev.evaluation_path.clone();

            let mut evaluated = Vec::new();
            let mut all_valid = true;
            for (key, value) in object {
                if covered.contains(key) {
                    continue;
                }
                evaluated.push(Value::String(key.clone()));
                let results = vm::evaluate_child(
                    &child,
                    Cow::Borrowed(value),
                    &location,
                    &path,
                    &[key.clone()],
                    ctx,
                )?;
                all_valid &= ev.detail(results);
            }
            ev.annotate("unevaluatedProperties", Value::Array(evaluated));
            if !all_valid {
                ev.mark_invalid();
            }
            Ok(())
        }),
    ))
}

/// Extracts the property names from a `properties`-family annotation.
fn annotated_names(annotation: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    annotation
        .and_then(Value::as_array)
        .map(|names| names.iter())
        .into_iter()
        .flatten()
        .filter_map(|name| name.as_str().map(str::to_owned))
}
