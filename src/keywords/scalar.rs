//! Assertions on primitive values, plus the annotation-only keywords.

use crate::compile::KeywordConstraint;
use crate::keywords::{SimpleType, TypeSet};
use crate::schema;
use regex::Regex;
use serde_json::{json, Number, Value};
use std::sync::Arc;

fn matches_type(expected: SimpleType, instance: &Value) -> bool {
    match expected {
        SimpleType::Null => instance.is_null(),
        SimpleType::Boolean => instance.is_boolean(),
        SimpleType::Object => instance.is_object(),
        SimpleType::Array => instance.is_array(),
        SimpleType::String => instance.is_string(),
        SimpleType::Number => instance.is_number(),
        // Integer-valued floats such as 1.0 count as integers.
        SimpleType::Integer => {
            instance.is_i64()
                || instance.is_u64()
                || instance.as_f64().map(|n| n.fract() == 0.0).unwrap_or(false)
        }
    }
}

pub(crate) fn type_constraint(set: &TypeSet) -> KeywordConstraint {
    let types = set.types.clone();
    let expected = types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    KeywordConstraint::new(
        "type",
        Arc::new(move |ev, ctx| {
            let matched = types.iter().any(|t| matches_type(*t, ev.instance.as_ref()));
            if !matched {
                let received = schema::type_name(ev.instance.as_ref());
                ev.fail(
                    ctx,
                    "type",
                    &[
                        ("received", json!(received)),
                        ("expected", json!(expected.clone())),
                    ],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn enum_constraint(values: &[Value]) -> KeywordConstraint {
    let values = values.to_vec();
    KeywordConstraint::new(
        "enum",
        Arc::new(move |ev, ctx| {
            let matched = values.iter().any(|value| value == ev.instance.as_ref());
            if !matched {
                ev.fail(ctx, "enum", &[]);
            }
            Ok(())
        }),
    )
}

pub(crate) fn const_constraint(value: &Value) -> KeywordConstraint {
    let expected = value.clone();
    KeywordConstraint::new(
        "const",
        Arc::new(move |ev, ctx| {
            if ev.instance.as_ref() != &expected {
                ev.fail(ctx, "const", &[("expected", expected.clone())]);
            }
            Ok(())
        }),
    )
}

pub(crate) fn min_length_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "minLength",
        Arc::new(move |ev, ctx| {
            let length = match ev.instance.as_str() {
                Some(text) => text.chars().count() as u64,
                None => return Ok(()),
            };
            if length < limit {
                ev.fail(
                    ctx,
                    "minLength",
                    &[("limit", json!(limit)), ("received", json!(length))],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn max_length_constraint(limit: u64) -> KeywordConstraint {
    KeywordConstraint::new(
        "maxLength",
        Arc::new(move |ev, ctx| {
            let length = match ev.instance.as_str() {
                Some(text) => text.chars().count() as u64,
                None => return Ok(()),
            };
            if length > limit {
                ev.fail(
                    ctx,
                    "maxLength",
                    &[("limit", json!(limit)), ("received", json!(length))],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn pattern_constraint(source: &str, regex: Regex) -> KeywordConstraint {
    let source = source.to_owned();
    KeywordConstraint::new(
        "pattern",
        Arc::new(move |ev, ctx| {
            let matched = match ev.instance.as_str() {
                Some(text) => regex.is_match(text),
                None => return Ok(()),
            };
            if !matched {
                ev.fail(ctx, "pattern", &[("pattern", json!(source.clone()))]);
            }
            Ok(())
        }),
    )
}

/// One constraint covers all four numeric bounds; numbers are compared
/// as doubles.
pub(crate) fn bound_constraint(
    name: &'static str,
    limit: &Number,
    exclusive: bool,
    lower: bool,
) -> KeywordConstraint {
    let limit = limit.clone();
    KeywordConstraint::new(
        name,
        Arc::new(move |ev, ctx| {
            let received = match ev.instance.as_f64() {
                Some(n) => n,
                None => return Ok(()),
            };
            let bound = match limit.as_f64() {
                Some(n) => n,
                None => return Ok(()),
            };
            let ok = match (lower, exclusive) {
                (true, false) => received >= bound,
                (true, true) => received > bound,
                (false, false) => received <= bound,
                (false, true) => received < bound,
            };
            if !ok {
                let received_value = ev.instance.as_ref().clone();
                ev.fail(
                    ctx,
                    name,
                    &[
                        ("received", received_value),
                        ("limit", Value::Number(limit.clone())),
                    ],
                );
            }
            Ok(())
        }),
    )
}

pub(crate) fn multiple_of_constraint(divisor: &Number) -> KeywordConstraint {
    let divisor = divisor.clone();
    KeywordConstraint::new(
        "multipleOf",
        Arc::new(move |ev, ctx| {
            let received = match ev.instance.as_f64() {
                Some(n) => n,
                None => return Ok(()),
            };
            let by = match divisor.as_f64() {
                Some(n) => n,
                None => return Ok(()),
            };
            let remainder = (received / by).fract().abs();
            let ok = remainder < f64::EPSILON || (1.0 - remainder) < f64::EPSILON;
            if !ok {
                let received_value = ev.instance.as_ref().clone();
                ev.fail(
                    ctx,
                    "multipleOf",
                    &[
                        ("received", received_value),
                        ("divisor", Value::Number(divisor.clone())),
                    ],
                );
            }
            Ok(())
        }),
    )
}

/// `title`, `description`, `format`, and friends only leave their value
/// behind as an annotation.
pub(crate) fn annotation_constraint(name: &'static str, value: Value) -> KeywordConstraint {
    KeywordConstraint::new(
        name,
        Arc::new(move |ev, _ctx| {
            ev.annotate(name, value.clone());
            Ok(())
        }),
    )
}
