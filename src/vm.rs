//! Execution of compiled constraints against an instance.
//!
//! An [`Evaluation`] binds one schema constraint to one instance
//! location. Keyword constraints run in compiled order; each may fail
//! (recording a rendered message), produce annotations visible to
//! later siblings, recurse into child constraints, or be skipped when a
//! sibling annotation it depends on is missing.

use crate::compile::{Context, KeywordConstraint, SchemaConstraint};
use crate::messages;
use crate::output::Results;
use failure::Error;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use url::Url;

/// The per-call binding of a schema constraint to an instance location.
pub(crate) struct Evaluation<'i> {
    pub instance: Cow<'i, Value>,
    pub instance_location: Vec<String>,
    pub evaluation_path: Vec<String>,
    schema_location: Url,
    annotations: Map<String, Value>,
    errors: Vec<(String, String)>,
    details: Vec<Results>,
    invalid: bool,
}

impl<'i> Evaluation<'i> {
    fn new(
        instance: Cow<'i, Value>,
        instance_location: Vec<String>,
        evaluation_path: Vec<String>,
        schema_location: Url,
    ) -> Evaluation<'i> {
        Evaluation {
            instance,
            instance_location,
            evaluation_path,
            schema_location,
            annotations: Map::new(),
            errors: Vec::new(),
            details: Vec::new(),
            invalid: false,
        }
    }

    /// Records an annotation under the given keyword, visible to
    /// later-priority siblings in this same evaluation.
    pub fn annotate(&mut self, keyword: &str, value: Value) {
        self.annotations.insert(keyword.to_owned(), value);
    }

    pub fn annotation(&self, keyword: &str) -> Option<&Value> {
        self.annotations.get(keyword)
    }

    /// Records a failure for `keyword`, rendering its message template
    /// with the named parameters.
    pub fn fail(&mut self, ctx: &Context, keyword: &str, params: &[(&str, Value)]) {
        self.fail_as(ctx, keyword, keyword, params);
    }

    /// Like [`fail`](#method.fail) but with a separate message key; the
    /// false-schema failure has no keyword of its own.
    pub fn fail_as(
        &mut self,
        ctx: &Context,
        keyword: &str,
        message_key: &str,
        params: &[(&str, Value)],
    ) {
        let message = messages::render(message_key, &ctx.options.culture, params);
        self.errors.push((keyword.to_owned(), message));
        self.invalid = true;
    }

    /// Marks the evaluation invalid without a message of its own; used
    /// by applicators whose children carry the real diagnostics.
    pub fn mark_invalid(&mut self) {
        self.invalid = true;
    }

    /// Attaches a child result, returning whether it was valid.
    pub fn detail(&mut self, results: Results) -> bool {
        let valid = results.valid();
        self.details.push(results);
        valid
    }

    /// Collects annotation values for the given keywords from this
    /// evaluation and from every valid child result at the same
    /// instance location. This is how `unevaluatedProperties` and
    /// `unevaluatedItems` see what in-place applicators covered.
    pub fn gather_annotations(&self, keywords: &[&str], out: &mut Vec<Value>) {
        for name in keywords {
            if let Some(value) = self.annotations.get(*name) {
                out.push(value.clone());
            }
        }
        for detail in &self.details {
            detail.gather_annotations(&self.instance_location, keywords, out);
        }
    }

    fn into_results(self) -> Results {
        let valid = !self.invalid;
        // Annotations from a failed schema are dropped, per the 2020-12
        // output specification.
        let annotations = if valid { self.annotations } else { Map::new() };
        Results::node(
            valid,
            self.evaluation_path,
            self.schema_location,
            self.instance_location,
            self.errors,
            annotations,
            self.details,
        )
    }
}

/// Executes a schema constraint at an instance location.
///
/// Entering a constraint whose base differs from the top of the scope
/// stack pushes the new resource root; the push is balanced on exit, so
/// the stack length is identical before and after every call.
pub(crate) fn evaluate_constraint<'a>(
    constraint: &Arc<SchemaConstraint>,
    instance: Cow<'a, Value>,
    instance_location: Vec<String>,
    evaluation_path: Vec<String>,
    ctx: &mut Context,
) -> Result<Results, Error> {
    let depth_before = ctx.scope.len();
    let pushed = ctx.scope.enter(constraint.base_uri.clone());

    let mut evaluation = Evaluation::new(
        instance,
        instance_location,
        evaluation_path,
        constraint.schema_location.clone(),
    );

    let keyword_constraints = constraint.keyword_constraints();
    let outcome = run_keywords(&keyword_constraints, &mut evaluation, ctx);

    if pushed {
        ctx.scope.exit();
    }
    debug_assert_eq!(ctx.scope.len(), depth_before);
    outcome?;
    Ok(evaluation.into_results())
}

fn run_keywords(
    keyword_constraints: &[KeywordConstraint],
    evaluation: &mut Evaluation<'_>,
    ctx: &mut Context,
) -> Result<(), Error> {
    for kc in keyword_constraints {
        let unmet = kc
            .dependencies
            .iter()
            .any(|dep| evaluation.annotation(dep).is_none());
        if unmet {
            // A dependency is missing or was skipped; this keyword
            // produces no result.
            continue;
        }
        (kc.evaluator)(evaluation, ctx)?;
    }
    Ok(())
}

/// Evaluates a child constraint beneath a parent evaluation. The child's
/// locations are the parent's plus the constraint's relative tokens plus
/// any per-element extras (an array index, a matched property name).
pub(crate) fn evaluate_child<'a>(
    constraint: &Arc<SchemaConstraint>,
    instance: Cow<'a, Value>,
    parent_instance_location: &[String],
    parent_evaluation_path: &[String],
    extra_instance: &[String],
    ctx: &mut Context,
) -> Result<Results, Error> {
    let mut instance_location = parent_instance_location.to_vec();
    instance_location.extend(constraint.relative_instance_location.iter().cloned());
    instance_location.extend(extra_instance.iter().cloned());

    let mut evaluation_path = parent_evaluation_path.to_vec();
    evaluation_path.extend(constraint.relative_evaluation_path.iter().cloned());

    evaluate_constraint(constraint, instance, instance_location, evaluation_path, ctx)
}

/// Evaluates a child constraint against the parent's own instance and
/// locations; the shape every in-place applicator uses.
pub(crate) fn eval_in_place(
    constraint: &Arc<SchemaConstraint>,
    parent: &Evaluation<'_>,
    ctx: &mut Context,
) -> Result<Results, Error> {
    let instance = parent.instance.clone();
    let location = parent.instance_location.clone();
    let path = parent.evaluation_path.clone();
    evaluate_child(constraint, instance, &location, &path, &[], ctx)
}

/// The sole keyword constraint of a `false` schema: fail everything.
pub(crate) fn false_schema_constraint() -> KeywordConstraint {
    KeywordConstraint::new(
        "",
        Arc::new(|evaluation, ctx| {
            evaluation.fail_as(ctx, "", "falseSchema", &[]);
            Ok(())
        }),
    )
}
