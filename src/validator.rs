//! Evaluation options and the public evaluation entry point.

use crate::compile::{self, Context, DynamicScope};
use crate::draft::Draft;
use crate::init;
use crate::output::{self, OutputFormat, Results};
use crate::registry::{self, Registry, Resolver};
use crate::schema::Schema;
use crate::vm;
use failure::Error;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Configuration for how evaluation should proceed.
#[derive(Clone)]
pub struct EvalOptions {
    pub(crate) evaluate_as: Draft,
    pub(crate) output_format: OutputFormat,
    pub(crate) culture: String,
    pub(crate) registry: Option<Arc<Registry>>,
    pub(crate) resolver: Option<Arc<dyn Resolver>>,
    pub(crate) process_custom_keywords: bool,
    pub(crate) max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> EvalOptions {
        EvalOptions {
            evaluate_as: Draft::Unspecified,
            output_format: OutputFormat::Flag,
            culture: String::new(),
            registry: None,
            resolver: None,
            process_custom_keywords: false,
            max_depth: 32,
        }
    }
}

impl EvalOptions {
    /// Create a new, default `EvalOptions`.
    pub fn new() -> EvalOptions {
        EvalOptions::default()
    }

    /// Requests a specific draft instead of auto-detection. Schemas that
    /// declare `$schema` keep their declared draft.
    pub fn evaluate_as(&mut self, draft: Draft) -> &mut Self {
        self.evaluate_as = draft;
        self
    }

    /// Selects the output shape. The default is `Flag`, a bare verdict.
    pub fn output_format(&mut self, format: OutputFormat) -> &mut Self {
        self.output_format = format;
        self
    }

    /// Selects the culture used for failure messages, e.g. `"de-DE"`.
    /// Lookup falls back through the language tag to the neutral
    /// culture.
    pub fn culture(&mut self, culture: &str) -> &mut Self {
        self.culture = culture.to_owned();
        self
    }

    /// Uses a per-call registry instead of the process-wide default.
    /// Identifiers the override does not hold still fall back to the
    /// default, so the bundled meta-schemas stay reachable.
    pub fn registry(&mut self, registry: Arc<Registry>) -> &mut Self {
        self.registry = Some(registry);
        self
    }

    /// Installs a resolver for references to schemas the registry does
    /// not hold.
    pub fn resolver(&mut self, resolver: Arc<dyn Resolver>) -> &mut Self {
        self.resolver = Some(resolver);
        self
    }

    /// When set, unrecognized keywords surface their raw values as
    /// annotations; they are preserved for round-tripping either way.
    pub fn process_custom_keywords(&mut self, process: bool) -> &mut Self {
        self.process_custom_keywords = process;
        self
    }

    /// Sets the maximum number of references to follow before aborting
    /// with `MaxDepthExceeded`. The default is to follow 32.
    ///
    /// This exists to catch reference cycles that never consume any of
    /// the instance, such as a schema that is nothing but `$ref` to
    /// itself.
    pub fn max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self
    }
}

impl Schema {
    /// Evaluates an instance against this schema.
    ///
    /// The first call initializes the schema (assigning base
    /// identifiers, collecting anchors, and registering resource roots);
    /// repeat calls reuse that work and the cached constraint graph.
    /// Concurrent evaluations of the same schema are safe.
    ///
    /// A non-conforming instance is *not* an error: it comes back as
    /// [`Results`](struct.Results.html) with `valid() == false`. Errors
    /// are reserved for unusable schemas — parse failures, unresolvable
    /// references, meta-schema chains that never terminate.
    pub fn evaluate(&self, instance: &Value, options: &EvalOptions) -> Result<Results, Error> {
        let registry = options
            .registry
            .clone()
            .unwrap_or_else(registry::global);

        init::initialize(
            &self.root,
            &registry,
            options.evaluate_as,
            options.resolver.as_deref(),
            None,
        )?;

        let mut ctx = Context {
            scope: DynamicScope::new(self.root.base_uri()),
            registry,
            options,
            ref_depth: 0,
        };

        let constraint =
            compile::get_constraint(&self.root, Vec::new(), Vec::new(), Vec::new(), &mut ctx)?;
        let results = vm::evaluate_constraint(
            &constraint,
            Cow::Borrowed(instance),
            Vec::new(),
            Vec::new(),
            &mut ctx,
        )?;
        Ok(output::assemble(results, options.output_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::JsvError;
    use serde_json::json;

    #[test]
    fn degenerate_reference_cycles_hit_the_depth_guard() {
        let schema = Schema::from_value(&json!({"$ref": "#"})).unwrap();
        let mut options = EvalOptions::new();
        options.registry(Arc::new(Registry::new()));

        let err = schema.evaluate(&json!({}), &options).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JsvError>(),
            Some(&JsvError::MaxDepthExceeded)
        );
    }

    #[test]
    fn max_depth_is_configurable() {
        // A chain that consumes one object level per reference hop.
        let schema = Schema::from_value(&json!({
            "type": "object",
            "properties": {"next": {"$ref": "#"}},
        }))
        .unwrap();
        let mut options = EvalOptions::new();
        options.registry(Arc::new(Registry::new())).max_depth(2);

        let shallow = json!({"next": {}});
        assert!(schema.evaluate(&shallow, &options).is_ok());

        let deep = json!({"next": {"next": {"next": {"next": {}}}}});
        let err = schema.evaluate(&deep, &options).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JsvError>(),
            Some(&JsvError::MaxDepthExceeded)
        );
    }
}
