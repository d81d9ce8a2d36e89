//! Compilation of schemas into constraint graphs.
//!
//! A [`SchemaConstraint`] is the compiled form of one schema in one
//! dynamic scope. Schemas that transitively contain `$dynamicRef` or
//! `$recursiveRef` must be compiled per scope, because those references
//! resolve against the runtime scope stack; everything else compiles
//! once and is reused everywhere through the `source` link, so the
//! evaluator closures are shared.
//!
//! Compile-then-insert is atomic per schema: a constraint is published
//! to the cache only once its keyword constraints are in place, and the
//! publisher double-checks for a concurrent winner under the cache
//! lock. Reference keywords resolve lazily at evaluation time, so
//! compilation never recurses through a cycle and needs no provisional
//! cache entries.

use crate::draft::Draft;
use crate::errors::JsvError;
use crate::keywords::Keyword;
use crate::registry::Registry;
use crate::schema::SchemaRef;
use crate::validator::EvalOptions;
use crate::vm::{self, Evaluation};
use failure::Error;
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// The ordered stack of resource roots entered during compilation or
/// evaluation. Two scopes are equal iff their stacks are element-wise
/// equal; the stack is both the resolution context for dynamic
/// references and the constraint-cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DynamicScope {
    stack: Vec<Url>,
}

impl DynamicScope {
    pub fn new(root: Url) -> DynamicScope {
        DynamicScope { stack: vec![root] }
    }

    pub fn top(&self) -> &Url {
        self.stack.last().expect("a dynamic scope is never empty")
    }

    /// Pushes `base` if it differs from the current top. Returns whether
    /// a push happened, so the caller can balance it with `exit`.
    pub fn enter(&mut self, base: Url) -> bool {
        if self.top() == &base {
            return false;
        }
        self.stack.push(base);
        true
    }

    pub fn exit(&mut self) {
        self.stack.pop();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Resource roots from the outermost inward, the resolution order
    /// for `$dynamicRef` and `$recursiveRef`.
    pub fn outermost_first(&self) -> impl Iterator<Item = &Url> {
        self.stack.iter()
    }
}

/// Shared state threaded through compilation and evaluation.
pub(crate) struct Context<'o> {
    pub scope: DynamicScope,
    pub registry: Arc<Registry>,
    pub options: &'o EvalOptions,
    /// Reference-following depth, bounded by `EvalOptions::max_depth`.
    pub ref_depth: usize,
}

/// The evaluator of one compiled keyword: a pure function of the
/// evaluation it is invoked on and the shared context.
pub(crate) type Evaluator =
    Arc<dyn Fn(&mut Evaluation<'_>, &mut Context<'_>) -> Result<(), Error> + Send + Sync>;

/// One compiled keyword inside a [`SchemaConstraint`].
pub(crate) struct KeywordConstraint {
    pub keyword: String,
    /// Sibling keywords whose annotations must be present for this
    /// keyword to run; when one is missing or skipped, this keyword is
    /// skipped.
    pub dependencies: Vec<&'static str>,
    pub evaluator: Evaluator,
}

impl KeywordConstraint {
    pub fn new(keyword: &str, evaluator: Evaluator) -> KeywordConstraint {
        KeywordConstraint {
            keyword: keyword.to_owned(),
            dependencies: Vec::new(),
            evaluator,
        }
    }

    pub fn depending_on(mut self, dependencies: &[&'static str]) -> KeywordConstraint {
        self.dependencies = dependencies.to_vec();
        self
    }
}

/// The compiled form of one schema in one dynamic scope.
pub(crate) struct SchemaConstraint {
    /// Evaluation-path tokens relative to the parent constraint.
    pub relative_evaluation_path: Vec<String>,
    /// Instance location of the compiling parent, for bookkeeping.
    pub base_instance_location: Vec<String>,
    /// Instance-location tokens this constraint appends to its parent's.
    pub relative_instance_location: Vec<String>,
    /// The base identifier in effect when this constraint was compiled.
    pub base_uri: Url,
    /// Absolute location of the source schema object.
    pub schema_location: Url,
    pub schema: SchemaRef,
    keywords: RwLock<Arc<Vec<KeywordConstraint>>>,
    /// When set, this constraint is a re-entry of `source` in an
    /// equivalent scope and shares its keyword constraints.
    pub source: Option<Arc<SchemaConstraint>>,
}

impl SchemaConstraint {
    /// The keyword constraints to execute, following the `source` chain.
    pub fn keyword_constraints(&self) -> Arc<Vec<KeywordConstraint>> {
        match &self.source {
            Some(source) => source.keyword_constraints(),
            None => self.keywords.read().clone(),
        }
    }

    fn set_keywords(&self, constraints: Vec<KeywordConstraint>) {
        *self.keywords.write() = Arc::new(constraints);
    }
}

/// Returns the constraint for `schema` in the current dynamic scope,
/// building and caching it on first use.
pub(crate) fn get_constraint(
    schema: &SchemaRef,
    relative_evaluation_path: Vec<String>,
    base_instance_location: Vec<String>,
    relative_instance_location: Vec<String>,
    ctx: &mut Context,
) -> Result<Arc<SchemaConstraint>, Error> {
    if schema.is_dynamic() {
        let cached = {
            let cache = schema.constraints.lock();
            cache
                .iter()
                .find(|(scope, _)| *scope == ctx.scope)
                .map(|(_, constraint)| constraint.clone())
        };
        if let Some(cached) = cached {
            return Ok(link(
                &cached,
                schema,
                relative_evaluation_path,
                base_instance_location,
                relative_instance_location,
            ));
        }
    } else if let Some(cached) = schema.static_constraint.read().clone() {
        // Static schemas compile identically in every scope, so any
        // previously built constraint can be reused.
        return Ok(link(
            &cached,
            schema,
            relative_evaluation_path,
            base_instance_location,
            relative_instance_location,
        ));
    }

    build_constraint(
        schema,
        relative_evaluation_path,
        base_instance_location,
        relative_instance_location,
        ctx,
    )
}

fn link(
    cached: &Arc<SchemaConstraint>,
    schema: &SchemaRef,
    relative_evaluation_path: Vec<String>,
    base_instance_location: Vec<String>,
    relative_instance_location: Vec<String>,
) -> Arc<SchemaConstraint> {
    Arc::new(SchemaConstraint {
        relative_evaluation_path,
        base_instance_location,
        relative_instance_location,
        base_uri: cached.base_uri.clone(),
        schema_location: cached.schema_location.clone(),
        schema: schema.clone(),
        keywords: RwLock::new(Arc::new(Vec::new())),
        source: Some(cached.clone()),
    })
}

fn build_constraint(
    schema: &SchemaRef,
    relative_evaluation_path: Vec<String>,
    base_instance_location: Vec<String>,
    relative_instance_location: Vec<String>,
    ctx: &mut Context,
) -> Result<Arc<SchemaConstraint>, Error> {
    let base_uri = schema.base_uri();
    let constraint = Arc::new(SchemaConstraint {
        relative_evaluation_path,
        base_instance_location,
        relative_instance_location,
        base_uri: base_uri.clone(),
        schema_location: location_url(&base_uri, &schema.location()),
        schema: schema.clone(),
        keywords: RwLock::new(Arc::new(Vec::new())),
        source: None,
    });

    if let Some(value) = schema.bool_value() {
        if !value {
            constraint.set_keywords(vec![vm::false_schema_constraint()]);
        }
        return Ok(publish(schema, constraint, ctx));
    }

    let draft = schema.draft();

    // Drafts 6/7: a $ref suppresses every sibling keyword.
    if draft.ref_takes_precedence() {
        if let Some(Keyword::Ref(reference)) = schema.keyword("$ref") {
            let kc = crate::keywords::core::ref_constraint(reference, &constraint)?;
            constraint.set_keywords(vec![kc]);
            return Ok(publish(schema, constraint, ctx));
        }
    }

    let pushed = ctx.scope.enter(base_uri);
    let compiled = compile_keywords(schema, &constraint, draft, ctx);
    if pushed {
        ctx.scope.exit();
    }
    constraint.set_keywords(compiled?);
    Ok(publish(schema, constraint, ctx))
}

/// Appends a fully built constraint to the schema's cache. When a
/// concurrent compiler won the race, its entry stays (one constraint
/// per scope) and the loser becomes a link to it.
fn publish(
    schema: &SchemaRef,
    constraint: Arc<SchemaConstraint>,
    ctx: &Context,
) -> Arc<SchemaConstraint> {
    if schema.is_dynamic() {
        let mut cache = schema.constraints.lock();
        if let Some((_, won)) = cache.iter().find(|(scope, _)| *scope == ctx.scope) {
            let won = won.clone();
            return link(
                &won,
                schema,
                constraint.relative_evaluation_path.clone(),
                constraint.base_instance_location.clone(),
                constraint.relative_instance_location.clone(),
            );
        }
        cache.push((ctx.scope.clone(), constraint.clone()));
    } else {
        let mut slot = schema.static_constraint.write();
        if let Some(won) = slot.clone() {
            return link(
                &won,
                schema,
                constraint.relative_evaluation_path.clone(),
                constraint.base_instance_location.clone(),
                constraint.relative_instance_location.clone(),
            );
        }
        *slot = Some(constraint.clone());
    }
    constraint
}

fn compile_keywords(
    schema: &SchemaRef,
    constraint: &Arc<SchemaConstraint>,
    draft: Draft,
    ctx: &mut Context,
) -> Result<Vec<KeywordConstraint>, Error> {
    let mut ordered: Vec<&Keyword> = schema.keywords().iter().collect();
    // Stable: equal priorities keep the schema's insertion order.
    ordered.sort_by_key(|kw| kw.priority());

    let mut compiled = Vec::new();
    for keyword in ordered {
        if !matches!(keyword, Keyword::Unrecognized { .. }) && !keyword.supports().contains(draft) {
            fail!(JsvError::UnsupportedSchema {
                keyword: keyword.name().to_owned(),
                draft,
            });
        }
        if let Some(kc) = keyword.get_constraint(constraint, &compiled, ctx)? {
            compiled.push(kc);
        }
    }
    Ok(compiled)
}

/// Renders a schema location as its base identifier plus a JSON Pointer
/// fragment.
pub(crate) fn location_url(base: &Url, tokens: &[String]) -> Url {
    let mut url = base.clone();
    if tokens.is_empty() {
        url.set_fragment(None);
    } else {
        let pointer: String = tokens
            .iter()
            .map(|token| format!("/{}", token.replace('~', "~0").replace('/', "~1")))
            .collect();
        url.set_fragment(Some(&pointer));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_equality_is_elementwise() {
        let a: Url = "https://example.com/a".parse().unwrap();
        let b: Url = "https://example.com/b".parse().unwrap();

        let mut first = DynamicScope::new(a.clone());
        first.enter(b.clone());
        let mut second = DynamicScope::new(a.clone());
        assert_ne!(first, second);
        second.enter(b.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn entering_the_current_base_does_not_push() {
        let a: Url = "https://example.com/a".parse().unwrap();
        let mut scope = DynamicScope::new(a.clone());
        assert!(!scope.enter(a.clone()));
        assert_eq!(scope.len(), 1);

        let b: Url = "https://example.com/b".parse().unwrap();
        assert!(scope.enter(b));
        assert_eq!(scope.len(), 2);
        scope.exit();
        assert_eq!(scope.top(), &a);
    }

    #[test]
    fn location_fragments_escape_pointer_tokens() {
        let base: Url = "https://example.com/s".parse().unwrap();
        let plain = location_url(&base, &["properties".into(), "a/b".into()]);
        assert_eq!(plain.fragment(), Some("/properties/a~1b"));

        let bare = location_url(&base, &[]);
        assert_eq!(bare.fragment(), None);
    }
}
