use failure::Error;
use jsv::{messages, Draft, EvalOptions, JsvError, OutputFormat, Registry, Resolver, Schema};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Hierarchical options over a private registry, so test schemas stay
/// out of the process-wide namespace.
fn options(registry: &Arc<Registry>) -> EvalOptions {
    let mut options = EvalOptions::new();
    options
        .registry(registry.clone())
        .output_format(OutputFormat::Hierarchical);
    options
}

#[test]
fn min_items_reports_received_and_limit() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({"minItems": 2}))?;
    let options = options(&registry);

    let failing = schema.evaluate(&json!([1]), &options)?;
    assert!(!failing.valid());
    let flat = failing.flatten();
    let failures: Vec<_> = flat.iter().flat_map(|node| node.errors().iter()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "minItems");
    // The message was rendered from received=1, limit=2.
    assert_eq!(failures[0].1, "Value should have at least 2 items but had 1");

    assert!(schema.evaluate(&json!([1, 2]), &options)?.valid());
    Ok(())
}

#[test]
fn self_reference_recurses_through_properties() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$id": "https://test.example/linked-list",
        "type": "object",
        "properties": {"next": {"$ref": "#"}},
    }))?;
    let options = options(&registry);

    assert!(schema
        .evaluate(&json!({"next": {"next": {}}}), &options)?
        .valid());

    let failing = schema.evaluate(&json!({"next": 42}), &options)?;
    assert!(!failing.valid());
    // The reference is transparent in the evaluation path: the type
    // failure surfaces under /properties/next, not behind a $ref token.
    let flat = failing.flatten();
    assert!(flat.iter().any(|node| {
        node.evaluation_path().to_string() == "/properties/next"
            && node.errors().iter().any(|(keyword, _)| keyword == "type")
    }));
    Ok(())
}

#[test]
fn dynamic_anchors_resolve_against_the_outermost_scope() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let options = options(&registry);

    let generic = Schema::from_value(&json!({
        "$id": "https://test.example/generic-node",
        "$dynamicRef": "#T",
        "$defs": {
            "node": {
                "$dynamicAnchor": "T",
                "type": "object",
                "properties": {"data": true},
            },
        },
    }))?;

    let strict = Schema::from_value(&json!({
        "$id": "https://test.example/string-node",
        "$ref": "https://test.example/generic-node",
        "$defs": {
            "node": {
                "$dynamicAnchor": "T",
                "type": "object",
                "properties": {"data": {"type": "string"}},
            },
        },
    }))?;

    let instance = json!({"data": 42});
    // Alone, the generic schema accepts any data.
    assert!(generic.evaluate(&instance, &options)?.valid());
    // Entered through the extension, the outermost dynamic anchor wins
    // and data must be a string.
    assert!(!strict.evaluate(&instance, &options)?.valid());
    assert!(strict
        .evaluate(&json!({"data": "forty-two"}), &options)?
        .valid());
    Ok(())
}

#[test]
fn recursive_anchors_extend_a_2019_tree() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let options = options(&registry);

    let tree = Schema::from_value(&json!({
        "$schema": "https://json-schema.org/draft/2019-09/schema",
        "$id": "https://test.example/tree",
        "$recursiveAnchor": true,
        "type": "object",
        "properties": {
            "data": true,
            "children": {
                "type": "array",
                "items": {"$recursiveRef": "#"},
            },
        },
    }))?;

    let strict_tree = Schema::from_value(&json!({
        "$schema": "https://json-schema.org/draft/2019-09/schema",
        "$id": "https://test.example/strict-tree",
        "$recursiveAnchor": true,
        "$ref": "https://test.example/tree",
        "unevaluatedProperties": false,
    }))?;

    let misspelled = json!({"children": [{"daat": 1}]});
    // The plain tree ignores the typo; the strict tree re-enters itself
    // through the recursive anchor and rejects it at every level.
    assert!(tree.evaluate(&misspelled, &options)?.valid());
    assert!(!strict_tree.evaluate(&misspelled, &options)?.valid());

    let well_formed = json!({"data": 1, "children": [{"data": 2}]});
    assert!(strict_tree.evaluate(&well_formed, &options)?.valid());
    Ok(())
}

#[test]
fn draft_detection_picks_a_draft_where_every_keyword_applies() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    // Numeric exclusiveMinimum does not exist before draft 6; with no
    // $schema the engine must land on draft 6 or later.
    let schema = Schema::from_value(&json!({"type": "integer", "exclusiveMinimum": 5}))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!(6), &options)?.valid());
    assert!(!schema.evaluate(&json!(5), &options)?.valid());
    assert!(schema.draft() >= Draft::Draft6);
    Ok(())
}

#[test]
fn unrecognized_keywords_are_preserved_and_inert() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let source = json!({"x-mine": {"y": 1}, "type": "string"});
    let schema = Schema::from_value(&source)?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!("hi"), &options)?.valid());
    assert_eq!(schema.to_value(), source);

    // Opting in surfaces the raw value as an annotation.
    let mut custom = EvalOptions::new();
    custom
        .registry(registry.clone())
        .output_format(OutputFormat::Hierarchical)
        .process_custom_keywords(true);
    let results = schema.evaluate(&json!("hi"), &custom)?;
    assert_eq!(
        results.annotations().get("x-mine"),
        Some(&json!({"y": 1}))
    );
    Ok(())
}

#[test]
fn the_false_schema_rejects_everything_with_its_message() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!(false))?;
    let options = options(&registry);

    let results = schema.evaluate(&json!(null), &options)?;
    assert!(!results.valid());
    let flat = results.flatten();
    let failure = flat
        .iter()
        .flat_map(|node| node.errors().iter())
        .next()
        .expect("the false schema records a failure");
    assert_eq!(
        failure.1,
        messages::get_message("falseSchema", "").unwrap()
    );
    Ok(())
}

#[test]
fn boolean_schemas_are_unconditional() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let accept = Schema::from_value(&json!(true))?;
    let reject = Schema::from_value(&json!(false))?;
    let options = options(&registry);

    for instance in &[
        json!(null),
        json!(0),
        json!("text"),
        json!([1, 2, 3]),
        json!({"deep": {"object": true}}),
    ] {
        assert!(accept.evaluate(instance, &options)?.valid());
        assert!(!reject.evaluate(instance, &options)?.valid());
    }
    Ok(())
}

#[test]
fn evaluation_is_deterministic() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "minItems": 1, "items": {"type": "string"}},
        },
        "required": ["tags"],
        "additionalProperties": false,
    }))?;
    let options = options(&registry);
    let instance = json!({"tags": ["a", 3], "extra": true});

    let first = schema.evaluate(&instance, &options)?;
    let second = schema.evaluate(&instance, &options)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn round_tripped_schemas_evaluate_identically() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let source = json!({
        "type": ["object", "null"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "score": {"exclusiveMinimum": 0, "multipleOf": 0.5},
        },
        "required": ["name"],
        "x-internal": {"audit": true},
    });
    let schema = Schema::from_value(&source)?;
    let reparsed = Schema::from_value(&schema.to_value())?;
    let options = options(&registry);

    for instance in &[
        json!(null),
        json!({}),
        json!({"name": ""}),
        json!({"name": "ada", "score": 2.5}),
        json!({"name": "ada", "score": 0.3}),
        json!(["not", "an", "object"]),
    ] {
        assert_eq!(
            schema.evaluate(instance, &options)?.valid(),
            reparsed.evaluate(instance, &options)?.valid(),
        );
    }
    Ok(())
}

#[test]
fn conditionals_follow_the_if_verdict() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "if": {"type": "string"},
        "then": {"minLength": 3},
        "else": {"type": "integer"},
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!("abc"), &options)?.valid());
    assert!(!schema.evaluate(&json!("ab"), &options)?.valid());
    assert!(schema.evaluate(&json!(7), &options)?.valid());
    assert!(!schema.evaluate(&json!(7.5), &options)?.valid());
    Ok(())
}

#[test]
fn one_of_requires_exactly_one_match() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "oneOf": [
            {"type": "integer"},
            {"type": "number", "minimum": 10},
        ],
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!(3), &options)?.valid());
    assert!(schema.evaluate(&json!(10.5), &options)?.valid());
    // 12 matches both branches.
    assert!(!schema.evaluate(&json!(12), &options)?.valid());
    assert!(!schema.evaluate(&json!("neither"), &options)?.valid());
    Ok(())
}

#[test]
fn prefix_items_and_items_split_the_array() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "prefixItems": [{"type": "string"}],
        "items": {"type": "integer"},
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!(["head", 1, 2]), &options)?.valid());
    assert!(!schema.evaluate(&json!([1, 2]), &options)?.valid());
    assert!(!schema.evaluate(&json!(["head", "tail"]), &options)?.valid());
    Ok(())
}

#[test]
fn positional_items_reject_2020_schemas() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "items": [{"type": "string"}],
    }))?;
    let err = schema
        .evaluate(&json!(["a"]), &options(&registry))
        .unwrap_err();
    match err.downcast_ref::<JsvError>() {
        Some(JsvError::UnsupportedSchema { keyword, draft }) => {
            assert_eq!(keyword, "items");
            assert_eq!(*draft, Draft::Draft202012);
        }
        other => panic!("expected UnsupportedSchema, got {:?}", other),
    }
    Ok(())
}

#[test]
fn legacy_items_with_additional_items() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "items": [{"type": "string"}],
        "additionalItems": {"type": "integer"},
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!(["head", 1, 2]), &options)?.valid());
    assert!(!schema.evaluate(&json!(["head", "tail"]), &options)?.valid());
    Ok(())
}

#[test]
fn unevaluated_properties_see_through_in_place_applicators() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "allOf": [
            {"properties": {"a": {"type": "integer"}}},
            {"properties": {"b": {"type": "integer"}}},
        ],
        "unevaluatedProperties": false,
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!({"a": 1, "b": 2}), &options)?.valid());
    assert!(!schema
        .evaluate(&json!({"a": 1, "b": 2, "c": 3}), &options)?
        .valid());
    Ok(())
}

#[test]
fn contains_interacts_with_its_bounds() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "contains": {"type": "integer"},
        "minContains": 2,
        "maxContains": 3,
    }))?;
    let options = options(&registry);

    assert!(!schema.evaluate(&json!(["a", 1]), &options)?.valid());
    assert!(schema.evaluate(&json!(["a", 1, 2]), &options)?.valid());
    assert!(!schema.evaluate(&json!([1, 2, 3, 4]), &options)?.valid());

    // minContains: 0 makes an empty match acceptable.
    let lenient = Schema::from_value(&json!({
        "contains": {"type": "integer"},
        "minContains": 0,
    }))?;
    assert!(lenient.evaluate(&json!(["a", "b"]), &options)?.valid());
    Ok(())
}

#[test]
fn unresolved_references_abort_with_the_offending_identifier() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "properties": {
            "payload": {"$ref": "https://nowhere.test/missing"},
        },
    }))?;
    let err = schema
        .evaluate(&json!({"payload": 1}), &options(&registry))
        .unwrap_err();
    match err.downcast_ref::<JsvError>() {
        Some(JsvError::UnresolvedReference {
            uri,
            evaluation_path,
        }) => {
            assert!(uri.contains("nowhere.test/missing"));
            assert_eq!(evaluation_path, "/properties/payload");
        }
        other => panic!("expected UnresolvedReference, got {:?}", other),
    }
    Ok(())
}

#[test]
fn requested_drafts_reject_foreign_keywords() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$defs": {"a": true},
        "type": "object",
    }))?;
    let mut options = options(&registry);
    options.evaluate_as(Draft::Draft7);

    let err = schema.evaluate(&json!({}), &options).unwrap_err();
    match err.downcast_ref::<JsvError>() {
        Some(JsvError::UnsupportedSchema { keyword, draft }) => {
            assert_eq!(keyword, "$defs");
            assert_eq!(*draft, Draft::Draft7);
        }
        other => panic!("expected UnsupportedSchema, got {:?}", other),
    }
    Ok(())
}

struct ChainResolver;

impl Resolver for ChainResolver {
    fn resolve(&self, id: &Url) -> Result<Option<Value>, Error> {
        match id.as_str() {
            // A custom meta-schema that itself declares draft 7.
            "https://meta.test/v1" => Ok(Some(json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "$id": "https://meta.test/v1",
            }))),
            // Two meta-schemas that point at each other.
            "https://meta.test/loop-a" => Ok(Some(json!({
                "$schema": "https://meta.test/loop-b",
                "$id": "https://meta.test/loop-a",
            }))),
            "https://meta.test/loop-b" => Ok(Some(json!({
                "$schema": "https://meta.test/loop-a",
                "$id": "https://meta.test/loop-b",
            }))),
            _ => Ok(None),
        }
    }
}

#[test]
fn custom_meta_schema_chains_resolve_to_their_draft() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let mut options = options(&registry);
    options.resolver(Arc::new(ChainResolver));

    let schema = Schema::from_value(&json!({
        "$schema": "https://meta.test/v1",
        "type": "integer",
    }))?;
    assert!(schema.evaluate(&json!(3), &options)?.valid());
    assert_eq!(schema.draft(), Draft::Draft7);
    Ok(())
}

#[test]
fn meta_schema_cycles_are_unresolvable() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let mut options = options(&registry);
    options.resolver(Arc::new(ChainResolver));

    let schema = Schema::from_value(&json!({
        "$schema": "https://meta.test/loop-a",
    }))?;
    let err = schema.evaluate(&json!({}), &options).unwrap_err();
    match err.downcast_ref::<JsvError>() {
        Some(JsvError::UnresolvableMetaSchema { uri }) => {
            assert!(uri.contains("meta.test/loop"));
        }
        other => panic!("expected UnresolvableMetaSchema, got {:?}", other),
    }
    Ok(())
}

#[test]
fn messages_localize_through_the_culture_option() -> Result<(), Error> {
    messages::set_message(
        "minItems",
        "de",
        "mindestens [[limit]] Elemente erwartet, [[received]] erhalten",
    );

    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({"minItems": 2}))?;
    let mut localized = options(&registry);
    localized.culture("de-DE");

    let results = schema.evaluate(&json!([1]), &localized)?;
    let flat = results.flatten();
    let failure = flat
        .iter()
        .flat_map(|node| node.errors().iter())
        .next()
        .unwrap();
    assert_eq!(failure.1, "mindestens 2 Elemente erwartet, 1 erhalten");
    Ok(())
}

#[test]
fn legacy_fragment_ids_act_as_anchors() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": "https://test.example/legacy-anchored",
        "definitions": {
            "positive": {"$id": "#positive", "type": "integer", "minimum": 1},
        },
        "properties": {
            "count": {"$ref": "#positive"},
        },
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!({"count": 2}), &options)?.valid());
    assert!(!schema.evaluate(&json!({"count": 0}), &options)?.valid());
    Ok(())
}

#[test]
fn embedded_resource_roots_register_and_resolve() -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let schema = Schema::from_value(&json!({
        "$id": "https://test.example/bundle",
        "properties": {
            "item": {"$ref": "part"},
        },
        "$defs": {
            "part": {
                "$id": "https://test.example/part",
                "type": "string",
            },
        },
    }))?;
    let options = options(&registry);

    assert!(schema.evaluate(&json!({"item": "ok"}), &options)?.valid());
    assert!(!schema.evaluate(&json!({"item": 5}), &options)?.valid());

    let part: Url = "https://test.example/part".parse()?;
    assert!(registry.get(&part).is_some());
    Ok(())
}
