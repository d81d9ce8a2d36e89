use failure::Error;
use jsv::{EvalOptions, OutputFormat, Registry, Schema};
use serde_json::{json, Value};
use std::sync::Arc;

fn evaluate(format: OutputFormat, schema: Value, instance: Value) -> Result<Value, Error> {
    let schema = Schema::from_value(&schema)?;
    let mut options = EvalOptions::new();
    options
        .registry(Arc::new(Registry::new()))
        .output_format(format);
    let results = schema.evaluate(&instance, &options)?;
    Ok(serde_json::to_value(&results)?)
}

#[test]
fn flag_output_is_a_bare_verdict() -> Result<(), Error> {
    let passing = evaluate(OutputFormat::Flag, json!({"type": "string"}), json!("ok"))?;
    assert_eq!(passing, json!({"valid": true}));

    let failing = evaluate(OutputFormat::Flag, json!({"type": "string"}), json!(5))?;
    assert_eq!(failing, json!({"valid": false}));
    Ok(())
}

#[test]
fn hierarchical_output_keeps_the_tree() -> Result<(), Error> {
    let output = evaluate(
        OutputFormat::Hierarchical,
        json!({
            "type": "object",
            "properties": {
                "age": {"type": "integer", "minimum": 0},
            },
        }),
        json!({"age": -1}),
    )?;

    assert_eq!(output["valid"], json!(false));
    assert_eq!(output["evaluationPath"], json!(""));
    assert_eq!(output["instanceLocation"], json!(""));

    let details = output["details"].as_array().expect("children are kept");
    let age = details
        .iter()
        .find(|node| node["evaluationPath"] == json!("/properties/age"))
        .expect("the failing property contributes a node");
    assert_eq!(age["instanceLocation"], json!("/age"));
    assert_eq!(age["valid"], json!(false));
    assert!(age["errors"]["minimum"].is_string());
    Ok(())
}

#[test]
fn list_output_flattens_to_the_interesting_nodes() -> Result<(), Error> {
    let output = evaluate(
        OutputFormat::List,
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"},
            },
        }),
        json!({"a": "x", "b": 2}),
    )?;

    assert_eq!(output["valid"], json!(false));
    let details = output["details"].as_array().expect("a flat list");
    // Every listed node carries errors or annotations, with locations.
    for node in details {
        assert!(node["instanceLocation"].is_string());
        assert!(node.get("details").is_none());
        assert!(node.get("errors").is_some() || node.get("annotations").is_some());
    }
    assert!(details
        .iter()
        .any(|node| node["evaluationPath"] == json!("/properties/a")));
    Ok(())
}

#[test]
fn annotations_survive_on_valid_nodes() -> Result<(), Error> {
    let output = evaluate(
        OutputFormat::Hierarchical,
        json!({
            "title": "Widget",
            "type": "object",
            "properties": {"name": {"type": "string"}},
        }),
        json!({"name": "gear"}),
    )?;

    assert_eq!(output["valid"], json!(true));
    assert_eq!(output["annotations"]["title"], json!("Widget"));
    // properties annotates the names it matched.
    assert_eq!(output["annotations"]["properties"], json!(["name"]));
    Ok(())
}

#[test]
fn annotations_are_dropped_on_invalid_nodes() -> Result<(), Error> {
    let output = evaluate(
        OutputFormat::Hierarchical,
        json!({"title": "Widget", "type": "string"}),
        json!(5),
    )?;

    assert_eq!(output["valid"], json!(false));
    assert!(output.get("annotations").is_none());
    Ok(())
}

#[test]
fn schema_locations_are_absolute() -> Result<(), Error> {
    let output = evaluate(
        OutputFormat::Hierarchical,
        json!({
            "$id": "https://out.example/widget",
            "properties": {"name": {"type": "string"}},
        }),
        json!({"name": 7}),
    )?;

    let details = output["details"].as_array().unwrap();
    let name = details
        .iter()
        .find(|node| node["evaluationPath"] == json!("/properties/name"))
        .unwrap();
    assert_eq!(
        name["schemaLocation"],
        json!("https://out.example/widget#/properties/name")
    );
    Ok(())
}
