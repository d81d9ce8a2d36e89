//! The results tree and its output formats.
//!
//! Evaluation always produces the full hierarchical tree; the assembler
//! collapses it to the requested shape. Serialization follows the JSON
//! Schema 2020-12 output specification: `valid`, `evaluationPath`,
//! `schemaLocation`, `instanceLocation`, keyword-keyed `errors` and
//! `annotations` maps, and nested `details`.

use json_pointer::JsonPointer;
use ::serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use url::Url;

/// How much of the results tree the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A single `{"valid": bool}` verdict.
    Flag,
    /// A flat, depth-first list of the nodes that carry errors or
    /// annotations.
    List,
    /// The full tree.
    Hierarchical,
}

/// One node of the evaluation results tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    valid: bool,
    evaluation_path: Vec<String>,
    schema_location: Url,
    instance_location: Vec<String>,
    errors: Vec<(String, String)>,
    annotations: Map<String, Value>,
    details: Vec<Results>,
    format: OutputFormat,
}

impl Results {
    pub(crate) fn node(
        valid: bool,
        evaluation_path: Vec<String>,
        schema_location: Url,
        instance_location: Vec<String>,
        errors: Vec<(String, String)>,
        annotations: Map<String, Value>,
        details: Vec<Results>,
    ) -> Results {
        Results {
            valid,
            evaluation_path,
            schema_location,
            instance_location,
            errors,
            annotations,
            details,
            format: OutputFormat::Hierarchical,
        }
    }

    /// Whether the instance conformed to the schema at this node.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The path of applicator keywords that led here.
    pub fn evaluation_path(&self) -> JsonPointer<String, Vec<String>> {
        JsonPointer::new(self.evaluation_path.clone())
    }

    /// The absolute location of the schema object that produced this
    /// node.
    pub fn schema_location(&self) -> &Url {
        &self.schema_location
    }

    /// A pointer into the instance at this node.
    pub fn instance_location(&self) -> JsonPointer<String, Vec<String>> {
        JsonPointer::new(self.instance_location.clone())
    }

    /// Failure messages keyed by keyword name. Empty when valid.
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    /// Annotations keyed by keyword name. Dropped on invalid nodes.
    pub fn annotations(&self) -> &Map<String, Value> {
        &self.annotations
    }

    pub fn details(&self) -> &[Results] {
        &self.details
    }

    /// Depth-first iteration over this node and every descendant.
    pub fn flatten(&self) -> Vec<&Results> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Results>) {
        out.push(self);
        for detail in &self.details {
            detail.collect(out);
        }
    }

    /// Collects annotation values for the given keywords from every
    /// valid node of this subtree that sits at `location`. Child results
    /// for other instance locations (a property's value, an array
    /// element) are excluded; in-place applicators are traversed.
    pub(crate) fn gather_annotations(
        &self,
        location: &[String],
        keywords: &[&str],
        out: &mut Vec<Value>,
    ) {
        if !self.valid || self.instance_location != location {
            return;
        }
        for name in keywords {
            if let Some(value) = self.annotations.get(*name) {
                out.push(value.clone());
            }
        }
        for detail in &self.details {
            detail.gather_annotations(location, keywords, out);
        }
    }

    /// A shallow copy without children; list entries serialize like
    /// hierarchical nodes that happen to have no details.
    fn leaf(&self) -> Results {
        Results {
            valid: self.valid,
            evaluation_path: self.evaluation_path.clone(),
            schema_location: self.schema_location.clone(),
            instance_location: self.instance_location.clone(),
            errors: self.errors.clone(),
            annotations: self.annotations.clone(),
            details: Vec::new(),
            format: OutputFormat::Hierarchical,
        }
    }

    fn collect_list(&self, out: &mut Vec<Results>) {
        if !self.errors.is_empty() || !self.annotations.is_empty() {
            out.push(self.leaf());
        }
        for detail in &self.details {
            detail.collect_list(out);
        }
    }
}

/// Collapses a hierarchical tree to the requested output format.
pub(crate) fn assemble(results: Results, format: OutputFormat) -> Results {
    match format {
        OutputFormat::Hierarchical => results,
        OutputFormat::Flag => Results {
            valid: results.valid,
            evaluation_path: Vec::new(),
            schema_location: results.schema_location.clone(),
            instance_location: Vec::new(),
            errors: Vec::new(),
            annotations: Map::new(),
            details: Vec::new(),
            format: OutputFormat::Flag,
        },
        OutputFormat::List => {
            let mut flat = Vec::new();
            results.collect_list(&mut flat);
            Results {
                valid: results.valid,
                evaluation_path: Vec::new(),
                schema_location: results.schema_location.clone(),
                instance_location: Vec::new(),
                errors: Vec::new(),
                annotations: Map::new(),
                details: flat,
                format: OutputFormat::List,
            }
        }
    }
}

impl Serialize for Results {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("valid", &self.valid)?;
        match self.format {
            OutputFormat::Flag => {}
            // The list root carries only the verdict and the flat list.
            OutputFormat::List => map.serialize_entry("details", &self.details)?,
            OutputFormat::Hierarchical => {
                map.serialize_entry(
                    "evaluationPath",
                    &JsonPointer::new(&self.evaluation_path).to_string(),
                )?;
                map.serialize_entry("schemaLocation", self.schema_location.as_str())?;
                map.serialize_entry(
                    "instanceLocation",
                    &JsonPointer::new(&self.instance_location).to_string(),
                )?;
                if !self.errors.is_empty() {
                    let errors: Map<String, Value> = self
                        .errors
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect();
                    map.serialize_entry("errors", &errors)?;
                }
                if !self.annotations.is_empty() {
                    map.serialize_entry("annotations", &self.annotations)?;
                }
                if !self.details.is_empty() {
                    map.serialize_entry("details", &self.details)?;
                }
            }
        }
        map.end()
    }
}
