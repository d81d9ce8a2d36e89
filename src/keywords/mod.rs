//! The keyword system.
//!
//! Every clause of a schema object is one [`Keyword`]: a tagged union
//! over the known keywords of drafts 6 through next, plus an
//! `Unrecognized` variant that carries raw JSON for anything the factory
//! table does not know. Unrecognized keywords are preserved for
//! round-tripping and reference targets but assert nothing.
//!
//! A keyword exposes:
//!
//! - its canonical JSON name and the drafts it is defined in,
//! - a priority ordering compilation and evaluation after the sibling
//!   keywords it reads annotations from,
//! - sub-schema traversal through [`subschemas`](enum.Keyword.html#method.subschemas)
//!   and [`find_subschema`](enum.Keyword.html#method.find_subschema),
//! - compilation into a [`KeywordConstraint`](../compile/struct.KeywordConstraint.html).

pub(crate) mod array;
pub(crate) mod core;
pub(crate) mod logic;
pub(crate) mod object;
pub(crate) mod scalar;

use crate::compile::{Context, KeywordConstraint, SchemaConstraint};
use crate::draft::DraftSet;
use crate::errors::JsvError;
use crate::schema::{self, SchemaRef};
use failure::Error;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::Arc;

lazy_static! {
    static ref ANCHOR_NAME: Regex =
        Regex::new("^[A-Za-z_][A-Za-z0-9._-]*$").expect("anchor name pattern compiles");
}

/// Whether `name` satisfies the anchor-name pattern shared by
/// `$anchor`, `$dynamicAnchor`, and fragment-only identifiers.
pub(crate) fn is_anchor_name(name: &str) -> bool {
    ANCHOR_NAME.is_match(name)
}

/// A `patternProperties` entry: the pattern source is kept for
/// serialization, the compiled form for matching.
#[derive(Debug)]
pub(crate) struct PatternSchema {
    pub source: String,
    pub regex: Regex,
    pub schema: SchemaRef,
}

/// The two shapes `items` takes: a single schema for every element, or
/// the positional form that drafts through 2019-09 allowed before
/// `prefixItems` replaced it.
#[derive(Debug)]
pub(crate) enum ItemsForm {
    Single(SchemaRef),
    Positional(Vec<SchemaRef>),
}

/// A drafts-6/7 `dependencies` entry.
#[derive(Debug)]
pub(crate) enum Dependency {
    Schema(SchemaRef),
    Required(Vec<String>),
}

/// The primitive type names `type` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SimpleType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl SimpleType {
    pub fn as_str(self) -> &'static str {
        match self {
            SimpleType::Null => "null",
            SimpleType::Boolean => "boolean",
            SimpleType::Object => "object",
            SimpleType::Array => "array",
            SimpleType::Number => "number",
            SimpleType::String => "string",
            SimpleType::Integer => "integer",
        }
    }

    fn from_str(name: &str) -> Option<SimpleType> {
        match name {
            "null" => Some(SimpleType::Null),
            "boolean" => Some(SimpleType::Boolean),
            "object" => Some(SimpleType::Object),
            "array" => Some(SimpleType::Array),
            "number" => Some(SimpleType::Number),
            "string" => Some(SimpleType::String),
            "integer" => Some(SimpleType::Integer),
            _ => None,
        }
    }
}

/// A parsed `type` value. `singular` records whether the source was a
/// bare string, so serialization round-trips the original shape.
#[derive(Debug)]
pub(crate) struct TypeSet {
    pub types: Vec<SimpleType>,
    pub singular: bool,
}

/// One named clause of a schema object.
#[derive(Debug)]
pub(crate) enum Keyword {
    // Identity and reference keywords.
    Id(String),
    LegacyId(String),
    MetaSchema(String),
    Anchor(String),
    DynamicAnchor(String),
    RecursiveAnchor(bool),
    Ref(String),
    DynamicRef(String),
    RecursiveRef,
    Defs(Vec<(String, SchemaRef)>),
    Definitions(Vec<(String, SchemaRef)>),
    Comment(String),
    Vocabulary(Vec<(String, bool)>),

    // In-place applicators.
    AllOf(Vec<SchemaRef>),
    AnyOf(Vec<SchemaRef>),
    OneOf(Vec<SchemaRef>),
    Not(SchemaRef),
    If(SchemaRef),
    Then(SchemaRef),
    Else(SchemaRef),
    DependentSchemas(Vec<(String, SchemaRef)>),
    Dependencies(Vec<(String, Dependency)>),

    // Object keywords.
    Properties(Vec<(String, SchemaRef)>),
    PatternProperties(Vec<PatternSchema>),
    AdditionalProperties(SchemaRef),
    PropertyNames(SchemaRef),
    Required(Vec<String>),
    MinProperties(u64),
    MaxProperties(u64),
    DependentRequired(Vec<(String, Vec<String>)>),
    UnevaluatedProperties(SchemaRef),

    // Array keywords.
    PrefixItems(Vec<SchemaRef>),
    Items(ItemsForm),
    AdditionalItems(SchemaRef),
    Contains(SchemaRef),
    MinContains(u64),
    MaxContains(u64),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems(bool),
    UnevaluatedItems(SchemaRef),

    // Any-type assertions.
    Type(TypeSet),
    Enum(Vec<Value>),
    Const(Value),

    // String assertions.
    MinLength(u64),
    MaxLength(u64),
    Pattern { source: String, regex: Regex },

    // Numeric assertions.
    Minimum(Number),
    Maximum(Number),
    ExclusiveMinimum(Number),
    ExclusiveMaximum(Number),
    MultipleOf(Number),

    // Annotation-only keywords.
    Format(String),
    Title(String),
    Description(String),
    Default(Value),
    Examples(Vec<Value>),
    ReadOnly(bool),
    WriteOnly(bool),
    Deprecated(bool),

    Unrecognized {
        name: String,
        value: Value,
    },
}

impl Keyword {
    /// The canonical JSON name.
    pub fn name(&self) -> &str {
        match self {
            Keyword::Id(_) => "$id",
            Keyword::LegacyId(_) => "id",
            Keyword::MetaSchema(_) => "$schema",
            Keyword::Anchor(_) => "$anchor",
            Keyword::DynamicAnchor(_) => "$dynamicAnchor",
            Keyword::RecursiveAnchor(_) => "$recursiveAnchor",
            Keyword::Ref(_) => "$ref",
            Keyword::DynamicRef(_) => "$dynamicRef",
            Keyword::RecursiveRef => "$recursiveRef",
            Keyword::Defs(_) => "$defs",
            Keyword::Definitions(_) => "definitions",
            Keyword::Comment(_) => "$comment",
            Keyword::Vocabulary(_) => "$vocabulary",
            Keyword::AllOf(_) => "allOf",
            Keyword::AnyOf(_) => "anyOf",
            Keyword::OneOf(_) => "oneOf",
            Keyword::Not(_) => "not",
            Keyword::If(_) => "if",
            Keyword::Then(_) => "then",
            Keyword::Else(_) => "else",
            Keyword::DependentSchemas(_) => "dependentSchemas",
            Keyword::Dependencies(_) => "dependencies",
            Keyword::Properties(_) => "properties",
            Keyword::PatternProperties(_) => "patternProperties",
            Keyword::AdditionalProperties(_) => "additionalProperties",
            Keyword::PropertyNames(_) => "propertyNames",
            Keyword::Required(_) => "required",
            Keyword::MinProperties(_) => "minProperties",
            Keyword::MaxProperties(_) => "maxProperties",
            Keyword::DependentRequired(_) => "dependentRequired",
            Keyword::UnevaluatedProperties(_) => "unevaluatedProperties",
            Keyword::PrefixItems(_) => "prefixItems",
            Keyword::Items(_) => "items",
            Keyword::AdditionalItems(_) => "additionalItems",
            Keyword::Contains(_) => "contains",
            Keyword::MinContains(_) => "minContains",
            Keyword::MaxContains(_) => "maxContains",
            Keyword::MinItems(_) => "minItems",
            Keyword::MaxItems(_) => "maxItems",
            Keyword::UniqueItems(_) => "uniqueItems",
            Keyword::UnevaluatedItems(_) => "unevaluatedItems",
            Keyword::Type(_) => "type",
            Keyword::Enum(_) => "enum",
            Keyword::Const(_) => "const",
            Keyword::MinLength(_) => "minLength",
            Keyword::MaxLength(_) => "maxLength",
            Keyword::Pattern { .. } => "pattern",
            Keyword::Minimum(_) => "minimum",
            Keyword::Maximum(_) => "maximum",
            Keyword::ExclusiveMinimum(_) => "exclusiveMinimum",
            Keyword::ExclusiveMaximum(_) => "exclusiveMaximum",
            Keyword::MultipleOf(_) => "multipleOf",
            Keyword::Format(_) => "format",
            Keyword::Title(_) => "title",
            Keyword::Description(_) => "description",
            Keyword::Default(_) => "default",
            Keyword::Examples(_) => "examples",
            Keyword::ReadOnly(_) => "readOnly",
            Keyword::WriteOnly(_) => "writeOnly",
            Keyword::Deprecated(_) => "deprecated",
            Keyword::Unrecognized { name, .. } => name,
        }
    }

    /// Compilation and evaluation order. Lower runs first; ties keep the
    /// schema's insertion order. Non-zero priorities exist only for
    /// keywords that read sibling annotations.
    pub fn priority(&self) -> i32 {
        match self {
            Keyword::Then(_)
            | Keyword::Else(_)
            | Keyword::Items(_)
            | Keyword::MinContains(_)
            | Keyword::MaxContains(_) => 2,
            Keyword::AdditionalProperties(_) | Keyword::AdditionalItems(_) => 4,
            Keyword::UnevaluatedProperties(_) | Keyword::UnevaluatedItems(_) => 10,
            _ => 0,
        }
    }

    /// The drafts this keyword is defined in.
    pub fn supports(&self) -> DraftSet {
        match self {
            Keyword::LegacyId(_) => DraftSet::SIX,
            Keyword::Anchor(_) => DraftSet::MODERN,
            Keyword::DynamicAnchor(_) | Keyword::DynamicRef(_) => DraftSet::TWENTY_UP,
            Keyword::RecursiveAnchor(_) | Keyword::RecursiveRef => DraftSet::NINETEEN,
            Keyword::Defs(_) => DraftSet::MODERN,
            Keyword::Definitions(_) | Keyword::Dependencies(_) => DraftSet::LEGACY,
            Keyword::Comment(_) => DraftSet::SEVEN_UP,
            Keyword::Vocabulary(_) => DraftSet::MODERN,
            Keyword::If(_) | Keyword::Then(_) | Keyword::Else(_) => DraftSet::SEVEN_UP,
            Keyword::DependentSchemas(_) | Keyword::DependentRequired(_) => DraftSet::MODERN,
            Keyword::UnevaluatedProperties(_) | Keyword::UnevaluatedItems(_) => DraftSet::MODERN,
            Keyword::PrefixItems(_) => DraftSet::TWENTY_UP,
            Keyword::Items(ItemsForm::Positional(_)) | Keyword::AdditionalItems(_) => {
                DraftSet::THROUGH_NINETEEN
            }
            Keyword::MinContains(_) | Keyword::MaxContains(_) => DraftSet::MODERN,
            Keyword::ReadOnly(_) | Keyword::WriteOnly(_) => DraftSet::SEVEN_UP,
            Keyword::Deprecated(_) => DraftSet::MODERN,
            _ => DraftSet::ALL,
        }
    }

    /// Writes the keyword's value back to JSON.
    pub fn to_value(&self) -> Value {
        match self {
            Keyword::Id(v)
            | Keyword::LegacyId(v)
            | Keyword::MetaSchema(v)
            | Keyword::Anchor(v)
            | Keyword::DynamicAnchor(v)
            | Keyword::Ref(v)
            | Keyword::DynamicRef(v)
            | Keyword::Comment(v)
            | Keyword::Format(v)
            | Keyword::Title(v)
            | Keyword::Description(v) => Value::String(v.clone()),
            Keyword::RecursiveAnchor(b)
            | Keyword::UniqueItems(b)
            | Keyword::ReadOnly(b)
            | Keyword::WriteOnly(b)
            | Keyword::Deprecated(b) => Value::Bool(*b),
            Keyword::RecursiveRef => Value::String("#".to_owned()),
            Keyword::Defs(map)
            | Keyword::Definitions(map)
            | Keyword::DependentSchemas(map)
            | Keyword::Properties(map) => schema_map_value(map),
            Keyword::Vocabulary(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (uri, required) in entries {
                    map.insert(uri.clone(), Value::Bool(*required));
                }
                Value::Object(map)
            }
            Keyword::AllOf(subs)
            | Keyword::AnyOf(subs)
            | Keyword::OneOf(subs)
            | Keyword::PrefixItems(subs) => schema_seq_value(subs),
            Keyword::Not(sub)
            | Keyword::If(sub)
            | Keyword::Then(sub)
            | Keyword::Else(sub)
            | Keyword::AdditionalProperties(sub)
            | Keyword::PropertyNames(sub)
            | Keyword::UnevaluatedProperties(sub)
            | Keyword::AdditionalItems(sub)
            | Keyword::Contains(sub)
            | Keyword::UnevaluatedItems(sub) => schema::node_to_value(sub),
            Keyword::Dependencies(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (name, dep) in entries {
                    let value = match dep {
                        Dependency::Schema(sub) => schema::node_to_value(sub),
                        Dependency::Required(names) => {
                            Value::Array(names.iter().map(|n| Value::String(n.clone())).collect())
                        }
                    };
                    map.insert(name.clone(), value);
                }
                Value::Object(map)
            }
            Keyword::PatternProperties(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for entry in entries {
                    map.insert(entry.source.clone(), schema::node_to_value(&entry.schema));
                }
                Value::Object(map)
            }
            Keyword::Required(names) => {
                Value::Array(names.iter().map(|n| Value::String(n.clone())).collect())
            }
            Keyword::DependentRequired(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (name, required) in entries {
                    map.insert(
                        name.clone(),
                        Value::Array(required.iter().map(|n| Value::String(n.clone())).collect()),
                    );
                }
                Value::Object(map)
            }
            Keyword::Items(ItemsForm::Single(sub)) => schema::node_to_value(sub),
            Keyword::Items(ItemsForm::Positional(subs)) => schema_seq_value(subs),
            Keyword::MinProperties(n)
            | Keyword::MaxProperties(n)
            | Keyword::MinContains(n)
            | Keyword::MaxContains(n)
            | Keyword::MinItems(n)
            | Keyword::MaxItems(n)
            | Keyword::MinLength(n)
            | Keyword::MaxLength(n) => Value::Number(Number::from(*n)),
            Keyword::Type(set) => {
                if set.singular {
                    Value::String(set.types[0].as_str().to_owned())
                } else {
                    Value::Array(
                        set.types
                            .iter()
                            .map(|t| Value::String(t.as_str().to_owned()))
                            .collect(),
                    )
                }
            }
            Keyword::Enum(values) | Keyword::Examples(values) => Value::Array(values.clone()),
            Keyword::Const(value) | Keyword::Default(value) => value.clone(),
            Keyword::Pattern { source, .. } => Value::String(source.clone()),
            Keyword::Minimum(n)
            | Keyword::Maximum(n)
            | Keyword::ExclusiveMinimum(n)
            | Keyword::ExclusiveMaximum(n)
            | Keyword::MultipleOf(n) => Value::Number(n.clone()),
            Keyword::Unrecognized { value, .. } => value.clone(),
        }
    }

    /// The sub-schemas this keyword owns, each with the pointer tokens
    /// that address it beneath the keyword's own name.
    pub fn subschemas(&self) -> Vec<(Vec<String>, &SchemaRef)> {
        match self {
            Keyword::Not(sub)
            | Keyword::If(sub)
            | Keyword::Then(sub)
            | Keyword::Else(sub)
            | Keyword::AdditionalProperties(sub)
            | Keyword::PropertyNames(sub)
            | Keyword::UnevaluatedProperties(sub)
            | Keyword::AdditionalItems(sub)
            | Keyword::Contains(sub)
            | Keyword::UnevaluatedItems(sub)
            | Keyword::Items(ItemsForm::Single(sub)) => vec![(vec![], sub)],
            Keyword::AllOf(subs)
            | Keyword::AnyOf(subs)
            | Keyword::OneOf(subs)
            | Keyword::PrefixItems(subs)
            | Keyword::Items(ItemsForm::Positional(subs)) => subs
                .iter()
                .enumerate()
                .map(|(i, sub)| (vec![i.to_string()], sub))
                .collect(),
            Keyword::Defs(map)
            | Keyword::Definitions(map)
            | Keyword::DependentSchemas(map)
            | Keyword::Properties(map) => map
                .iter()
                .map(|(name, sub)| (vec![name.clone()], sub))
                .collect(),
            Keyword::PatternProperties(entries) => entries
                .iter()
                .map(|entry| (vec![entry.source.clone()], &entry.schema))
                .collect(),
            Keyword::Dependencies(entries) => entries
                .iter()
                .filter_map(|(name, dep)| match dep {
                    Dependency::Schema(sub) => Some((vec![name.clone()], sub)),
                    Dependency::Required(_) => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Locates a sub-schema addressed by the pointer tokens following
    /// this keyword's name, returning it with the number of extra
    /// segments consumed.
    pub fn find_subschema(&self, tail: &[String]) -> Option<(&SchemaRef, usize)> {
        match self {
            Keyword::Not(sub)
            | Keyword::If(sub)
            | Keyword::Then(sub)
            | Keyword::Else(sub)
            | Keyword::AdditionalProperties(sub)
            | Keyword::PropertyNames(sub)
            | Keyword::UnevaluatedProperties(sub)
            | Keyword::AdditionalItems(sub)
            | Keyword::Contains(sub)
            | Keyword::UnevaluatedItems(sub)
            | Keyword::Items(ItemsForm::Single(sub)) => Some((sub, 0)),
            Keyword::AllOf(subs)
            | Keyword::AnyOf(subs)
            | Keyword::OneOf(subs)
            | Keyword::PrefixItems(subs)
            | Keyword::Items(ItemsForm::Positional(subs)) => {
                let index: usize = tail.first()?.parse().ok()?;
                subs.get(index).map(|sub| (sub, 1))
            }
            Keyword::Defs(map)
            | Keyword::Definitions(map)
            | Keyword::DependentSchemas(map)
            | Keyword::Properties(map) => {
                let key = tail.first()?;
                map.iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, sub)| (sub, 1))
            }
            Keyword::PatternProperties(entries) => {
                let key = tail.first()?;
                entries
                    .iter()
                    .find(|entry| &entry.source == key)
                    .map(|entry| (&entry.schema, 1))
            }
            Keyword::Dependencies(entries) => {
                let key = tail.first()?;
                entries.iter().find_map(|(name, dep)| match dep {
                    Dependency::Schema(sub) if name == key => Some((sub, 1)),
                    _ => None,
                })
            }
            _ => None,
        }
    }

    /// Compiles this keyword against its schema constraint. Keywords
    /// that only carry identity or definitions produce no constraint.
    ///
    /// `compiled` holds the constraints of lower-priority siblings, so a
    /// keyword can notice at compile time that a sibling it depends on
    /// is absent and stay inert.
    pub fn get_constraint(
        &self,
        sc: &Arc<SchemaConstraint>,
        compiled: &[KeywordConstraint],
        ctx: &mut Context,
    ) -> Result<Option<KeywordConstraint>, Error> {
        let constraint = match self {
            Keyword::Id(_)
            | Keyword::LegacyId(_)
            | Keyword::MetaSchema(_)
            | Keyword::Anchor(_)
            | Keyword::DynamicAnchor(_)
            | Keyword::RecursiveAnchor(_)
            | Keyword::Defs(_)
            | Keyword::Definitions(_)
            | Keyword::Comment(_)
            | Keyword::Vocabulary(_) => None,

            Keyword::Ref(reference) => Some(core::ref_constraint(reference, sc)?),
            Keyword::DynamicRef(reference) => Some(core::dynamic_ref_constraint(reference, sc)?),
            Keyword::RecursiveRef => Some(core::recursive_ref_constraint(sc)),

            Keyword::AllOf(subs) => Some(logic::all_of_constraint(subs, sc, ctx)?),
            Keyword::AnyOf(subs) => Some(logic::any_of_constraint(subs, sc, ctx)?),
            Keyword::OneOf(subs) => Some(logic::one_of_constraint(subs, sc, ctx)?),
            Keyword::Not(sub) => Some(logic::not_constraint(sub, sc, ctx)?),
            Keyword::If(sub) => Some(logic::if_constraint(sub, sc, ctx)?),
            Keyword::Then(sub) => logic::then_else_constraint(sub, "then", true, sc, compiled, ctx)?,
            Keyword::Else(sub) => logic::then_else_constraint(sub, "else", false, sc, compiled, ctx)?,
            Keyword::DependentSchemas(map) => {
                Some(logic::dependent_schemas_constraint(map, sc, ctx)?)
            }
            Keyword::Dependencies(entries) => Some(logic::dependencies_constraint(entries, sc, ctx)?),

            Keyword::Properties(map) => Some(object::properties_constraint(map, sc, ctx)?),
            Keyword::PatternProperties(entries) => {
                Some(object::pattern_properties_constraint(entries, sc, ctx)?)
            }
            Keyword::AdditionalProperties(sub) => {
                Some(object::additional_properties_constraint(sub, sc, ctx)?)
            }
            Keyword::PropertyNames(sub) => Some(object::property_names_constraint(sub, sc, ctx)?),
            Keyword::Required(names) => Some(object::required_constraint(names)),
            Keyword::MinProperties(limit) => Some(object::min_properties_constraint(*limit)),
            Keyword::MaxProperties(limit) => Some(object::max_properties_constraint(*limit)),
            Keyword::DependentRequired(entries) => {
                Some(object::dependent_required_constraint(entries))
            }
            Keyword::UnevaluatedProperties(sub) => {
                Some(object::unevaluated_properties_constraint(sub, sc, ctx)?)
            }

            Keyword::PrefixItems(subs) => Some(array::prefix_items_constraint(subs, sc, ctx)?),
            Keyword::Items(form) => Some(array::items_constraint(form, sc, ctx)?),
            Keyword::AdditionalItems(sub) => {
                array::additional_items_constraint(sub, sc, compiled, ctx)?
            }
            Keyword::Contains(sub) => Some(array::contains_constraint(sub, sc, ctx)?),
            Keyword::MinContains(limit) => array::min_contains_constraint(*limit, compiled),
            Keyword::MaxContains(limit) => array::max_contains_constraint(*limit, compiled),
            Keyword::MinItems(limit) => Some(array::min_items_constraint(*limit)),
            Keyword::MaxItems(limit) => Some(array::max_items_constraint(*limit)),
            Keyword::UniqueItems(unique) => array::unique_items_constraint(*unique),
            Keyword::UnevaluatedItems(sub) => {
                Some(array::unevaluated_items_constraint(sub, sc, ctx)?)
            }

            Keyword::Type(set) => Some(scalar::type_constraint(set)),
            Keyword::Enum(values) => Some(scalar::enum_constraint(values)),
            Keyword::Const(value) => Some(scalar::const_constraint(value)),
            Keyword::MinLength(limit) => Some(scalar::min_length_constraint(*limit)),
            Keyword::MaxLength(limit) => Some(scalar::max_length_constraint(*limit)),
            Keyword::Pattern { source, regex } => {
                Some(scalar::pattern_constraint(source, regex.clone()))
            }
            Keyword::Minimum(limit) => Some(scalar::bound_constraint("minimum", limit, false, true)),
            Keyword::Maximum(limit) => Some(scalar::bound_constraint("maximum", limit, false, false)),
            Keyword::ExclusiveMinimum(limit) => {
                Some(scalar::bound_constraint("exclusiveMinimum", limit, true, true))
            }
            Keyword::ExclusiveMaximum(limit) => {
                Some(scalar::bound_constraint("exclusiveMaximum", limit, true, false))
            }
            Keyword::MultipleOf(divisor) => Some(scalar::multiple_of_constraint(divisor)),

            Keyword::Format(value) => Some(scalar::annotation_constraint("format", Value::String(value.clone()))),
            Keyword::Title(value) => Some(scalar::annotation_constraint("title", Value::String(value.clone()))),
            Keyword::Description(value) => {
                Some(scalar::annotation_constraint("description", Value::String(value.clone())))
            }
            Keyword::Default(value) => Some(scalar::annotation_constraint("default", value.clone())),
            Keyword::Examples(values) => {
                Some(scalar::annotation_constraint("examples", Value::Array(values.clone())))
            }
            Keyword::ReadOnly(value) => Some(scalar::annotation_constraint("readOnly", Value::Bool(*value))),
            Keyword::WriteOnly(value) => Some(scalar::annotation_constraint("writeOnly", Value::Bool(*value))),
            Keyword::Deprecated(value) => {
                Some(scalar::annotation_constraint("deprecated", Value::Bool(*value)))
            }

            Keyword::Unrecognized { name, value } => {
                if ctx.options.process_custom_keywords {
                    Some(core::unrecognized_constraint(name, value))
                } else {
                    None
                }
            }
        };
        Ok(constraint)
    }
}

/// The keyword factory table: turns one schema property into a typed
/// keyword. Unknown names become `Unrecognized`.
pub(crate) fn parse(name: &str, value: &Value) -> Result<Keyword, Error> {
    let keyword = match name {
        "$id" => Keyword::Id(expect_string(name, value)?),
        "id" => Keyword::LegacyId(expect_string(name, value)?),
        "$schema" => Keyword::MetaSchema(expect_string(name, value)?),
        "$anchor" => Keyword::Anchor(expect_anchor_name(name, value)?),
        "$dynamicAnchor" => Keyword::DynamicAnchor(expect_anchor_name(name, value)?),
        "$recursiveAnchor" => Keyword::RecursiveAnchor(expect_bool(name, value)?),
        "$ref" => Keyword::Ref(expect_string(name, value)?),
        "$dynamicRef" => Keyword::DynamicRef(expect_string(name, value)?),
        "$recursiveRef" => {
            let target = expect_string(name, value)?;
            if target != "#" {
                fail!(parse_error(name, "the only valid value is \"#\""));
            }
            Keyword::RecursiveRef
        }
        "$defs" => Keyword::Defs(expect_schema_map(name, value)?),
        "definitions" => Keyword::Definitions(expect_schema_map(name, value)?),
        "$comment" => Keyword::Comment(expect_string(name, value)?),
        "$vocabulary" => {
            let map = expect_object(name, value)?;
            let mut entries = Vec::with_capacity(map.len());
            for (uri, required) in map {
                entries.push((uri.clone(), expect_bool(name, required)?));
            }
            Keyword::Vocabulary(entries)
        }
        "allOf" => Keyword::AllOf(expect_schema_seq(name, value)?),
        "anyOf" => Keyword::AnyOf(expect_schema_seq(name, value)?),
        "oneOf" => Keyword::OneOf(expect_schema_seq(name, value)?),
        "not" => Keyword::Not(expect_schema(name, value)?),
        "if" => Keyword::If(expect_schema(name, value)?),
        "then" => Keyword::Then(expect_schema(name, value)?),
        "else" => Keyword::Else(expect_schema(name, value)?),
        "dependentSchemas" => Keyword::DependentSchemas(expect_schema_map(name, value)?),
        "dependencies" => {
            let map = expect_object(name, value)?;
            let mut entries = Vec::with_capacity(map.len());
            for (key, dep) in map {
                let dependency = match dep {
                    Value::Array(_) => Dependency::Required(expect_string_seq(name, dep)?),
                    other => Dependency::Schema(expect_schema(name, other)?),
                };
                entries.push((key.clone(), dependency));
            }
            Keyword::Dependencies(entries)
        }
        "properties" => Keyword::Properties(expect_schema_map(name, value)?),
        "patternProperties" => {
            let map = expect_object(name, value)?;
            let mut entries = Vec::with_capacity(map.len());
            for (source, sub) in map {
                let regex = Regex::new(source)
                    .map_err(|e| parse_error(name, &format!("invalid pattern {:?}: {}", source, e)))?;
                entries.push(PatternSchema {
                    source: source.clone(),
                    regex,
                    schema: expect_schema(name, sub)?,
                });
            }
            Keyword::PatternProperties(entries)
        }
        "additionalProperties" => Keyword::AdditionalProperties(expect_schema(name, value)?),
        "propertyNames" => Keyword::PropertyNames(expect_schema(name, value)?),
        "required" => Keyword::Required(expect_string_seq(name, value)?),
        "minProperties" => Keyword::MinProperties(expect_limit(name, value)?),
        "maxProperties" => Keyword::MaxProperties(expect_limit(name, value)?),
        "dependentRequired" => {
            let map = expect_object(name, value)?;
            let mut entries = Vec::with_capacity(map.len());
            for (key, required) in map {
                entries.push((key.clone(), expect_string_seq(name, required)?));
            }
            Keyword::DependentRequired(entries)
        }
        "unevaluatedProperties" => Keyword::UnevaluatedProperties(expect_schema(name, value)?),
        "prefixItems" => Keyword::PrefixItems(expect_schema_seq(name, value)?),
        "items" => match value {
            Value::Array(_) => Keyword::Items(ItemsForm::Positional(expect_schema_seq(name, value)?)),
            other => Keyword::Items(ItemsForm::Single(expect_schema(name, other)?)),
        },
        "additionalItems" => Keyword::AdditionalItems(expect_schema(name, value)?),
        "contains" => Keyword::Contains(expect_schema(name, value)?),
        "minContains" => Keyword::MinContains(expect_limit(name, value)?),
        "maxContains" => Keyword::MaxContains(expect_limit(name, value)?),
        "minItems" => Keyword::MinItems(expect_limit(name, value)?),
        "maxItems" => Keyword::MaxItems(expect_limit(name, value)?),
        "uniqueItems" => Keyword::UniqueItems(expect_bool(name, value)?),
        "unevaluatedItems" => Keyword::UnevaluatedItems(expect_schema(name, value)?),
        "type" => Keyword::Type(expect_type_set(name, value)?),
        "enum" => match value {
            Value::Array(values) => Keyword::Enum(values.clone()),
            _ => fail!(parse_error(name, "expected an array of values")),
        },
        "const" => Keyword::Const(value.clone()),
        "minLength" => Keyword::MinLength(expect_limit(name, value)?),
        "maxLength" => Keyword::MaxLength(expect_limit(name, value)?),
        "pattern" => {
            let source = expect_string(name, value)?;
            let regex = Regex::new(&source)
                .map_err(|e| parse_error(name, &format!("invalid pattern {:?}: {}", source, e)))?;
            Keyword::Pattern { source, regex }
        }
        "minimum" => Keyword::Minimum(expect_number(name, value)?),
        "maximum" => Keyword::Maximum(expect_number(name, value)?),
        "exclusiveMinimum" => Keyword::ExclusiveMinimum(expect_number(name, value)?),
        "exclusiveMaximum" => Keyword::ExclusiveMaximum(expect_number(name, value)?),
        "multipleOf" => {
            let divisor = expect_number(name, value)?;
            if divisor.as_f64().map(|n| n <= 0.0).unwrap_or(true) {
                fail!(parse_error(name, "the divisor must be greater than zero"));
            }
            Keyword::MultipleOf(divisor)
        }
        "format" => Keyword::Format(expect_string(name, value)?),
        "title" => Keyword::Title(expect_string(name, value)?),
        "description" => Keyword::Description(expect_string(name, value)?),
        "default" => Keyword::Default(value.clone()),
        "examples" => match value {
            Value::Array(values) => Keyword::Examples(values.clone()),
            _ => fail!(parse_error(name, "expected an array of values")),
        },
        "readOnly" => Keyword::ReadOnly(expect_bool(name, value)?),
        "writeOnly" => Keyword::WriteOnly(expect_bool(name, value)?),
        "deprecated" => Keyword::Deprecated(expect_bool(name, value)?),
        _ => Keyword::Unrecognized {
            name: name.to_owned(),
            value: value.clone(),
        },
    };
    Ok(keyword)
}

fn parse_error(location: &str, reason: &str) -> JsvError {
    JsvError::Parse {
        location: location.to_owned(),
        reason: reason.to_owned(),
    }
}

fn expect_string(name: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => fail!(parse_error(name, "expected a string")),
    }
}

fn expect_anchor_name(name: &str, value: &Value) -> Result<String, Error> {
    let anchor = expect_string(name, value)?;
    if !ANCHOR_NAME.is_match(&anchor) {
        fail!(parse_error(
            name,
            &format!("{:?} is not a valid anchor name", anchor)
        ));
    }
    Ok(anchor)
}

fn expect_bool(name: &str, value: &Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => fail!(parse_error(name, "expected a boolean")),
    }
}

/// A non-negative integer limit. Integer-valued floats such as `2.0` are
/// accepted, per the drafts.
fn expect_limit(name: &str, value: &Value) -> Result<u64, Error> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64() {
        if f >= 0.0 && f.fract() == 0.0 && f <= u64::max_value() as f64 {
            return Ok(f as u64);
        }
    }
    fail!(parse_error(name, "expected a non-negative integer"))
}

fn expect_number(name: &str, value: &Value) -> Result<Number, Error> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        _ => fail!(parse_error(name, "expected a number")),
    }
}

fn expect_object<'v>(
    name: &str,
    value: &'v Value,
) -> Result<&'v serde_json::Map<String, Value>, Error> {
    match value {
        Value::Object(map) => Ok(map),
        _ => fail!(parse_error(name, "expected an object")),
    }
}

fn expect_schema(name: &str, value: &Value) -> Result<SchemaRef, Error> {
    schema::parse_node(value).map_err(|e| {
        failure::Error::from(parse_error(name, &format!("invalid subschema: {}", e)))
    })
}

fn expect_schema_seq(name: &str, value: &Value) -> Result<Vec<SchemaRef>, Error> {
    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => fail!(parse_error(name, "expected a non-empty array of schemas")),
        _ => fail!(parse_error(name, "expected an array of schemas")),
    };
    items.iter().map(|item| expect_schema(name, item)).collect()
}

fn expect_schema_map(name: &str, value: &Value) -> Result<Vec<(String, SchemaRef)>, Error> {
    let map = expect_object(name, value)?;
    let mut entries = Vec::with_capacity(map.len());
    for (key, sub) in map {
        entries.push((key.clone(), expect_schema(name, sub)?));
    }
    Ok(entries)
}

fn expect_string_seq(name: &str, value: &Value) -> Result<Vec<String>, Error> {
    let items = match value {
        Value::Array(items) => items,
        _ => fail!(parse_error(name, "expected an array of strings")),
    };
    items.iter().map(|item| expect_string(name, item)).collect()
}

fn expect_type_set(name: &str, value: &Value) -> Result<TypeSet, Error> {
    let parse_one = |v: &Value| -> Result<SimpleType, Error> {
        let text = expect_string(name, v)?;
        SimpleType::from_str(&text)
            .ok_or_else(|| parse_error(name, &format!("{:?} is not a simple type", text)).into())
    };
    match value {
        Value::String(_) => Ok(TypeSet {
            types: vec![parse_one(value)?],
            singular: true,
        }),
        Value::Array(items) if !items.is_empty() => Ok(TypeSet {
            types: items.iter().map(parse_one).collect::<Result<_, _>>()?,
            singular: false,
        }),
        _ => fail!(parse_error(name, "expected a type name or an array of type names")),
    }
}

fn schema_map_value(map: &[(String, SchemaRef)]) -> Value {
    let mut out = serde_json::Map::with_capacity(map.len());
    for (key, sub) in map {
        out.insert(key.clone(), schema::node_to_value(sub));
    }
    Value::Object(out)
}

fn schema_seq_value(subs: &[SchemaRef]) -> Value {
    Value::Array(subs.iter().map(schema::node_to_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_names_are_preserved() {
        let kw = parse("x-vendor", &json!({"a": 1})).unwrap();
        assert_eq!(kw.name(), "x-vendor");
        assert_eq!(kw.to_value(), json!({"a": 1}));
    }

    #[test]
    fn null_values_fail_unless_the_keyword_accepts_null() {
        assert!(parse("minItems", &Value::Null).is_err());
        assert!(parse("$ref", &Value::Null).is_err());
        assert!(parse("properties", &Value::Null).is_err());

        assert_eq!(parse("const", &Value::Null).unwrap().to_value(), Value::Null);
        assert_eq!(parse("default", &Value::Null).unwrap().to_value(), Value::Null);
    }

    #[test]
    fn anchor_names_are_validated() {
        assert!(parse("$anchor", &json!("node")).is_ok());
        assert!(parse("$anchor", &json!("_x.y-z")).is_ok());
        assert!(parse("$anchor", &json!("9starts-with-digit")).is_err());
        assert!(parse("$anchor", &json!("has space")).is_err());
    }

    #[test]
    fn recursive_ref_only_accepts_the_root_fragment() {
        assert!(parse("$recursiveRef", &json!("#")).is_ok());
        assert!(parse("$recursiveRef", &json!("#/other")).is_err());
    }

    #[test]
    fn limits_accept_integer_valued_floats() {
        assert!(matches!(
            parse("minItems", &json!(2.0)).unwrap(),
            Keyword::MinItems(2)
        ));
        assert!(parse("minItems", &json!(2.5)).is_err());
        assert!(parse("minItems", &json!(-1)).is_err());
    }

    #[test]
    fn items_parses_both_forms() {
        assert!(matches!(
            parse("items", &json!({"type": "string"})).unwrap(),
            Keyword::Items(ItemsForm::Single(_))
        ));
        assert!(matches!(
            parse("items", &json!([{"type": "string"}])).unwrap(),
            Keyword::Items(ItemsForm::Positional(_))
        ));
    }
}
