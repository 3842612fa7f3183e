//! # Parameter Descriptors
//!
//! A [`Parameter`] describes one named input or output value: its kind,
//! its validation constraints, and (through [`Parameter::coerce`]) how a
//! loosely typed wire value is turned into that kind.
//!
//! ## Value semantics
//!
//! Parameters are immutable values. Every builder method consumes `self`
//! and returns the modified descriptor, so a parameter shared between two
//! endpoint declarations can only diverge by cloning. Once an endpoint is
//! registered its parameters are never mutated again, which is what makes
//! a built registry safe for unsynchronized concurrent reads.
//!
//! ## Kinds
//!
//! The six parameter kinds are a closed sum type ([`ParameterKind`]); the
//! kind-specific constraints live inside the variant they apply to, so a
//! `minLength` on an integer is unrepresentable. Builder methods for a
//! constraint that does not apply to the current kind are ignored with a
//! warning.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    /// All six type tags.
    pub fn all() -> &'static [ParameterType] {
        &[
            Self::String,
            Self::Integer,
            Self::Number,
            Self::Boolean,
            Self::Array,
            Self::Object,
        ]
    }

    /// The JSON Schema `type` keyword value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownType(s.to_string()))
    }
}

/// Constraints specific to string parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

/// Constraints shared by integer and number parameters.
///
/// `exclusive_minimum` / `exclusive_maximum` follow the OpenAPI 3.0
/// convention: booleans that modify `minimum` / `maximum`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_minimum: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_maximum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
}

/// Constraints specific to array parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayRules {
    /// Descriptor every element is coerced through and validated against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
}

/// Constraints specific to object parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectRules {
    /// Named properties, iterated in key order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Parameter>,
    /// `None` leaves `additionalProperties` undeclared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

/// The closed set of parameter kinds, each carrying its own constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    String(StringRules),
    Integer(NumericRules),
    Number(NumericRules),
    Boolean,
    Array(ArrayRules),
    Object(ObjectRules),
}

impl ParameterKind {
    /// The type tag for this kind.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::String(_) => ParameterType::String,
            Self::Integer(_) => ParameterType::Integer,
            Self::Number(_) => ParameterType::Number,
            Self::Boolean => ParameterType::Boolean,
            Self::Array(_) => ParameterType::Array,
            Self::Object(_) => ParameterType::Object,
        }
    }
}

/// A typed descriptor for one named input or output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub(crate) kind: ParameterKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) nullable: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) deprecated: bool,
    /// `Some(Value::Null)` is an explicit null default, distinct from `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_value"
    )]
    pub(crate) default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub(crate) enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_value"
    )]
    pub(crate) example: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) examples: Vec<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) read_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) write_only: bool,
}

/// Deserialize a present field as `Some`, even when its value is `null`.
fn explicit_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<ParameterKind> for Parameter {
    fn from(kind: ParameterKind) -> Self {
        Self {
            kind,
            required: false,
            nullable: false,
            deprecated: false,
            default: None,
            enum_values: None,
            title: None,
            description: None,
            example: None,
            examples: Vec::new(),
            read_only: false,
            write_only: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

impl Parameter {
    /// Empty descriptor of the given type.
    pub fn of_type(parameter_type: ParameterType) -> Self {
        let kind = match parameter_type {
            ParameterType::String => ParameterKind::String(StringRules::default()),
            ParameterType::Integer => ParameterKind::Integer(NumericRules::default()),
            ParameterType::Number => ParameterKind::Number(NumericRules::default()),
            ParameterType::Boolean => ParameterKind::Boolean,
            ParameterType::Array => ParameterKind::Array(ArrayRules::default()),
            ParameterType::Object => ParameterKind::Object(ObjectRules::default()),
        };
        Self::from(kind)
    }

    pub fn string() -> Self {
        Self::of_type(ParameterType::String)
    }

    pub fn integer() -> Self {
        Self::of_type(ParameterType::Integer)
    }

    pub fn number() -> Self {
        Self::of_type(ParameterType::Number)
    }

    pub fn boolean() -> Self {
        Self::of_type(ParameterType::Boolean)
    }

    pub fn array() -> Self {
        Self::of_type(ParameterType::Array)
    }

    /// Array whose elements are described by `items`.
    pub fn array_of(items: Parameter) -> Self {
        Self::array().items(items)
    }

    pub fn object() -> Self {
        Self::of_type(ParameterType::Object)
    }

    /// Object with the given named properties.
    pub fn object_with<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Parameter)>,
        K: Into<String>,
    {
        properties
            .into_iter()
            .fold(Self::object(), |obj, (name, param)| obj.property(name, param))
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Parameter {
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.kind.parameter_type()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether `null` is an accepted value.
    ///
    /// True when declared nullable, and implied by an explicit `null` default.
    pub fn is_nullable(&self) -> bool {
        self.nullable || matches!(self.default, Some(Value::Null))
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// The declared default. `Some(&Value::Null)` is an explicit null default.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn enum_values(&self) -> Option<&[Value]> {
        self.enum_values.as_deref()
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn example_value(&self) -> Option<&Value> {
        self.example.as_ref()
    }

    pub fn example_values(&self) -> &[Value] {
        &self.examples
    }

    /// Element descriptor for arrays.
    pub fn item_parameter(&self) -> Option<&Parameter> {
        match &self.kind {
            ParameterKind::Array(rules) => rules.items.as_deref(),
            _ => None,
        }
    }

    /// Property descriptors for objects.
    pub fn properties(&self) -> Option<&BTreeMap<String, Parameter>> {
        match &self.kind {
            ParameterKind::Object(rules) => Some(&rules.properties),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl Parameter {
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Set the default. An explicit `null` default also marks the parameter nullable.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.nullable = true;
        }
        self.default = Some(value);
        self
    }

    /// Restrict the parameter to a fixed set of values.
    #[must_use]
    pub fn enumeration<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    #[must_use]
    pub fn examples<I, V>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Format hint. Applies to strings, integers and numbers.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        let format = format.into();
        match &mut self.kind {
            ParameterKind::String(rules) => rules.format = Some(format),
            ParameterKind::Integer(rules) | ParameterKind::Number(rules) => {
                rules.format = Some(format)
            }
            other => ignored("format", other),
        }
        self
    }

    #[must_use]
    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.with_string_rules("pattern", |r| r.pattern = Some(pattern))
    }

    #[must_use]
    pub fn min_length(self, min: u64) -> Self {
        self.with_string_rules("minLength", |r| r.min_length = Some(min))
    }

    #[must_use]
    pub fn max_length(self, max: u64) -> Self {
        self.with_string_rules("maxLength", |r| r.max_length = Some(max))
    }

    #[must_use]
    pub fn minimum(self, min: f64) -> Self {
        self.with_numeric_rules("minimum", |r| r.minimum = Some(min))
    }

    #[must_use]
    pub fn maximum(self, max: f64) -> Self {
        self.with_numeric_rules("maximum", |r| r.maximum = Some(max))
    }

    #[must_use]
    pub fn exclusive_minimum(self) -> Self {
        self.with_numeric_rules("exclusiveMinimum", |r| r.exclusive_minimum = true)
    }

    #[must_use]
    pub fn exclusive_maximum(self) -> Self {
        self.with_numeric_rules("exclusiveMaximum", |r| r.exclusive_maximum = true)
    }

    #[must_use]
    pub fn multiple_of(self, factor: f64) -> Self {
        self.with_numeric_rules("multipleOf", |r| r.multiple_of = Some(factor))
    }

    #[must_use]
    pub fn items(self, items: Parameter) -> Self {
        self.with_array_rules("items", |r| r.items = Some(Box::new(items)))
    }

    #[must_use]
    pub fn min_items(self, min: u64) -> Self {
        self.with_array_rules("minItems", |r| r.min_items = Some(min))
    }

    #[must_use]
    pub fn max_items(self, max: u64) -> Self {
        self.with_array_rules("maxItems", |r| r.max_items = Some(max))
    }

    #[must_use]
    pub fn unique_items(self) -> Self {
        self.with_array_rules("uniqueItems", |r| r.unique_items = true)
    }

    /// Add or replace a named property on an object parameter.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, param: Parameter) -> Self {
        match &mut self.kind {
            ParameterKind::Object(rules) => {
                rules.properties.insert(name.into(), param);
            }
            other => ignored("properties", other),
        }
        self
    }

    #[must_use]
    pub fn additional_properties(mut self, allowed: bool) -> Self {
        match &mut self.kind {
            ParameterKind::Object(rules) => rules.additional_properties = Some(allowed),
            other => ignored("additionalProperties", other),
        }
        self
    }

    fn with_string_rules(mut self, keyword: &str, f: impl FnOnce(&mut StringRules)) -> Self {
        match &mut self.kind {
            ParameterKind::String(rules) => f(rules),
            other => ignored(keyword, other),
        }
        self
    }

    fn with_numeric_rules(mut self, keyword: &str, f: impl FnOnce(&mut NumericRules)) -> Self {
        match &mut self.kind {
            ParameterKind::Integer(rules) | ParameterKind::Number(rules) => f(rules),
            other => ignored(keyword, other),
        }
        self
    }

    fn with_array_rules(mut self, keyword: &str, f: impl FnOnce(&mut ArrayRules)) -> Self {
        match &mut self.kind {
            ParameterKind::Array(rules) => f(rules),
            other => ignored(keyword, other),
        }
        self
    }
}

fn ignored(keyword: &str, kind: &ParameterKind) {
    tracing::warn!(
        keyword,
        parameter_type = %kind.parameter_type(),
        "constraint does not apply to this parameter type; ignored"
    );
}

// ---------------------------------------------------------------------------
// Schema rendering
// ---------------------------------------------------------------------------

impl Parameter {
    /// Render this parameter as an OpenAPI 3.0 schema object.
    ///
    /// Computed fields (`nullable`, `deprecated`, `default`, `description`)
    /// are included, so the same node serves documentation and, after
    /// normalization, validation. Object properties marked required are
    /// collected into the object's `required` list.
    pub fn schema(&self) -> Value {
        let mut node = Map::new();
        node.insert("type".into(), self.parameter_type().as_str().into());

        match &self.kind {
            ParameterKind::String(rules) => {
                insert_opt(&mut node, "format", rules.format.clone().map(Value::from));
                insert_opt(&mut node, "pattern", rules.pattern.clone().map(Value::from));
                insert_opt(&mut node, "minLength", rules.min_length.map(Value::from));
                insert_opt(&mut node, "maxLength", rules.max_length.map(Value::from));
            }
            ParameterKind::Integer(rules) | ParameterKind::Number(rules) => {
                insert_opt(&mut node, "format", rules.format.clone().map(Value::from));
                insert_opt(&mut node, "minimum", rules.minimum.map(number_value));
                insert_opt(&mut node, "maximum", rules.maximum.map(number_value));
                if rules.exclusive_minimum {
                    node.insert("exclusiveMinimum".into(), Value::Bool(true));
                }
                if rules.exclusive_maximum {
                    node.insert("exclusiveMaximum".into(), Value::Bool(true));
                }
                insert_opt(&mut node, "multipleOf", rules.multiple_of.map(number_value));
            }
            ParameterKind::Boolean => {}
            ParameterKind::Array(rules) => {
                if let Some(items) = &rules.items {
                    node.insert("items".into(), items.schema());
                }
                insert_opt(&mut node, "minItems", rules.min_items.map(Value::from));
                insert_opt(&mut node, "maxItems", rules.max_items.map(Value::from));
                if rules.unique_items {
                    node.insert("uniqueItems".into(), Value::Bool(true));
                }
            }
            ParameterKind::Object(rules) => {
                if !rules.properties.is_empty() {
                    let props: Map<String, Value> = rules
                        .properties
                        .iter()
                        .map(|(name, p)| (name.clone(), p.schema()))
                        .collect();
                    node.insert("properties".into(), Value::Object(props));
                }
                let required: Vec<Value> = rules
                    .properties
                    .iter()
                    .filter(|(_, p)| p.required)
                    .map(|(name, _)| Value::from(name.as_str()))
                    .collect();
                if !required.is_empty() {
                    node.insert("required".into(), Value::Array(required));
                }
                insert_opt(
                    &mut node,
                    "additionalProperties",
                    rules.additional_properties.map(Value::Bool),
                );
            }
        }

        if self.is_nullable() {
            node.insert("nullable".into(), Value::Bool(true));
        }
        if self.deprecated {
            node.insert("deprecated".into(), Value::Bool(true));
        }
        if self.read_only {
            node.insert("readOnly".into(), Value::Bool(true));
        }
        if self.write_only {
            node.insert("writeOnly".into(), Value::Bool(true));
        }
        insert_opt(&mut node, "title", self.title.clone().map(Value::from));
        insert_opt(&mut node, "description", self.description.clone().map(Value::from));
        if let Some(default) = &self.default {
            node.insert("default".into(), default.clone());
        }
        if let Some(values) = &self.enum_values {
            node.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(example) = &self.example {
            node.insert("example".into(), example.clone());
        }
        if !self.examples.is_empty() {
            node.insert("examples".into(), Value::Array(self.examples.clone()));
        }

        Value::Object(node)
    }
}

fn insert_opt(node: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        node.insert(key.to_string(), v);
    }
}

/// Render an `f64` bound, keeping integral values as JSON integers.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
