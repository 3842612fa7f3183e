//! # Request Bodies
//!
//! A post body is declared either as a flat map of post parameters or as
//! a structured request body. Structured bodies point at a schema, inline
//! one, or name a discriminated union whose branch is chosen from the
//! payload itself.

use std::collections::BTreeMap;

use apic_core::Parameter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::components::Components;
use crate::error::SpecError;
use crate::reference::{ComponentKey, ComponentKind};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A `oneOf` over named schemas, selected by one property of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatedUnion {
    pub property_name: String,
    pub candidates: Vec<ComponentKey>,
    /// Explicit discriminator value → schema mapping. Values absent here
    /// fall back to matching the candidate's component name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping: BTreeMap<String, ComponentKey>,
}

impl DiscriminatedUnion {
    pub fn new<I>(property_name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = ComponentKey>,
    {
        Self {
            property_name: property_name.into(),
            candidates: candidates.into_iter().collect(),
            mapping: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn map(mut self, value: impl Into<String>, key: ComponentKey) -> Self {
        self.mapping.insert(value.into(), key);
        self
    }

    /// Pick the candidate schema named by the payload's discriminator value.
    ///
    /// # Errors
    ///
    /// [`SpecError::DiscriminatorMismatch`] when the property is missing,
    /// is not a scalar, or names no candidate.
    pub fn select(&self, payload: &Value) -> Result<&ComponentKey, SpecError> {
        let value = payload.get(&self.property_name).cloned().unwrap_or(Value::Null);
        let tag = match &value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        };
        let selected = tag.and_then(|tag| {
            self.mapping
                .get(&tag)
                .or_else(|| self.candidates.iter().find(|c| c.name() == tag))
        });
        selected.ok_or_else(|| {
            tracing::debug!(property = %self.property_name, %value, "discriminator matched no candidate");
            SpecError::DiscriminatorMismatch {
                property_name: self.property_name.clone(),
                value,
            }
        })
    }

    /// Recognise a `oneOf` + `discriminator` schema node.
    ///
    /// Returns `None` when the node is not a discriminated union over
    /// referenced schemas.
    pub fn from_schema(node: &Value) -> Option<Result<Self, SpecError>> {
        let discriminator = node.get("discriminator")?;
        let branches = node.get("oneOf")?.as_array()?;
        let property_name = discriminator.get("propertyName")?.as_str()?;

        let parse = || -> Result<Self, SpecError> {
            let candidates = branches
                .iter()
                .filter_map(ComponentKey::from_ref_node)
                .collect::<Result<Vec<_>, _>>()?;
            let mut union = Self::new(property_name, candidates);
            if let Some(mapping) = discriminator.get("mapping").and_then(Value::as_object) {
                for (value, target) in mapping {
                    let target = target
                        .as_str()
                        .ok_or_else(|| SpecError::InvalidReference(target.to_string()))?;
                    // A bare name is shorthand for a schema component.
                    let key = if target.contains('/') {
                        target.parse()?
                    } else {
                        ComponentKey::schema(target)
                    };
                    union = union.map(value.clone(), key);
                }
            }
            Ok(union)
        };
        Some(parse())
    }

    pub fn schema(&self) -> Value {
        let branches: Vec<Value> = self.candidates.iter().map(ComponentKey::ref_node).collect();
        let mut discriminator = json!({ "propertyName": self.property_name });
        if !self.mapping.is_empty() {
            let mapping: Map<String, Value> = self
                .mapping
                .iter()
                .map(|(value, key)| (value.clone(), Value::String(key.pointer())))
                .collect();
            discriminator["mapping"] = Value::Object(mapping);
        }
        json!({ "oneOf": branches, "discriminator": discriminator })
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = &ComponentKey> {
        self.candidates.iter().chain(self.mapping.values())
    }
}

/// What a structured request body carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySchema {
    /// A `schemas/` or `requestBodies/` component.
    Reference(ComponentKey),
    Inline(Value),
    Union(DiscriminatedUnion),
}

/// A structured request body declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub schema: BodySchema,
}

fn default_content_type() -> String {
    JSON_CONTENT_TYPE.to_string()
}

impl RequestBody {
    pub fn new(schema: BodySchema) -> Self {
        Self {
            description: None,
            required: true,
            content_type: default_content_type(),
            schema,
        }
    }

    pub fn reference(key: ComponentKey) -> Self {
        Self::new(BodySchema::Reference(key))
    }

    pub fn inline(schema: Value) -> Self {
        Self::new(BodySchema::Inline(schema))
    }

    pub fn union(union: DiscriminatedUnion) -> Self {
        Self::new(BodySchema::Union(union))
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// The body schema before any payload-driven selection.
    pub(crate) fn raw_schema(&self, components: &Components) -> Result<Value, SpecError> {
        match &self.schema {
            BodySchema::Reference(key) => match key.kind() {
                ComponentKind::Schemas => Ok(key.ref_node()),
                ComponentKind::RequestBodies => components.request_body(key)?.raw_schema(components),
                other => Err(SpecError::WrongComponentKind {
                    key: key.to_string(),
                    expected: "schema or request body",
                    found: other.noun(),
                }),
            },
            BodySchema::Inline(schema) => Ok(schema.clone()),
            BodySchema::Union(union) => Ok(union.schema()),
        }
    }

    /// Render as an OpenAPI request body object.
    pub fn document(&self) -> Value {
        let schema = match &self.schema {
            BodySchema::Reference(key) if key.kind() == ComponentKind::RequestBodies => {
                return key.ref_node();
            }
            BodySchema::Reference(key) => key.ref_node(),
            BodySchema::Inline(schema) => schema.clone(),
            BodySchema::Union(union) => union.schema(),
        };
        let mut content = Map::new();
        content.insert(self.content_type.clone(), json!({ "schema": schema }));
        let mut body = json!({ "required": self.required, "content": content });
        if let Some(description) = &self.description {
            body["description"] = Value::String(description.clone());
        }
        body
    }
}

/// An endpoint's post body declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostBody {
    Params(BTreeMap<String, Parameter>),
    Request(RequestBody),
}

/// The outcome of resolving an endpoint's post parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum PostParameters {
    Resolved(BTreeMap<String, Parameter>),
    /// A discriminated union body; parameters depend on the payload's
    /// value for `property_name`.
    AwaitingDiscriminator { property_name: String },
}
