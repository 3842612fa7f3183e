//! # Response Declarations
//!
//! An endpoint declares, per status code, one or more response
//! descriptors. A descriptor is a plain description, a reference to a
//! named schema or response component, or an inline schema. Several
//! descriptors under one status combine into a single response whose
//! schema is a `oneOf` of the distinct individual schemas. The shapes are
//! alternatives: a payload matching any of them conforms, even when it
//! also matches another.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SpecError;
use crate::reference::{ComponentKey, ComponentKind};
use crate::components::Components;

/// One declared outcome for a status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseDescriptor {
    /// Description only, no body.
    Description { text: String },
    /// A named `schemas/` or `responses/` component.
    Reference {
        key: ComponentKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// An anonymous schema.
    Inline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        schema: Value,
    },
}

impl ResponseDescriptor {
    pub fn description(text: impl Into<String>) -> Self {
        Self::Description { text: text.into() }
    }

    pub fn reference(key: ComponentKey) -> Self {
        Self::Reference {
            key,
            description: None,
        }
    }

    pub fn schema(schema: Value) -> Self {
        Self::Inline {
            description: None,
            schema,
        }
    }

    /// Attach a description to a reference or inline descriptor.
    #[must_use]
    pub fn described(self, text: impl Into<String>) -> Self {
        match self {
            Self::Description { .. } => Self::Description { text: text.into() },
            Self::Reference { key, .. } => Self::Reference {
                key,
                description: Some(text.into()),
            },
            Self::Inline { schema, .. } => Self::Inline {
                description: Some(text.into()),
                schema,
            },
        }
    }

    /// The response component this descriptor stands for, if it is a bare
    /// `responses/` reference.
    pub(crate) fn response_component(&self) -> Option<&ComponentKey> {
        match self {
            Self::Reference { key, description: None } if key.kind() == ComponentKind::Responses => {
                Some(key)
            }
            _ => None,
        }
    }

    /// Description text and schema contributed by this descriptor.
    fn contribution(
        &self,
        components: &Components,
    ) -> Result<(Option<String>, Option<Value>), SpecError> {
        match self {
            Self::Description { text } => {
                if text.trim().is_empty() {
                    return Err(SpecError::InvalidDescription {
                        context: "response".into(),
                        reason: "description text is empty".into(),
                    });
                }
                Ok((Some(text.clone()), None))
            }
            Self::Reference { key, description } => match key.kind() {
                ComponentKind::Schemas => {
                    components.schema(key)?;
                    Ok((description.clone(), Some(key.ref_node())))
                }
                ComponentKind::Responses => {
                    let component = components.response(key)?;
                    let text = description.clone().or_else(|| Some(component.description.clone()));
                    Ok((text, component.schema.clone()))
                }
                other => Err(SpecError::WrongComponentKind {
                    key: key.to_string(),
                    expected: "schema or response",
                    found: other.noun(),
                }),
            },
            Self::Inline { description, schema } => Ok((description.clone(), Some(schema.clone()))),
        }
    }
}

/// A named, reusable response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseComponent {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ResponseComponent {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Render as an OpenAPI response object.
    pub fn document(&self) -> Value {
        render_response(&self.description, self.schema.as_ref())
    }
}

/// The combined response for one status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    /// Distinct descriptions joined with `", "`, in declaration order.
    pub description: String,
    /// `None` when no descriptor carries a body schema.
    pub schema: Option<Value>,
    /// The distinct schemas combined into `schema`, in declaration order.
    /// A payload conforms when it matches any one of them.
    pub alternatives: Vec<Value>,
}

impl ResolvedResponse {
    pub fn document(&self) -> Value {
        render_response(&self.description, self.schema.as_ref())
    }
}

/// Combine the descriptors declared under one status.
///
/// `fallback` supplies the description when no descriptor has one.
pub(crate) fn combine(
    descriptors: &[ResponseDescriptor],
    components: &Components,
    fallback: impl FnOnce() -> String,
) -> Result<ResolvedResponse, SpecError> {
    let mut descriptions: Vec<String> = Vec::new();
    let mut schemas: Vec<Value> = Vec::new();

    for descriptor in descriptors {
        let (text, schema) = descriptor.contribution(components)?;
        if let Some(text) = text {
            if !descriptions.contains(&text) {
                descriptions.push(text);
            }
        }
        if let Some(schema) = schema {
            if !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }
    }

    let description = if descriptions.is_empty() {
        fallback()
    } else {
        descriptions.join(", ")
    };
    let schema = match schemas.as_slice() {
        [] => None,
        [only] => Some(only.clone()),
        _ => Some(json!({ "oneOf": schemas })),
    };
    Ok(ResolvedResponse {
        description,
        schema,
        alternatives: schemas,
    })
}

fn render_response(description: &str, schema: Option<&Value>) -> Value {
    let mut response = json!({ "description": description });
    if let Some(schema) = schema {
        response["content"] = json!({ "application/json": { "schema": schema } });
    }
    response
}
