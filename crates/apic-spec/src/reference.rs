//! # Component References
//!
//! A reference names a registered component by section and name. Two
//! spellings are accepted: the short `schemas/User` form used in endpoint
//! declarations, and the document form `#/components/schemas/User` that
//! appears inside `$ref` nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SpecError;

const DOCUMENT_PREFIX: &str = "#/components/";

/// The section of the components table a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Schemas,
    Responses,
    RequestBodies,
    Parameters,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Responses => "responses",
            Self::RequestBodies => "requestBodies",
            Self::Parameters => "parameters",
        }
    }

    /// Singular noun, for error messages.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Schemas => "schema",
            Self::Responses => "response",
            Self::RequestBodies => "request body",
            Self::Parameters => "parameter",
        }
    }
}

impl FromStr for ComponentKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schemas" => Ok(Self::Schemas),
            "responses" => Ok(Self::Responses),
            "requestBodies" => Ok(Self::RequestBodies),
            "parameters" => Ok(Self::Parameters),
            other => Err(SpecError::UnknownComponentKind(other.to_string())),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed reference to a named component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentKey {
    kind: ComponentKind,
    name: String,
}

impl ComponentKey {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn schema(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Schemas, name)
    }

    pub fn response(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Responses, name)
    }

    pub fn request_body(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::RequestBodies, name)
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Parameters, name)
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document form, `#/components/{kind}/{name}`.
    pub fn pointer(&self) -> String {
        format!("{DOCUMENT_PREFIX}{}/{}", self.kind, self.name)
    }

    /// A `{"$ref": ...}` node pointing at this component.
    pub fn ref_node(&self) -> Value {
        json!({ "$ref": self.pointer() })
    }

    /// Parse the target of a `$ref` node, if the node is exactly a reference.
    pub fn from_ref_node(node: &Value) -> Option<Result<Self, SpecError>> {
        node.get("$ref").and_then(Value::as_str).map(str::parse)
    }
}

impl FromStr for ComponentKey {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.strip_prefix(DOCUMENT_PREFIX).unwrap_or(s);
        let (kind, name) = short
            .split_once('/')
            .ok_or_else(|| SpecError::InvalidReference(s.to_string()))?;
        if name.is_empty() || name.contains('/') {
            return Err(SpecError::InvalidReference(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

impl TryFrom<String> for ComponentKey {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentKey> for String {
    fn from(key: ComponentKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
