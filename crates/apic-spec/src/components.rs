//! # Named Components
//!
//! The shared table of schemas, responses, request bodies and parameters
//! that endpoint declarations reference by name, together with the
//! resolution logic that turns a schema containing `$ref` nodes into a
//! self-contained one.
//!
//! ## Resolution
//!
//! - [`Components::follow`] chases a top-level `$ref` chain.
//! - [`Components::inline`] replaces every `$ref` node with its target.
//! - [`Components::flatten`] inlines, then merges every `allOf`.
//! - [`Components::narrow`] additionally selects the branch of every
//!   discriminated union using the payload being validated.
//!
//! Self-referential schemas cannot be inlined and are reported as
//! [`SpecError::CircularReference`].

use std::collections::BTreeMap;

use apic_core::{Parameter, ParameterLocation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SpecError;
use crate::merge::merge_all_of;
use crate::reference::{ComponentKey, ComponentKind};
use crate::request_body::RequestBody;
use crate::response::ResponseComponent;

/// A parameter shared between endpoints, with its wire name and location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub parameter: Parameter,
}

impl SharedParameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, parameter: Parameter) -> Self {
        Self {
            name: name.into(),
            location,
            parameter,
        }
    }
}

/// A resolved component, typed by the section it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component<'a> {
    Schema(&'a Value),
    Response(&'a ResponseComponent),
    RequestBody(&'a RequestBody),
    Parameter(&'a SharedParameter),
}

impl Component<'_> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Schema(_) => ComponentKind::Schemas,
            Self::Response(_) => ComponentKind::Responses,
            Self::RequestBody(_) => ComponentKind::RequestBodies,
            Self::Parameter(_) => ComponentKind::Parameters,
        }
    }
}

/// The components table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) schemas: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) responses: BTreeMap<String, ResponseComponent>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) request_bodies: BTreeMap<String, RequestBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) parameters: BTreeMap<String, SharedParameter>,
}

impl Components {
    pub fn insert_schema(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn insert_response(&mut self, name: impl Into<String>, response: ResponseComponent) {
        self.responses.insert(name.into(), response);
    }

    pub fn insert_request_body(&mut self, name: impl Into<String>, body: RequestBody) {
        self.request_bodies.insert(name.into(), body);
    }

    pub fn insert_parameter(&mut self, name: impl Into<String>, parameter: SharedParameter) {
        self.parameters.insert(name.into(), parameter);
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.responses.is_empty()
            && self.request_bodies.is_empty()
            && self.parameters.is_empty()
    }

    /// Look up a component by key.
    ///
    /// # Errors
    ///
    /// [`SpecError::ReferenceNotFound`] when nothing is registered under
    /// the key.
    pub fn resolve(&self, key: &ComponentKey) -> Result<Component<'_>, SpecError> {
        let name = key.name();
        let found = match key.kind() {
            ComponentKind::Schemas => self.schemas.get(name).map(Component::Schema),
            ComponentKind::Responses => self.responses.get(name).map(Component::Response),
            ComponentKind::RequestBodies => self.request_bodies.get(name).map(Component::RequestBody),
            ComponentKind::Parameters => self.parameters.get(name).map(Component::Parameter),
        };
        found.ok_or_else(|| {
            tracing::debug!(%key, "component reference not found");
            SpecError::ReferenceNotFound {
                key: key.to_string(),
            }
        })
    }

    pub fn schema(&self, key: &ComponentKey) -> Result<&Value, SpecError> {
        match self.resolve(key)? {
            Component::Schema(schema) => Ok(schema),
            other => Err(wrong_kind(key, ComponentKind::Schemas, other.kind())),
        }
    }

    pub fn response(&self, key: &ComponentKey) -> Result<&ResponseComponent, SpecError> {
        match self.resolve(key)? {
            Component::Response(response) => Ok(response),
            other => Err(wrong_kind(key, ComponentKind::Responses, other.kind())),
        }
    }

    pub fn request_body(&self, key: &ComponentKey) -> Result<&RequestBody, SpecError> {
        match self.resolve(key)? {
            Component::RequestBody(body) => Ok(body),
            other => Err(wrong_kind(key, ComponentKind::RequestBodies, other.kind())),
        }
    }

    pub fn parameter(&self, key: &ComponentKey) -> Result<&SharedParameter, SpecError> {
        match self.resolve(key)? {
            Component::Parameter(parameter) => Ok(parameter),
            other => Err(wrong_kind(key, ComponentKind::Parameters, other.kind())),
        }
    }

    /// Chase a top-level `$ref` chain to the first non-reference schema.
    pub fn follow(&self, schema: &Value) -> Result<Value, SpecError> {
        let mut current = schema.clone();
        let mut seen: Vec<ComponentKey> = Vec::new();
        while let Some(parsed) = ComponentKey::from_ref_node(&current) {
            let key = parsed?;
            if seen.contains(&key) {
                return Err(SpecError::CircularReference {
                    key: key.to_string(),
                });
            }
            current = self.ref_target(&key)?.clone();
            seen.push(key);
        }
        Ok(current)
    }

    /// Replace every `$ref` node in `schema` with its target.
    pub fn inline(&self, schema: &Value) -> Result<Value, SpecError> {
        self.inline_node(schema, &mut Vec::new())
    }

    /// Inline references, then merge every `allOf` composition.
    pub fn flatten(&self, schema: &Value) -> Result<Value, SpecError> {
        Ok(merge_all_of(&self.inline(schema)?))
    }

    /// Resolve `schema` into a self-contained schema for `payload`.
    ///
    /// Every discriminated union, at the top level or nested, is narrowed
    /// to the branch the payload selects. See [`Components::narrow`].
    ///
    /// # Errors
    ///
    /// [`SpecError::DiscriminatorMismatch`] for the first union the
    /// payload selects no branch of, and any reference resolution error.
    pub fn resolve_for_payload(&self, schema: &Value, payload: &Value) -> Result<Value, SpecError> {
        let narrowed = self.narrow(schema, payload)?;
        match narrowed.misses.into_iter().next() {
            Some(miss) => Err(miss.into()),
            None => Ok(narrowed.schema),
        }
    }

    fn ref_target(&self, key: &ComponentKey) -> Result<&Value, SpecError> {
        self.schema(key)
    }

    fn inline_node(&self, node: &Value, stack: &mut Vec<ComponentKey>) -> Result<Value, SpecError> {
        match node {
            Value::Object(map) => {
                if let Some(parsed) = ComponentKey::from_ref_node(node) {
                    let key = parsed?;
                    if stack.contains(&key) {
                        return Err(SpecError::CircularReference {
                            key: key.to_string(),
                        });
                    }
                    let target = self.ref_target(&key)?;
                    stack.push(key);
                    let expanded = self.inline_node(target, stack);
                    stack.pop();
                    return expanded;
                }
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.inline_node(v, stack)?)))
                    .collect::<Result<Map<String, Value>, SpecError>>()
                    .map(Value::Object)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.inline_node(item, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// Every `$ref` target mentioned anywhere inside the registered
    /// components, paired with where it was found.
    pub(crate) fn mentioned_references(&self) -> Vec<(String, Value)> {
        let mut found = Vec::new();
        for (name, schema) in &self.schemas {
            collect_refs(schema, &format!("schemas/{name}"), &mut found);
        }
        for (name, response) in &self.responses {
            if let Some(schema) = &response.schema {
                collect_refs(schema, &format!("responses/{name}"), &mut found);
            }
        }
        found
    }
}

fn wrong_kind(key: &ComponentKey, expected: ComponentKind, found: ComponentKind) -> SpecError {
    SpecError::WrongComponentKind {
        key: key.to_string(),
        expected: expected.noun(),
        found: found.noun(),
    }
}

/// Collect every `$ref` string in `node`, tagged with `origin`.
pub(crate) fn collect_refs(node: &Value, origin: &str, found: &mut Vec<(String, Value)>) {
    match node {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref") {
                found.push((origin.to_string(), target.clone()));
            }
            for value in map.values() {
                collect_refs(value, origin, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, origin, found);
            }
        }
        _ => {}
    }
}
