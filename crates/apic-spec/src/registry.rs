//! # Specification Registry
//!
//! Owns every registered [`EndpointSpecification`] together with the
//! named components they reference. The registry is built once during
//! startup and then shared read-only (typically behind an `Arc`) by every
//! request; nothing on the request path mutates it.
//!
//! Endpoints are keyed by `(path, method)` in a `BTreeMap`, so iteration
//! is path-lexical: `/users/me` sorts before `/users/{id}` because `{`
//! sorts after every ASCII letter and digit.

use std::collections::BTreeMap;

use apic_core::{HttpMethod, ParameterLocation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::{collect_refs, Component, Components, SharedParameter};
use crate::document::DocumentInfo;
use crate::endpoint::EndpointSpecification;
use crate::error::SpecError;
use crate::reference::ComponentKey;
use crate::request_body::{BodySchema, PostBody, RequestBody};
use crate::response::ResponseComponent;

/// Registry key. Ordered by path first so that iteration follows path
/// order across methods.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    pub path: String,
    pub method: HttpMethod,
}

impl EndpointKey {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }

    fn of(spec: &EndpointSpecification) -> Self {
        Self::new(spec.method(), spec.path())
    }
}

/// A reference that failed to resolve, with where it was found.
#[derive(Debug)]
pub struct ReferenceProblem {
    pub location: String,
    pub error: SpecError,
}

/// All endpoint specifications and shared components for one API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecificationRegistry {
    #[serde(default)]
    info: DocumentInfo,
    #[serde(default, with = "endpoint_list")]
    endpoints: BTreeMap<EndpointKey, EndpointSpecification>,
    #[serde(default)]
    components: Components,
}

impl SpecificationRegistry {
    pub fn new(info: DocumentInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn set_info(&mut self, info: DocumentInfo) {
        self.info = info;
    }

    /// Register an endpoint. A later registration for the same method and
    /// path replaces the earlier one.
    pub fn register(&mut self, spec: EndpointSpecification) {
        let key = EndpointKey::of(&spec);
        tracing::debug!(method = %key.method, path = %key.path, "registering endpoint");
        if self.endpoints.insert(key.clone(), spec).is_some() {
            tracing::warn!(method = %key.method, path = %key.path, "endpoint re-registered, replacing earlier declaration");
        }
    }

    pub fn register_schema(&mut self, name: impl Into<String>, schema: Value) {
        self.components.insert_schema(name, schema);
    }

    pub fn register_response(&mut self, name: impl Into<String>, response: ResponseComponent) {
        self.components.insert_response(name, response);
    }

    pub fn register_request_body(&mut self, name: impl Into<String>, body: RequestBody) {
        self.components.insert_request_body(name, body);
    }

    pub fn register_parameter(&mut self, name: impl Into<String>, parameter: SharedParameter) {
        self.components.insert_parameter(name, parameter);
    }

    pub fn endpoint(&self, method: HttpMethod, path: &str) -> Option<&EndpointSpecification> {
        self.endpoints.get(&EndpointKey::new(method, path))
    }

    /// Endpoints in path-lexical order.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointSpecification> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Look up a component by its string key, `schemas/User` or
    /// `#/components/schemas/User`.
    ///
    /// # Errors
    ///
    /// [`SpecError::InvalidReference`] or [`SpecError::UnknownComponentKind`]
    /// for a malformed key, [`SpecError::ReferenceNotFound`] when nothing is
    /// registered under it.
    pub fn resolve_reference(&self, key: &str) -> Result<Component<'_>, SpecError> {
        let key: ComponentKey = key.parse()?;
        self.components.resolve(&key)
    }

    /// Walk every declaration and report each reference that does not
    /// resolve. Resolution is otherwise lazy, so this is how broken
    /// references are found before first use.
    pub fn check_references(&self) -> Vec<ReferenceProblem> {
        let mut problems = Vec::new();
        let components = &self.components;
        let mut report = |location: String, result: Result<(), SpecError>| {
            if let Err(error) = result {
                problems.push(ReferenceProblem { location, error });
            }
        };

        for spec in self.endpoints() {
            let at = format!("{} {}", spec.method(), spec.path());

            for key in spec.shared_params() {
                report(format!("{at} parameters"), components.parameter(key).map(drop));
            }
            for location in [ParameterLocation::Path, ParameterLocation::Query, ParameterLocation::Header] {
                report(format!("{at} {location} parameters"), spec.params(location, components).map(drop));
            }

            if let Some(PostBody::Request(body)) = spec.post_body() {
                report(format!("{at} request body"), check_body(body, components));
            }

            let statuses = spec.statuses().map(Some).chain(spec.has_default_response().then_some(None));
            for status in statuses {
                let label = status.map_or_else(|| "default".to_string(), |s| s.to_string());
                let result = crate::response::combine(spec.descriptors(status), components, String::new)
                    .and_then(|resolved| match resolved.schema {
                        Some(schema) => components.inline(&schema).map(drop),
                        None => Ok(()),
                    });
                report(format!("{at} response {label}"), result);
            }
        }

        for (origin, target) in components.mentioned_references() {
            let result = match target.as_str() {
                Some(target) => target
                    .parse::<ComponentKey>()
                    .and_then(|key| components.schema(&key).map(drop)),
                None => Err(SpecError::InvalidReference(target.to_string())),
            };
            report(format!("components {origin}"), result);
        }
        for (name, body) in &components.request_bodies {
            report(format!("components requestBodies/{name}"), check_body(body, components));
        }

        problems
    }
}

fn check_body(body: &RequestBody, components: &Components) -> Result<(), SpecError> {
    if let BodySchema::Union(union) = &body.schema {
        for key in union.references() {
            components.schema(key)?;
        }
        return Ok(());
    }
    let raw = body.raw_schema(components)?;
    let mut refs = Vec::new();
    collect_refs(&raw, "", &mut refs);
    for (_, target) in refs {
        let key: ComponentKey = target
            .as_str()
            .ok_or_else(|| SpecError::InvalidReference(target.to_string()))?
            .parse()?;
        components.schema(&key)?;
    }
    Ok(())
}

/// Serializes the endpoint map as a plain list; map keys are derived from
/// each specification on the way back in.
mod endpoint_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::EndpointKey;
    use crate::endpoint::EndpointSpecification;

    pub fn serialize<S>(
        endpoints: &BTreeMap<EndpointKey, EndpointSpecification>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(endpoints.values())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<EndpointKey, EndpointSpecification>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<EndpointSpecification>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|spec| (EndpointKey::of(&spec), spec))
            .collect())
    }
}
