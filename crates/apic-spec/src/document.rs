//! # Aggregate Document
//!
//! Renders the registry as one OpenAPI 3.0 document. Every object in the
//! output is a `serde_json::Map`, which keeps keys sorted, so generating
//! the document twice from equal registries yields byte-identical JSON.

use std::collections::BTreeSet;

use apic_core::ParameterLocation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::components::Components;
use crate::endpoint::{object_schema, EndpointSpecification};
use crate::error::SpecError;
use crate::registry::SpecificationRegistry;
use crate::request_body::{PostBody, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};

pub const OPENAPI_VERSION: &str = "3.0.3";

/// Top-level metadata for the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the security scheme scoped endpoints require.
    #[serde(default = "default_security_scheme")]
    pub security_scheme: String,
    /// Token endpoint advertised by the security scheme.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_security_scheme() -> String {
    "oauth2".to_string()
}

fn default_token_url() -> String {
    "/oauth/token".to_string()
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            security_scheme: default_security_scheme(),
            token_url: default_token_url(),
        }
    }
}

impl DocumentInfo {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

impl SpecificationRegistry {
    /// Assemble the aggregate document.
    ///
    /// With a scope filter, only endpoints declaring at least one of the
    /// given scopes are included. Components are always included whole.
    ///
    /// # Errors
    ///
    /// Any reference or description error hit while rendering responses.
    pub fn to_document(&self, scope_filter: Option<&[String]>) -> Result<Value, SpecError> {
        let components = self.components();
        let mut paths = Map::new();
        let mut scopes_seen = BTreeSet::new();

        for spec in self.endpoints() {
            if let Some(filter) = scope_filter {
                if !spec.has_any_of_these_scopes(filter) {
                    continue;
                }
            }
            let operation = render_operation(spec, components, &self.info().security_scheme)?;
            scopes_seen.extend(spec.declared_scopes().iter().cloned());
            let item = paths
                .entry(spec.path().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            item[spec.method().as_str()] = operation;
        }

        let mut info = json!({ "title": self.info().title, "version": self.info().version });
        if let Some(description) = &self.info().description {
            info["description"] = json!(description);
        }

        let mut rendered_components = render_components(components);
        if !scopes_seen.is_empty() {
            let scopes: Map<String, Value> = scopes_seen
                .into_iter()
                .map(|scope| (scope, Value::String(String::new())))
                .collect();
            rendered_components["securitySchemes"] = json!({
                self.info().security_scheme.as_str(): {
                    "type": "oauth2",
                    "flows": {
                        "clientCredentials": {
                            "tokenUrl": self.info().token_url,
                            "scopes": scopes,
                        }
                    }
                }
            });
        }

        tracing::debug!(paths = paths.len(), "rendered aggregate document");
        Ok(json!({
            "openapi": OPENAPI_VERSION,
            "info": info,
            "paths": paths,
            "components": rendered_components,
        }))
    }
}

fn render_operation(
    spec: &EndpointSpecification,
    components: &Components,
    security_scheme: &str,
) -> Result<Value, SpecError> {
    let mut op = Map::new();
    op.insert("operationId".into(), json!(spec.effective_operation_id()));
    if let Some(summary) = spec.summary_text() {
        op.insert("summary".into(), json!(summary));
    }
    if let Some(description) = spec.description_text() {
        op.insert("description".into(), json!(description));
    }
    if !spec.tags().is_empty() {
        op.insert("tags".into(), json!(spec.tags()));
    }
    if spec.is_deprecated() {
        op.insert("deprecated".into(), json!(true));
    }

    let mut parameters = Vec::new();
    for location in [ParameterLocation::Path, ParameterLocation::Query, ParameterLocation::Header] {
        if let Some(declared) = spec.declared_params(location) {
            for (name, param) in declared {
                let mut node = json!({
                    "name": name,
                    "in": location.as_str(),
                    "required": location == ParameterLocation::Path || param.is_required(),
                    "schema": param.schema(),
                });
                if let Some(description) = param.description_text() {
                    node["description"] = json!(description);
                }
                if param.is_deprecated() {
                    node["deprecated"] = json!(true);
                }
                parameters.push(node);
            }
        }
    }
    for key in spec.shared_params() {
        let shared = components.parameter(key)?;
        let shadowed = spec
            .declared_params(shared.location)
            .is_some_and(|declared| declared.contains_key(&shared.name));
        if !shadowed {
            parameters.push(key.ref_node());
        }
    }
    if !parameters.is_empty() {
        op.insert("parameters".into(), Value::Array(parameters));
    }

    match spec.post_body() {
        Some(PostBody::Params(params)) => {
            let schema = object_schema(params);
            op.insert(
                "requestBody".into(),
                json!({
                    "required": params.values().any(|p| p.is_required()),
                    "content": {
                        JSON_CONTENT_TYPE: { "schema": schema },
                        FORM_CONTENT_TYPE: { "schema": schema },
                    }
                }),
            );
        }
        Some(PostBody::Request(body)) => {
            op.insert("requestBody".into(), body.document());
        }
        None => {}
    }

    let mut responses = Map::new();
    for status in spec.statuses() {
        responses.insert(status.to_string(), render_response(spec, Some(status), components)?);
    }
    if spec.has_default_response() {
        responses.insert("default".into(), render_response(spec, None, components)?);
    }
    op.insert("responses".into(), Value::Object(responses));

    if spec.is_public() {
        op.insert("security".into(), json!([]));
    } else if !spec.declared_scopes().is_empty() {
        op.insert("security".into(), json!([{ security_scheme: spec.declared_scopes() }]));
    }

    Ok(Value::Object(op))
}

fn render_response(
    spec: &EndpointSpecification,
    status: Option<u16>,
    components: &Components,
) -> Result<Value, SpecError> {
    let descriptors = spec.descriptors(status);
    // A lone bare response reference is emitted as a `$ref`.
    if let [single] = descriptors {
        if let Some(key) = single.response_component() {
            components.response(key)?;
            return Ok(key.ref_node());
        }
    }
    let resolved = match status {
        Some(code) => spec.get_response(code, components)?,
        None => crate::response::combine(descriptors, components, || "Default response".to_string())?,
    };
    Ok(resolved.document())
}

fn render_components(components: &Components) -> Value {
    let mut out = Map::new();
    if !components.schemas.is_empty() {
        out.insert("schemas".into(), json!(components.schemas));
    }
    if !components.responses.is_empty() {
        let rendered: Map<String, Value> = components
            .responses
            .iter()
            .map(|(name, response)| (name.clone(), response.document()))
            .collect();
        out.insert("responses".into(), Value::Object(rendered));
    }
    if !components.request_bodies.is_empty() {
        let rendered: Map<String, Value> = components
            .request_bodies
            .iter()
            .map(|(name, body)| (name.clone(), body.document()))
            .collect();
        out.insert("requestBodies".into(), Value::Object(rendered));
    }
    if !components.parameters.is_empty() {
        let rendered: Map<String, Value> = components
            .parameters
            .iter()
            .map(|(name, shared)| {
                let node = json!({
                    "name": shared.name,
                    "in": shared.location.as_str(),
                    "required": shared.location == ParameterLocation::Path
                        || shared.parameter.is_required(),
                    "schema": shared.parameter.schema(),
                });
                (name.clone(), node)
            })
            .collect();
        out.insert("parameters".into(), Value::Object(rendered));
    }
    Value::Object(out)
}
