//! # Declaration Files
//!
//! Loads endpoint declarations and shared components from YAML or JSON
//! files into a [`SpecificationRegistry`]. A declaration file looks like:
//!
//! ```yaml
//! info: { title: Users, version: 1.0.0 }
//! components:
//!   schemas:
//!     User: { type: object, properties: { id: { type: integer } } }
//!   responses:
//!     NotFound: { description: No such user }
//! endpoints:
//!   - method: get
//!     path: /users/{id}
//!     scopes: [users.read]
//!     parameters:
//!       path: { id: { type: integer } }
//!     responses:
//!       200: schemas/User
//!       404: [responses/NotFound, "Deleted"]
//! ```
//!
//! A response entry may be a description string, a component reference
//! string, an object with `description`/`ref`/`schema`, or a list of
//! those. Anything else is an invalid description.

use std::collections::BTreeMap;
use std::path::Path;

use apic_core::{HttpMethod, Parameter, ParameterLocation};
use serde_json::{Map, Value};

use crate::components::SharedParameter;
use crate::endpoint::EndpointSpecification;
use crate::error::SpecError;
use crate::reference::{ComponentKey, ComponentKind};
use crate::registry::SpecificationRegistry;
use crate::request_body::{BodySchema, DiscriminatedUnion, RequestBody};
use crate::response::{ResponseComponent, ResponseDescriptor};

impl SpecificationRegistry {
    /// Build a registry from declaration files, applied in order.
    pub fn from_declaration_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SpecError> {
        let mut registry = Self::default();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)?;
            let count = registry.apply_declarations(&path.display().to_string(), &text)?;
            tracing::info!(file = %path.display(), endpoints = count, "loaded declarations");
        }
        Ok(registry)
    }

    /// Apply one declaration document. Returns the number of endpoints it
    /// registered.
    pub fn apply_declarations(&mut self, source_name: &str, text: &str) -> Result<usize, SpecError> {
        let loader = Loader { source_name };
        let root = loader.parse(text)?;
        let root = loader.object(&root, "document root")?;

        if let Some(info) = root.get("info") {
            let info = loader.object(info, "info")?;
            let mut current = self.info().clone();
            if let Some(title) = info.get("title").and_then(Value::as_str) {
                current.title = title.to_string();
            }
            if let Some(version) = info.get("version") {
                current.version = scalar_text(version);
            }
            if let Some(description) = info.get("description").and_then(Value::as_str) {
                current.description = Some(description.to_string());
            }
            if let Some(scheme) = info.get("securityScheme").and_then(Value::as_str) {
                current.security_scheme = scheme.to_string();
            }
            if let Some(url) = info.get("tokenUrl").and_then(Value::as_str) {
                current.token_url = url.to_string();
            }
            self.set_info(current);
        }

        if let Some(components) = root.get("components") {
            loader.components(self, loader.object(components, "components")?)?;
        }

        let mut count = 0;
        if let Some(endpoints) = root.get("endpoints") {
            let endpoints = endpoints
                .as_array()
                .ok_or_else(|| loader.error("'endpoints' must be a list"))?;
            for node in endpoints {
                let spec = loader.endpoint(node)?;
                self.register(spec);
                count += 1;
            }
        }
        Ok(count)
    }
}

struct Loader<'a> {
    source_name: &'a str,
}

impl Loader<'_> {
    fn error(&self, reason: impl Into<String>) -> SpecError {
        SpecError::Declaration {
            source_name: self.source_name.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(&self, text: &str) -> Result<Value, SpecError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
        yaml_to_json(yaml).map_err(|reason| self.error(reason))
    }

    fn object<'v>(&self, node: &'v Value, what: &str) -> Result<&'v Map<String, Value>, SpecError> {
        node.as_object()
            .ok_or_else(|| self.error(format!("{what} must be a mapping")))
    }

    fn components(
        &self,
        registry: &mut SpecificationRegistry,
        components: &Map<String, Value>,
    ) -> Result<(), SpecError> {
        for (section, entries) in components {
            let kind: ComponentKind = section.parse()?;
            let entries = self.object(entries, &format!("components.{section}"))?;
            for (name, node) in entries {
                match kind {
                    ComponentKind::Schemas => registry.register_schema(name.clone(), node.clone()),
                    ComponentKind::Responses => {
                        let node = self.object(node, &format!("responses/{name}"))?;
                        let description = node
                            .get("description")
                            .and_then(Value::as_str)
                            .ok_or_else(|| SpecError::InvalidDescription {
                                context: format!("responses/{name}"),
                                reason: "a response component needs a description string".into(),
                            })?;
                        let mut response = ResponseComponent::new(description);
                        if let Some(schema) = node.get("schema") {
                            response = response.with_schema(schema.clone());
                        }
                        registry.register_response(name.clone(), response);
                    }
                    ComponentKind::RequestBodies => {
                        let body = self.request_body(node, &format!("requestBodies/{name}"))?;
                        registry.register_request_body(name.clone(), body);
                    }
                    ComponentKind::Parameters => {
                        let context = format!("parameters/{name}");
                        let node_map = self.object(node, &context)?;
                        let wire_name = node_map
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or(name.as_str());
                        let location = match node_map.get("in").and_then(Value::as_str) {
                            Some("path") => ParameterLocation::Path,
                            Some("query") | None => ParameterLocation::Query,
                            Some("header") => ParameterLocation::Header,
                            Some(other) => {
                                return Err(self.error(format!("{context}: unsupported location '{other}'")))
                            }
                        };
                        let schema = node_map.get("schema").unwrap_or(node);
                        let mut param = parameter(schema, &context)?;
                        if node_map.get("required") == Some(&Value::Bool(true)) {
                            param = param.required();
                        }
                        registry.register_parameter(
                            name.clone(),
                            SharedParameter::new(wire_name, location, param),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn endpoint(&self, node: &Value) -> Result<EndpointSpecification, SpecError> {
        let decl = self.object(node, "endpoint")?;
        let method_text = decl
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| self.error("endpoint is missing 'method'"))?;
        let method: HttpMethod = method_text
            .parse()
            .map_err(|err: apic_core::CoreError| self.error(err.to_string()))?;
        let path = decl
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| self.error("endpoint is missing 'path'"))?;
        let at = format!("{method} {path}");

        let mut spec = EndpointSpecification::new(method, path);
        if let Some(text) = decl.get("summary").and_then(Value::as_str) {
            spec = spec.summary(text);
        }
        if let Some(text) = decl.get("description").and_then(Value::as_str) {
            spec = spec.description(text);
        }
        if let Some(id) = decl.get("operationId").and_then(Value::as_str) {
            spec = spec.operation_id(id);
        }
        if let Some(tags) = decl.get("tags").and_then(Value::as_array) {
            for tag in tags.iter().filter_map(Value::as_str) {
                spec = spec.tag(tag);
            }
        }
        if decl.get("public") == Some(&Value::Bool(true)) {
            spec = spec.public();
        }
        if decl.get("deprecated") == Some(&Value::Bool(true)) {
            spec = spec.deprecated();
        }
        if let Some(scopes) = decl.get("scopes") {
            spec = spec.scopes(scope_list(scopes, &at)?);
        }

        if let Some(parameters) = decl.get("parameters") {
            let parameters = self.object(parameters, &format!("{at} parameters"))?;
            for (section, entries) in parameters {
                if section == "shared" {
                    let refs = entries
                        .as_array()
                        .ok_or_else(|| self.error(format!("{at}: 'shared' must be a list")))?;
                    for reference in refs {
                        let text = reference
                            .as_str()
                            .ok_or_else(|| SpecError::InvalidReference(reference.to_string()))?;
                        spec = spec.shared_param(text.parse()?);
                    }
                    continue;
                }
                let entries = self.object(entries, &format!("{at} {section} parameters"))?;
                for (name, node) in entries {
                    let context = format!("{at} {section} '{name}'");
                    let param = declared_parameter(node, &context)?;
                    spec = match section.as_str() {
                        "path" => spec.path_param(name.clone(), param),
                        "query" => spec.query_param(name.clone(), param),
                        "header" => spec.header_param(name.clone(), param),
                        other => {
                            return Err(self.error(format!("{at}: unknown parameter location '{other}'")))
                        }
                    };
                }
            }
        }

        if let Some(body) = decl.get("body") {
            let body_map = self.object(body, &format!("{at} body"))?;
            if let Some(params) = body_map.get("params") {
                let params = self.object(params, &format!("{at} body params"))?;
                for (name, node) in params {
                    let param = declared_parameter(node, &format!("{at} body '{name}'"))?;
                    spec = spec.post_param(name.clone(), param);
                }
            } else if let Some(request) = body_map.get("request") {
                spec = spec.post_body_request(self.request_body(request, &format!("{at} body"))?);
            } else {
                return Err(self.error(format!("{at}: body needs 'params' or 'request'")));
            }
        }

        if let Some(responses) = decl.get("responses") {
            let responses = self.object(responses, &format!("{at} responses"))?;
            for (status, entry) in responses {
                let context = format!("{at} response {status}");
                let descriptors = descriptors(entry, &context)?;
                if status == "default" {
                    for descriptor in descriptors {
                        spec = spec.default_response(descriptor);
                    }
                    continue;
                }
                let code: u16 = status
                    .parse()
                    .ok()
                    .filter(|code| (100..=599).contains(code))
                    .ok_or_else(|| self.error(format!("{at}: '{status}' is not a status code")))?;
                for descriptor in descriptors {
                    spec = spec.response(code, descriptor);
                }
            }
        }

        Ok(spec)
    }

    fn request_body(&self, node: &Value, context: &str) -> Result<RequestBody, SpecError> {
        let decl = self.object(node, context)?;
        let schema = if let Some(reference) = decl.get("ref").and_then(Value::as_str) {
            BodySchema::Reference(reference.parse()?)
        } else if let Some(schema) = decl.get("schema") {
            body_schema(schema)?
        } else {
            return Err(self.error(format!("{context}: request body needs 'ref' or 'schema'")));
        };
        let mut body = RequestBody::new(schema);
        if let Some(text) = decl.get("description").and_then(Value::as_str) {
            body = body.description(text);
        }
        if decl.get("required") == Some(&Value::Bool(false)) {
            body = body.optional();
        }
        if let Some(content_type) = decl.get("contentType").and_then(Value::as_str) {
            body = body.content_type(content_type);
        }
        Ok(body)
    }
}

fn body_schema(schema: &Value) -> Result<BodySchema, SpecError> {
    if let Some(union) = DiscriminatedUnion::from_schema(schema) {
        return Ok(BodySchema::Union(union?));
    }
    if let (Some(parsed), Some(1)) = (ComponentKey::from_ref_node(schema), schema.as_object().map(Map::len)) {
        return Ok(BodySchema::Reference(parsed?));
    }
    Ok(BodySchema::Inline(schema.clone()))
}

fn parameter(node: &Value, context: &str) -> Result<Parameter, SpecError> {
    Parameter::from_schema(node).map_err(|source| SpecError::InvalidParameter {
        context: context.to_string(),
        source,
    })
}

/// A parameter node: a schema, plus a boolean `required` flag.
fn declared_parameter(node: &Value, context: &str) -> Result<Parameter, SpecError> {
    let param = parameter(node, context)?;
    Ok(if node.get("required") == Some(&Value::Bool(true)) {
        param.required()
    } else {
        param
    })
}

fn scope_list(node: &Value, endpoint: &str) -> Result<Vec<String>, SpecError> {
    let invalid = |reason: &str| SpecError::InvalidScopes {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let list = match node {
        Value::Array(list) => list,
        Value::Object(_) => return Err(invalid("scopes must be a plain list, not a mapping")),
        _ => return Err(invalid("scopes must be a list of strings")),
    };
    list.iter()
        .map(|scope| {
            scope
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("every scope must be a string"))
        })
        .collect()
}

fn descriptors(entry: &Value, context: &str) -> Result<Vec<ResponseDescriptor>, SpecError> {
    match entry {
        Value::Array(items) => items.iter().map(|item| descriptor(item, context)).collect(),
        single => descriptor(single, context).map(|d| vec![d]),
    }
}

fn descriptor(entry: &Value, context: &str) -> Result<ResponseDescriptor, SpecError> {
    let invalid = |reason: &str| SpecError::InvalidDescription {
        context: context.to_string(),
        reason: reason.to_string(),
    };
    match entry {
        Value::String(text) if looks_like_reference(text) => {
            Ok(ResponseDescriptor::reference(text.parse()?))
        }
        Value::String(text) => Ok(ResponseDescriptor::description(text.clone())),
        Value::Object(map) => {
            let description = match map.get("description") {
                None => None,
                Some(Value::String(text)) => Some(text.clone()),
                Some(_) => return Err(invalid("'description' must be a string")),
            };
            let reference = map
                .get("ref")
                .or_else(|| map.get("$ref"))
                .map(|r| r.as_str().ok_or_else(|| invalid("'ref' must be a string")))
                .transpose()?;
            let descriptor = match (reference, map.get("schema")) {
                (Some(_), Some(_)) => return Err(invalid("give either 'ref' or 'schema', not both")),
                (Some(reference), None) => ResponseDescriptor::reference(reference.parse()?),
                (None, Some(schema)) => ResponseDescriptor::schema(schema.clone()),
                (None, None) => {
                    return description
                        .map(ResponseDescriptor::description)
                        .ok_or_else(|| invalid("object needs 'description', 'ref' or 'schema'"))
                }
            };
            Ok(match description {
                Some(text) => descriptor.described(text),
                None => descriptor,
            })
        }
        Value::Array(_) => Err(invalid("nested lists are not allowed")),
        _ => Err(invalid("expected a string, an object or a list")),
    }
}

fn looks_like_reference(text: &str) -> bool {
    text.starts_with("#/components/")
        || ["schemas/", "responses/", "requestBodies/", "parameters/"]
            .iter()
            .any(|prefix| text.starts_with(prefix))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert YAML into JSON, stringifying scalar mapping keys so that
/// unquoted status codes such as `200:` work.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("non-finite number {n}"))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut out = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported mapping key {other:?}")),
                };
                out.insert(key, yaml_to_json(value)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Group endpoints by path, for summaries.
pub fn endpoints_by_path(registry: &SpecificationRegistry) -> BTreeMap<&str, Vec<HttpMethod>> {
    let mut grouped: BTreeMap<&str, Vec<HttpMethod>> = BTreeMap::new();
    for spec in registry.endpoints() {
        grouped.entry(spec.path()).or_default().push(spec.method());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USERS: &str = r#"
info:
  title: Users
  version: 1.2.0
components:
  schemas:
    User:
      type: object
      properties:
        id: { type: integer }
  responses:
    NotFound:
      description: No such user
  parameters:
    Limit:
      name: limit
      in: query
      schema: { type: integer, maximum: 100 }
endpoints:
  - method: get
    path: /users/{id}
    scopes: [users.read]
    parameters:
      path:
        id: { type: integer }
      query:
        expand: { type: boolean, default: false }
    responses:
      200: schemas/User
      404: [responses/NotFound, "Deleted"]
  - method: post
    path: /users
    body:
      params:
        name: { type: string, required: true, maxLength: 40 }
    responses:
      201: { description: Created, ref: schemas/User }
      default: Unexpected error
  - method: get
    path: /users
    parameters:
      shared: [parameters/Limit]
    responses:
      200: { schema: { type: array } }
"#;

    fn load(text: &str) -> Result<SpecificationRegistry, SpecError> {
        let mut registry = SpecificationRegistry::default();
        registry.apply_declarations("test.yaml", text)?;
        Ok(registry)
    }

    #[test]
    fn loads_endpoints_and_components() {
        let registry = load(USERS).unwrap();
        assert_eq!(registry.info().title, "Users");
        assert_eq!(registry.info().version, "1.2.0");
        assert_eq!(registry.len(), 3);
        assert!(registry.check_references().is_empty());

        let get = registry.endpoint(HttpMethod::Get, "/users/{id}").unwrap();
        assert!(get.has_any_of_these_scopes(&["users.read"]));
        let not_found = get.get_response(404, registry.components()).unwrap();
        assert_eq!(not_found.description, "No such user, Deleted");

        let post = registry.endpoint(HttpMethod::Post, "/users").unwrap();
        let created = post.get_response(201, registry.components()).unwrap();
        assert_eq!(created.description, "Created");
        assert_eq!(created.schema, Some(json!({"$ref": "#/components/schemas/User"})));
        assert!(post.has_default_response());
    }

    #[test]
    fn json_declarations_are_accepted() {
        let text = json!({
            "endpoints": [{"method": "DELETE", "path": "/users/{id}", "responses": {"204": "Deleted"}}]
        })
        .to_string();
        let registry = load(&text).unwrap();
        assert!(registry.endpoint(HttpMethod::Delete, "/users/{id}").is_some());
    }

    #[test]
    fn mapping_scopes_are_rejected() {
        let err = load(
            "endpoints:\n  - method: get\n    path: /x\n    scopes: { read: true }\n",
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidScopes { .. }));
    }

    #[test]
    fn numeric_description_is_invalid() {
        let err = load("endpoints:\n  - method: get\n    path: /x\n    responses:\n      200: 42\n")
            .unwrap_err();
        assert!(matches!(err, SpecError::InvalidDescription { .. }));
    }

    #[test]
    fn unknown_method_is_a_declaration_error() {
        let err = load("endpoints:\n  - method: fetch\n    path: /x\n").unwrap_err();
        assert!(matches!(err, SpecError::Declaration { .. }));
    }

    #[test]
    fn discriminated_union_body_is_recognised() {
        let text = r##"
endpoints:
  - method: post
    path: /tests
    body:
      request:
        schema:
          oneOf:
            - $ref: "#/components/schemas/test_type_1"
            - $ref: "#/components/schemas/test_type_2"
          discriminator:
            propertyName: test_type
"##;
        let registry = load(text).unwrap();
        let spec = registry.endpoint(HttpMethod::Post, "/tests").unwrap();
        match spec.post_body() {
            Some(crate::request_body::PostBody::Request(body)) => {
                assert!(matches!(body.schema, BodySchema::Union(_)));
            }
            other => panic!("expected request body, got {other:?}"),
        }
    }

    #[test]
    fn endpoints_are_grouped_by_path() {
        let registry = load(USERS).unwrap();
        let grouped = endpoints_by_path(&registry);
        assert_eq!(grouped["/users"], [HttpMethod::Get, HttpMethod::Post]);
    }
}
