//! # Endpoint Specification
//!
//! The declared contract for one `(method, path)` pair: typed parameter
//! maps for every request location, the post body, the responses per
//! status code, and the authorization scopes.
//!
//! Declarations are built with consuming builder methods and are never
//! mutated once registered.

use std::collections::BTreeMap;

use apic_core::{default_description, HttpMethod, Parameter, ParameterLocation, ParameterType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::components::Components;
use crate::error::SpecError;
use crate::narrow::Narrowed;
use crate::reference::ComponentKey;
use crate::request_body::{PostBody, PostParameters, RequestBody};
use crate::response::{combine, ResolvedResponse, ResponseDescriptor};

/// Declared contract for one HTTP method and path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpecification {
    method: HttpMethod,
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    path_params: BTreeMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    query_params: BTreeMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    header_params: BTreeMap<String, Parameter>,
    /// References to shared `parameters/` components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    shared_params: Vec<ComponentKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_body: Option<PostBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    responses: BTreeMap<u16, Vec<ResponseDescriptor>>,
    /// Responses for any status not listed in `responses`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    default_response: Vec<ResponseDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    public: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    deprecated: bool,
}

impl EndpointSpecification {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            summary: None,
            description: None,
            operation_id: None,
            tags: Vec::new(),
            path_params: BTreeMap::new(),
            query_params: BTreeMap::new(),
            header_params: BTreeMap::new(),
            shared_params: Vec::new(),
            post_body: None,
            responses: BTreeMap::new(),
            default_response: Vec::new(),
            scopes: Vec::new(),
            public: false,
            deprecated: false,
        }
    }

    // -- builders -----------------------------------------------------------

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Declare a path parameter. Path parameters are always required.
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.path_params.insert(name.into(), param.required());
        self
    }

    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.query_params.insert(name.into(), param);
        self
    }

    #[must_use]
    pub fn header_param(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.header_params.insert(name.into(), param);
        self
    }

    /// Reference a shared parameter component.
    #[must_use]
    pub fn shared_param(mut self, key: ComponentKey) -> Self {
        if !self.shared_params.contains(&key) {
            self.shared_params.push(key);
        }
        self
    }

    /// Declare one flat post parameter.
    ///
    /// Replaces a structured request body, if one was declared.
    #[must_use]
    pub fn post_param(mut self, name: impl Into<String>, param: Parameter) -> Self {
        let mut params = match self.post_body.take() {
            Some(PostBody::Params(params)) => params,
            _ => BTreeMap::new(),
        };
        params.insert(name.into(), param);
        self.post_body = Some(PostBody::Params(params));
        self
    }

    /// Declare a structured request body, replacing any flat post parameters.
    #[must_use]
    pub fn post_body_request(mut self, body: RequestBody) -> Self {
        self.post_body = Some(PostBody::Request(body));
        self
    }

    /// Add a response descriptor under `status`. Several descriptors under
    /// one status are alternatives.
    #[must_use]
    pub fn response(mut self, status: u16, descriptor: ResponseDescriptor) -> Self {
        self.responses.entry(status).or_default().push(descriptor);
        self
    }

    /// Add a descriptor to the catch-all `default` response.
    #[must_use]
    pub fn default_response(mut self, descriptor: ResponseDescriptor) -> Self {
        self.default_response.push(descriptor);
        self
    }

    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for scope in scopes {
            let scope = scope.into();
            if !self.scopes.contains(&scope) {
                self.scopes.push(scope);
            }
        }
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn declared_scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn post_body(&self) -> Option<&PostBody> {
        self.post_body.as_ref()
    }

    pub fn shared_params(&self) -> &[ComponentKey] {
        &self.shared_params
    }

    /// Declared status codes, ascending.
    pub fn statuses(&self) -> impl Iterator<Item = u16> + '_ {
        self.responses.keys().copied()
    }

    pub fn has_default_response(&self) -> bool {
        !self.default_response.is_empty()
    }

    /// The explicit operation id, or one derived from method and path:
    /// `GET /users/{id}` becomes `get_users_id`.
    pub fn effective_operation_id(&self) -> String {
        if let Some(id) = &self.operation_id {
            return id.clone();
        }
        let mut id = self.method.as_str().to_string();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            let cleaned: String = segment
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
                .collect();
            let cleaned = cleaned.trim_matches('_');
            if !cleaned.is_empty() {
                id.push('_');
                id.push_str(cleaned);
            }
        }
        id
    }

    /// Parameters declared inline for `location`, without shared
    /// parameter components.
    pub fn declared_params(&self, location: ParameterLocation) -> Option<&BTreeMap<String, Parameter>> {
        match location {
            ParameterLocation::Path => Some(&self.path_params),
            ParameterLocation::Query => Some(&self.query_params),
            ParameterLocation::Header => Some(&self.header_params),
            ParameterLocation::Body => match &self.post_body {
                Some(PostBody::Params(params)) => Some(params),
                _ => None,
            },
        }
    }

    /// Parameters for `location`, including referenced shared parameters.
    /// Inline declarations win over shared ones with the same name.
    ///
    /// For [`ParameterLocation::Body`] use
    /// [`EndpointSpecification::resolve_post_params`] instead.
    pub fn params(
        &self,
        location: ParameterLocation,
        components: &Components,
    ) -> Result<BTreeMap<String, Parameter>, SpecError> {
        let mut params = BTreeMap::new();
        for key in &self.shared_params {
            let shared = components.parameter(key)?;
            if shared.location == location {
                let param = if location == ParameterLocation::Path {
                    shared.parameter.clone().required()
                } else {
                    shared.parameter.clone()
                };
                params.insert(shared.name.clone(), param);
            }
        }
        if let Some(declared) = self.declared_params(location) {
            params.extend(declared.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(params)
    }

    // -- queries ------------------------------------------------------------

    /// Resolve the post parameters.
    ///
    /// Flat post parameters are returned as declared. A structured body is
    /// resolved into the properties of its schema, unless it is a
    /// discriminated union, in which case resolution waits for the payload
    /// (see [`EndpointSpecification::post_params_for`]).
    pub fn resolve_post_params(&self, components: &Components) -> Result<PostParameters, SpecError> {
        match &self.post_body {
            None => Ok(PostParameters::Resolved(BTreeMap::new())),
            Some(PostBody::Params(params)) => Ok(PostParameters::Resolved(params.clone())),
            Some(PostBody::Request(body)) => {
                let raw = body.raw_schema(components)?;
                let followed = components.follow(&raw)?;
                if let Some(union) = crate::request_body::DiscriminatedUnion::from_schema(&followed) {
                    return Ok(PostParameters::AwaitingDiscriminator {
                        property_name: union?.property_name,
                    });
                }
                let flat = components.flatten(&followed)?;
                Ok(PostParameters::Resolved(properties_of(&flat)?))
            }
        }
    }

    /// Resolve the post parameters for a known payload, selecting the
    /// discriminated branch of every union in the body schema.
    pub fn post_params_for(
        &self,
        components: &Components,
        payload: &Value,
    ) -> Result<BTreeMap<String, Parameter>, SpecError> {
        match &self.post_body {
            None => Ok(BTreeMap::new()),
            Some(PostBody::Params(params)) => Ok(params.clone()),
            Some(PostBody::Request(_)) => {
                let schema = self.post_body_schema(components, payload)?.unwrap_or(Value::Null);
                properties_of(&schema)
            }
        }
    }

    /// The self-contained schema the post body is validated against.
    ///
    /// `None` when the endpoint declares no post body.
    pub fn post_body_schema(
        &self,
        components: &Components,
        payload: &Value,
    ) -> Result<Option<Value>, SpecError> {
        match self.post_body_narrowed(components, payload)? {
            None => Ok(None),
            Some(narrowed) => match narrowed.misses.into_iter().next() {
                Some(miss) => Err(miss.into()),
                None => Ok(Some(narrowed.schema)),
            },
        }
    }

    /// Like [`EndpointSpecification::post_body_schema`], but unmatched
    /// discriminators are returned alongside the schema instead of failing.
    pub fn post_body_narrowed(
        &self,
        components: &Components,
        payload: &Value,
    ) -> Result<Option<Narrowed>, SpecError> {
        match &self.post_body {
            None => Ok(None),
            Some(PostBody::Params(params)) => Ok(Some(Narrowed {
                schema: object_schema(params),
                misses: Vec::new(),
            })),
            Some(PostBody::Request(body)) => {
                let raw = body.raw_schema(components)?;
                components.narrow(&raw, payload).map(Some)
            }
        }
    }

    /// The combined response declared for `status`.
    ///
    /// # Errors
    ///
    /// [`SpecError::InvalidStatus`] when `status` is not declared, and any
    /// reference or description error from the descriptors.
    pub fn get_response(
        &self,
        status: u16,
        components: &Components,
    ) -> Result<ResolvedResponse, SpecError> {
        let descriptors = self.responses.get(&status).ok_or_else(|| self.invalid_status(status))?;
        combine(descriptors, components, || default_description(status))
    }

    /// Like [`EndpointSpecification::get_response`], falling back to the
    /// `default` response for undeclared statuses.
    pub fn get_response_or_default(
        &self,
        status: u16,
        components: &Components,
    ) -> Result<ResolvedResponse, SpecError> {
        match self.responses.get(&status) {
            Some(descriptors) => combine(descriptors, components, || default_description(status)),
            None if !self.default_response.is_empty() => {
                combine(&self.default_response, components, || "Default response".to_string())
            }
            None => Err(self.invalid_status(status)),
        }
    }

    /// The combined response schema for `status`, `None` for
    /// description-only responses.
    pub fn get_response_schema(
        &self,
        status: u16,
        components: &Components,
    ) -> Result<Option<Value>, SpecError> {
        Ok(self.get_response(status, components)?.schema)
    }

    /// The raw descriptors for `status`; the catch-all response uses `None`.
    pub(crate) fn descriptors(&self, status: Option<u16>) -> &[ResponseDescriptor] {
        match status {
            Some(code) => self.responses.get(&code).map(Vec::as_slice).unwrap_or_default(),
            None => &self.default_response,
        }
    }

    /// True when the endpoint declares at least one of `scopes`. An
    /// endpoint with no declared scopes never matches.
    pub fn has_any_of_these_scopes<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
        scopes
            .iter()
            .any(|wanted| self.scopes.iter().any(|declared| declared == wanted.as_ref()))
    }

    fn invalid_status(&self, status: u16) -> SpecError {
        SpecError::InvalidStatus {
            method: self.method,
            path: self.path.clone(),
            status,
        }
    }
}

/// The JSON Schema object described by a flat parameter map.
pub fn object_schema(params: &BTreeMap<String, Parameter>) -> Value {
    let properties: serde_json::Map<String, Value> =
        params.iter().map(|(name, p)| (name.clone(), p.schema())).collect();
    let required: Vec<&String> = params
        .iter()
        .filter(|(_, p)| p.is_required())
        .map(|(name, _)| name)
        .collect();
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// The property parameters of a resolved object schema. Non-object
/// schemas have none.
fn properties_of(schema: &Value) -> Result<BTreeMap<String, Parameter>, SpecError> {
    if schema.is_null() {
        return Ok(BTreeMap::new());
    }
    let param = Parameter::from_schema(schema).map_err(|source| SpecError::InvalidParameter {
        context: "post body".into(),
        source,
    })?;
    if param.parameter_type() != ParameterType::Object {
        return Ok(BTreeMap::new());
    }
    Ok(param.properties().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_body::DiscriminatedUnion;
    use crate::response::ResponseComponent;

    fn components() -> Components {
        let mut c = Components::default();
        c.insert_schema(
            "test_type_1",
            json!({"type": "object", "properties": {"test_type": {"type": "string"}, "a": {"type": "integer"}}, "required": ["a"]}),
        );
        c.insert_schema(
            "test_type_2",
            json!({"type": "object", "properties": {"test_type": {"type": "string"}, "b": {"type": "string"}}}),
        );
        c.insert_response("NotFound", ResponseComponent::new("Not found"));
        c
    }

    #[test]
    fn path_params_are_always_required() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users/{id}")
            .path_param("id", Parameter::integer());
        let params = spec.params(ParameterLocation::Path, &components()).unwrap();
        assert!(params["id"].is_required());
    }

    #[test]
    fn flat_post_params_resolve_directly() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/users")
            .post_param("name", Parameter::string().required());
        match spec.resolve_post_params(&components()).unwrap() {
            PostParameters::Resolved(params) => assert!(params.contains_key("name")),
            other => panic!("expected resolved params, got {other:?}"),
        }
    }

    #[test]
    fn union_body_defers_until_payload_is_known() {
        let union = DiscriminatedUnion::new(
            "test_type",
            [ComponentKey::schema("test_type_1"), ComponentKey::schema("test_type_2")],
        );
        let spec = EndpointSpecification::new(HttpMethod::Post, "/tests")
            .post_body_request(RequestBody::union(union));
        let c = components();
        assert_eq!(
            spec.resolve_post_params(&c).unwrap(),
            PostParameters::AwaitingDiscriminator {
                property_name: "test_type".into()
            }
        );
        let params = spec.post_params_for(&c, &json!({"test_type": "test_type_1"})).unwrap();
        assert!(params["a"].is_required());
        assert!(!params.contains_key("b"));
    }

    #[test]
    fn referenced_body_resolves_to_schema_properties() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/tests")
            .post_body_request(RequestBody::reference(ComponentKey::schema("test_type_2")));
        match spec.resolve_post_params(&components()).unwrap() {
            PostParameters::Resolved(params) => {
                assert_eq!(params.keys().collect::<Vec<_>>(), ["b", "test_type"]);
            }
            other => panic!("expected resolved params, got {other:?}"),
        }
    }

    #[test]
    fn undeclared_status_is_invalid() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users")
            .response(200, ResponseDescriptor::description("OK"));
        let err = spec.get_response(404, &components()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidStatus { status: 404, .. }));
    }

    #[test]
    fn default_response_covers_undeclared_statuses() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users")
            .response(200, ResponseDescriptor::description("OK"))
            .default_response(ResponseDescriptor::reference(ComponentKey::response("NotFound")));
        let resolved = spec.get_response_or_default(404, &components()).unwrap();
        assert_eq!(resolved.description, "Not found");
    }

    #[test]
    fn description_defaults_to_status_text() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users")
            .response(200, ResponseDescriptor::schema(json!({"type": "array"})));
        assert_eq!(spec.get_response(200, &components()).unwrap().description, "OK");
    }

    #[test]
    fn zero_scopes_never_match() {
        let open = EndpointSpecification::new(HttpMethod::Get, "/health");
        assert!(!open.has_any_of_these_scopes(&["admin"]));
        let scoped = open.clone().scopes(["users.read", "users.write"]);
        assert!(scoped.has_any_of_these_scopes(&["admin", "users.read"]));
        assert!(!scoped.has_any_of_these_scopes::<&str>(&[]));
    }

    #[test]
    fn operation_id_is_derived_from_method_and_path() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users/{id}/posts");
        assert_eq!(spec.effective_operation_id(), "get_users_id_posts");
        assert_eq!(spec.operation_id("listPosts").effective_operation_id(), "listPosts");
    }

    #[test]
    fn object_schema_lists_required_params() {
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), Parameter::string().required());
        params.insert("b".to_string(), Parameter::integer());
        let schema = object_schema(&params);
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["properties"]["b"]["type"], json!("integer"));
    }
}
