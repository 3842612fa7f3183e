//! # Request Validation Stage
//!
//! Validates coerced request values in three passes: path and query
//! parameters together, then the post body, then declared headers. Each
//! pass builds a schema from the declaration, runs the lenient pass over
//! a copy of the values, validates, and writes the adjusted values back.
//!
//! On failure the request is rejected with every error collected across
//! the passes; a property may report several constraints, and only the
//! `type`/`anyOf` echo of a nullable property is collapsed. On success the
//! request metadata is marked as passed.

use std::collections::BTreeMap;

use apic_core::{Parameter, ParameterLocation};
use apic_spec::{object_schema, Components, EndpointSpecification, PostBody};
use serde_json::{Map, Value};

use crate::config::ValidationConfig;
use crate::engine::{collapse_type_any_of, SchemaCache};
use crate::error::{ContractError, RequestValidationFailure, ValidationError};
use crate::lenient;
use crate::values::{RequestValues, ValidationStatus};

/// Validate `values` against `spec`.
///
/// # Errors
///
/// [`ContractError::Request`] with the collected errors when the request
/// breaks the contract; [`ContractError::Spec`] or
/// [`ContractError::Schema`] when the declaration itself is broken.
pub fn validate_request(
    spec: &EndpointSpecification,
    components: &Components,
    values: &mut RequestValues,
    config: &ValidationConfig,
) -> Result<(), ContractError> {
    validate_request_cached(spec, components, values, config, &SchemaCache::disabled())
}

/// [`validate_request`] with compiled schemas taken from `cache`.
pub fn validate_request_cached(
    spec: &EndpointSpecification,
    components: &Components,
    values: &mut RequestValues,
    config: &ValidationConfig,
    cache: &SchemaCache,
) -> Result<(), ContractError> {
    let at = format!("{} {}", spec.method(), spec.path());
    let pass = Pass { config, cache, at: &at };
    let mut errors = Vec::new();

    errors.extend(validate_path_and_query(spec, components, values, &pass)?);
    errors.extend(validate_body(spec, components, values, &pass)?);
    errors.extend(validate_headers(spec, components, values, &pass)?);

    let errors = collapse_type_any_of(errors);
    if errors.is_empty() {
        values.metadata.validation = ValidationStatus::Pass;
        tracing::debug!(endpoint = %at, "request passed validation");
        Ok(())
    } else {
        values.metadata.validation = ValidationStatus::Fail;
        tracing::info!(endpoint = %at, errors = errors.len(), "request rejected");
        Err(RequestValidationFailure { errors }.into())
    }
}

fn validate_path_and_query(
    spec: &EndpointSpecification,
    components: &Components,
    values: &mut RequestValues,
    pass: &Pass<'_>,
) -> Result<Vec<ValidationError>, ContractError> {
    let path_params = spec.params(ParameterLocation::Path, components)?;
    let mut params = path_params.clone();
    params.extend(spec.params(ParameterLocation::Query, components)?);
    if params.is_empty() {
        return Ok(Vec::new());
    }

    let mut original = values.path.clone();
    original.extend(values.query.clone());
    let original = Value::Object(original);

    let schema = object_schema(&params);
    let (errors, adjusted) = pass.run(&schema, &original, "parameters")?;

    if let Value::Object(adjusted) = adjusted {
        for (name, value) in adjusted {
            if path_params.contains_key(&name) {
                values.path.insert(name, value);
            } else {
                values.query.insert(name, value);
            }
        }
    }
    Ok(errors)
}

fn validate_body(
    spec: &EndpointSpecification,
    components: &Components,
    values: &mut RequestValues,
    pass: &Pass<'_>,
) -> Result<Vec<ValidationError>, ContractError> {
    let optional_body = match spec.post_body() {
        None => return Ok(Vec::new()),
        Some(PostBody::Params(params)) => params.is_empty(),
        Some(PostBody::Request(body)) => !body.required,
    };
    if values.body.is_null() && optional_body {
        return Ok(Vec::new());
    }

    let Some(narrowed) = spec.post_body_narrowed(components, &values.body)? else {
        return Ok(Vec::new());
    };
    let mut errors: Vec<ValidationError> = narrowed
        .misses
        .into_iter()
        .map(|miss| ValidationError::discriminator(miss.property, miss.value))
        .collect();

    // A missing body for flat parameters validates as an empty object so
    // that each missing required field is reported.
    let original = match (&values.body, spec.post_body()) {
        (Value::Null, Some(PostBody::Params(_))) => Value::Object(Map::new()),
        (body, _) => body.clone(),
    };
    let (found, adjusted) = pass.run(&narrowed.schema, &original, "body")?;
    values.body = adjusted;
    errors.extend(found);
    Ok(errors)
}

fn validate_headers(
    spec: &EndpointSpecification,
    components: &Components,
    values: &mut RequestValues,
    pass: &Pass<'_>,
) -> Result<Vec<ValidationError>, ContractError> {
    let params: BTreeMap<String, Parameter> = spec.params(ParameterLocation::Header, components)?;
    if params.is_empty() {
        return Ok(Vec::new());
    }

    // Only declared headers take part, under their declared names.
    let mut stored_names = BTreeMap::new();
    let mut declared = Map::new();
    for name in params.keys() {
        if let Some((stored, value)) = values.header(name) {
            stored_names.insert(name.clone(), stored.to_string());
            declared.insert(name.clone(), value.clone());
        }
    }
    let original = Value::Object(declared);

    let schema = object_schema(&params);
    let (errors, adjusted) = pass.run(&schema, &original, "headers")?;

    if let Value::Object(adjusted) = adjusted {
        for (name, value) in adjusted {
            let key = stored_names.get(&name).cloned().unwrap_or(name);
            values.headers.insert(key, value);
        }
    }
    Ok(errors)
}

/// Shared settings for the three passes.
struct Pass<'a> {
    config: &'a ValidationConfig,
    cache: &'a SchemaCache,
    at: &'a str,
}

impl Pass<'_> {
    /// Lenient pass plus validation. Returns the errors and the adjusted
    /// instance.
    fn run(&self, schema: &Value, original: &Value, part: &str) -> Result<(Vec<ValidationError>, Value), ContractError> {
        let mut instance = original.clone();
        lenient::apply(schema, &mut instance, self.config);
        let compiled = self.cache.compile(schema, &format!("{} {part}", self.at))?;
        let errors = compiled.errors(&instance, original);
        Ok((errors, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apic_core::HttpMethod;
    use apic_spec::{ComponentKey, DiscriminatedUnion, RequestBody, SpecError};
    use serde_json::json;

    use crate::coercion::coerce_request;

    fn check(
        spec: &EndpointSpecification,
        components: &Components,
        mut values: RequestValues,
    ) -> (Result<(), ContractError>, RequestValues) {
        coerce_request(spec, components, &mut values);
        let result = validate_request(spec, components, &mut values, &ValidationConfig::default());
        (result, values)
    }

    fn boolean_endpoint() -> EndpointSpecification {
        EndpointSpecification::new(HttpMethod::Post, "/flags").post_param("test", Parameter::boolean().required())
    }

    #[test]
    fn non_boolean_string_is_one_type_error() {
        let (result, values) = check(
            &boolean_endpoint(),
            &Components::default(),
            RequestValues::new().with_body(json!({"test": "abcdef"})),
        );
        let err = result.unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "test");
        assert_eq!(errors[0].constraint, "type");
        assert_eq!(values.metadata.validation, ValidationStatus::Fail);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn numeric_one_passes_as_true() {
        let (result, values) = check(
            &boolean_endpoint(),
            &Components::default(),
            RequestValues::new().with_body(json!({"test": 1})),
        );
        result.unwrap();
        assert_eq!(values.body["test"], json!(true));
        assert_eq!(values.metadata.validation, ValidationStatus::Pass);
    }

    #[test]
    fn single_value_fails_min_items() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/items")
            .query_param("test", Parameter::array_of(Parameter::integer()).min_items(2));
        let (result, _) = check(&spec, &Components::default(), RequestValues::new().with_query("test", "123"));
        let err = result.unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "test");
        assert_eq!(errors[0].constraint, "minItems");
        assert_eq!(errors[0].context_value("minItems"), Some(&json!(2)));
    }

    #[test]
    fn missing_required_path_and_query_params_are_reported() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users/{id}")
            .path_param("id", Parameter::integer())
            .query_param("q", Parameter::string().required());
        let (result, _) = check(&spec, &Components::default(), RequestValues::new());
        let err = result.unwrap_err();
        let mut props: Vec<&str> = err.validation_errors().iter().map(|e| e.property.as_str()).collect();
        props.sort_unstable();
        assert_eq!(props, ["id", "q"]);
        assert!(err.validation_errors().iter().all(|e| e.constraint == "required"));
    }

    #[test]
    fn array_item_errors_use_dot_notation() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/ids")
            .post_param("ids", Parameter::array_of(Parameter::integer().maximum(10.0)));
        let (result, _) = check(
            &spec,
            &Components::default(),
            RequestValues::new().with_body(json!({"ids": [1, 2, 30]})),
        );
        let err = result.unwrap_err();
        assert_eq!(err.validation_errors()[0].property, "ids.2");
        assert_eq!(err.validation_errors()[0].value, json!(30));
    }

    #[test]
    fn required_defaults_are_applied_by_the_lenient_pass() {
        // Declared with a default and required: coercion already fills it,
        // but the lenient pass must too when coercion did not run.
        let spec = EndpointSpecification::new(HttpMethod::Get, "/page")
            .query_param("size", Parameter::integer().required().default(25));
        let mut values = RequestValues::new();
        validate_request(&spec, &Components::default(), &mut values, &ValidationConfig::default()).unwrap();
        assert_eq!(values.query["size"], json!(25));
    }

    #[test]
    fn headers_are_matched_case_insensitively() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/me")
            .header_param("X-Api-Version", Parameter::integer().required().minimum(2.0));
        let (result, _) = check(
            &spec,
            &Components::default(),
            RequestValues::new().with_header("x-api-version", "1"),
        );
        let err = result.unwrap_err();
        assert_eq!(err.validation_errors()[0].property, "X-Api-Version");
        assert_eq!(err.validation_errors()[0].constraint, "minimum");

        let (ok, values) = check(
            &spec,
            &Components::default(),
            RequestValues::new().with_header("x-api-version", "3"),
        );
        ok.unwrap();
        assert_eq!(values.headers["x-api-version"], json!(3));
    }

    fn union_components() -> Components {
        let mut c = Components::default();
        c.insert_schema(
            "test_type_1",
            json!({
                "type": "object",
                "properties": {"test_type": {"type": "string"}, "a": {"type": "integer"}},
                "required": ["test_type", "a"],
                "additionalProperties": false
            }),
        );
        c.insert_schema(
            "test_type_2",
            json!({
                "type": "object",
                "properties": {"test_type": {"type": "string"}, "b": {"type": "string"}},
                "required": ["test_type", "b"]
            }),
        );
        c
    }

    fn union_endpoint() -> EndpointSpecification {
        let union = DiscriminatedUnion::new(
            "test_type",
            [ComponentKey::schema("test_type_1"), ComponentKey::schema("test_type_2")],
        )
        .map("test_type_1", ComponentKey::schema("test_type_1"))
        .map("test_type_2", ComponentKey::schema("test_type_2"));
        EndpointSpecification::new(HttpMethod::Post, "/tests").post_body_request(RequestBody::union(union))
    }

    #[test]
    fn unmapped_discriminator_value_is_rejected() {
        let (result, _) = check(
            &union_endpoint(),
            &union_components(),
            RequestValues::new().with_body(json!({"test_type": "test_type_3"})),
        );
        let err = result.unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, "discriminator");
        assert_eq!(errors[0].property, "test_type");
        assert_eq!(errors[0].message, "value did not match any available schemas");
    }

    #[test]
    fn payload_matching_selected_branch_passes() {
        let (result, _) = check(
            &union_endpoint(),
            &union_components(),
            RequestValues::new().with_body(json!({"test_type": "test_type_1", "a": 4})),
        );
        result.unwrap();
    }

    #[test]
    fn selected_branch_constraints_apply() {
        let (result, _) = check(
            &union_endpoint(),
            &union_components(),
            RequestValues::new().with_body(json!({"test_type": "test_type_1", "b": "x"})),
        );
        let err = result.unwrap_err();
        let constraints: Vec<&str> = err.validation_errors().iter().map(|e| e.constraint.as_str()).collect();
        assert!(constraints.contains(&"required"));
        assert!(constraints.contains(&"additionalProp"));
    }

    #[test]
    fn optional_request_body_may_be_absent() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/notes")
            .post_body_request(RequestBody::inline(json!({"type": "object", "required": ["text"]})).optional());
        let (result, _) = check(&spec, &Components::default(), RequestValues::new());
        result.unwrap();
    }

    #[test]
    fn broken_reference_is_a_spec_error_not_a_client_error() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/x")
            .post_body_request(RequestBody::reference(ComponentKey::schema("Missing")));
        let (result, _) = check(&spec, &Components::default(), RequestValues::new().with_body(json!({})));
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::Spec(SpecError::ReferenceNotFound { .. })));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn every_broken_constraint_on_a_property_is_reported() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/codes")
            .query_param("code", Parameter::string().min_length(5).pattern("^[0-9]+$"));
        let (result, _) = check(&spec, &Components::default(), RequestValues::new().with_query("code", "ab"));
        let err = result.unwrap_err();
        let mut constraints: Vec<&str> = err.validation_errors().iter().map(|e| e.constraint.as_str()).collect();
        constraints.sort_unstable();
        assert_eq!(constraints, ["minLength", "pattern"]);
        assert!(err.validation_errors().iter().all(|e| e.property == "code"));
    }

    fn enveloped_endpoint() -> (EndpointSpecification, Components) {
        let mut c = union_components();
        c.insert_schema(
            "Union",
            DiscriminatedUnion::new(
                "test_type",
                [ComponentKey::schema("test_type_1"), ComponentKey::schema("test_type_2")],
            )
            .schema(),
        );
        let spec = EndpointSpecification::new(HttpMethod::Post, "/wrapped").post_body_request(RequestBody::inline(json!({
            "allOf": [
                {"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]},
                {"type": "object", "properties": {"data": {"$ref": "#/components/schemas/Union"}}}
            ]
        })));
        (spec, c)
    }

    #[test]
    fn union_inside_an_envelope_selects_its_branch() {
        let (spec, c) = enveloped_endpoint();
        let (result, values) = check(
            &spec,
            &c,
            RequestValues::new().with_body(json!({"id": "3", "data": {"test_type": "test_type_1", "a": "4"}})),
        );
        result.unwrap();
        assert_eq!(values.body, json!({"id": 3, "data": {"test_type": "test_type_1", "a": 4}}));
    }

    #[test]
    fn unmatched_nested_discriminator_is_rejected_at_its_path() {
        let (spec, c) = enveloped_endpoint();
        let (result, _) = check(
            &spec,
            &c,
            RequestValues::new().with_body(json!({"id": 1, "data": {"test_type": "test_type_3"}})),
        );
        let err = result.unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "data.test_type");
        assert_eq!(errors[0].constraint, "discriminator");
        assert_eq!(errors[0].value, json!("test_type_3"));
    }

    #[test]
    fn cached_validation_reuses_compiled_schemas() {
        let cache = SchemaCache::default();
        let spec = boolean_endpoint();
        for body in [json!({"test": true}), json!({"test": "false"})] {
            let mut values = RequestValues::new().with_body(body);
            validate_request_cached(&spec, &Components::default(), &mut values, &ValidationConfig::default(), &cache)
                .unwrap();
        }
        assert_eq!(cache.len(), 1);
    }
}
