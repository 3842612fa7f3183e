//! # Contract Validator
//!
//! The pipeline facade a transport layer holds: a shared registry plus
//! the configuration switches. Requests go through coercion then
//! validation; responses are checked only when enabled. Compiled schemas
//! are cached for the lifetime of the validator, since the registry it
//! wraps never changes.

use std::sync::Arc;

use apic_core::HttpMethod;
use apic_spec::{EndpointSpecification, SpecificationRegistry};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::coercion::coerce_request;
use crate::config::ValidationConfig;
use crate::engine::SchemaCache;
use crate::error::ContractError;
use crate::request::validate_request_cached;
use crate::response::validate_response_cached;
use crate::values::RequestValues;

/// Coerces and validates requests and responses against a registry.
#[derive(Debug, Clone)]
pub struct ContractValidator {
    registry: Arc<SpecificationRegistry>,
    config: ValidationConfig,
    schemas: SchemaCache,
}

impl ContractValidator {
    pub fn new(registry: Arc<SpecificationRegistry>, config: ValidationConfig) -> Self {
        Self {
            registry,
            config,
            schemas: SchemaCache::default(),
        }
    }

    pub fn registry(&self) -> &SpecificationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run only the coercion stage.
    pub fn coerce(&self, spec: &EndpointSpecification, values: &mut RequestValues) {
        coerce_request(spec, self.registry.components(), values);
    }

    /// Run only the validation stage.
    pub fn validate_request(
        &self,
        spec: &EndpointSpecification,
        values: &mut RequestValues,
    ) -> Result<(), ContractError> {
        validate_request_cached(spec, self.registry.components(), values, &self.config, &self.schemas)
    }

    /// Validate a handler's payload when response validation is enabled.
    pub fn validate_response(
        &self,
        spec: &EndpointSpecification,
        status: u16,
        payload: &Value,
    ) -> Result<(), ContractError> {
        if !self.config.validate_responses {
            return Ok(());
        }
        validate_response_cached(spec, self.registry.components(), status, payload, &self.schemas)
    }

    /// Find the endpoint whose path template matches `path`.
    ///
    /// Literal segments must match exactly; `{name}` segments match any
    /// non-empty segment and are returned percent-decoded. An exact
    /// template match wins over a parameterised one.
    pub fn find_endpoint(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Option<(&EndpointSpecification, Map<String, Value>)> {
        if let Some(spec) = self.registry.endpoint(method, path) {
            return Some((spec, Map::new()));
        }
        self.registry
            .endpoints()
            .filter(|spec| spec.method() == method)
            .find_map(|spec| match_template(spec.path(), path).map(|params| (spec, params)))
    }

    /// Coerce and validate a request for `method` and `path`.
    ///
    /// Path values extracted from `path` are added to `values.path`
    /// unless already present.
    pub fn process_request(
        &self,
        method: HttpMethod,
        path: &str,
        values: &mut RequestValues,
    ) -> Result<(), ContractError> {
        let (spec, path_values) = self.find_endpoint(method, path).ok_or_else(|| ContractError::UnknownEndpoint {
            method,
            path: path.to_string(),
        })?;
        for (name, value) in path_values {
            values.path.entry(name).or_insert(value);
        }
        self.coerce(spec, values);
        self.validate_request(spec, values)
    }
}

/// Match `path` against a `{param}` template. Captured segments are
/// percent-decoded.
pub fn match_template(template: &str, path: &str) -> Option<Map<String, Value>> {
    let wanted: Vec<&str> = template.trim_matches('/').split('/').collect();
    let actual: Vec<&str> = path.trim_matches('/').split('/').collect();
    if wanted.len() != actual.len() {
        return None;
    }
    let mut params = Map::new();
    for (pattern, segment) in wanted.iter().zip(&actual) {
        match pattern.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) if !segment.is_empty() => {
                let decoded = percent_decode_str(segment).decode_utf8_lossy();
                params.insert(name.to_string(), Value::String(decoded.into_owned()));
            }
            Some(_) => return None,
            None if pattern == segment => {}
            None => return None,
        }
    }
    Some(params)
}
