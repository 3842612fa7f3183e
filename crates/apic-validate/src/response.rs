//! # Response Validation Stage
//!
//! Checks an outgoing payload against the schema declared for its status.
//! Statuses the endpoint does not declare fall back to its `default`
//! response. Description-only responses accept any payload.
//!
//! Several descriptors under one status are alternatives: the payload
//! conforms when it matches any one of them. When it matches none, the
//! errors of the closest alternative (fewest errors, earliest on a tie)
//! are reported.

use apic_spec::{Components, EndpointSpecification};
use serde_json::Value;

use crate::engine::{first_per_property, SchemaCache};
use crate::error::{ContractError, ResponseValidationFailure, ValidationError};

/// Validate `payload` as the response body for `status`.
///
/// # Errors
///
/// [`ContractError::Response`] when the payload breaks the declared
/// schema; [`ContractError::Spec`] when the status is undeclared or the
/// declaration cannot be resolved.
pub fn validate_response(
    spec: &EndpointSpecification,
    components: &Components,
    status: u16,
    payload: &Value,
) -> Result<(), ContractError> {
    validate_response_cached(spec, components, status, payload, &SchemaCache::disabled())
}

/// [`validate_response`] with compiled schemas taken from `cache`.
pub fn validate_response_cached(
    spec: &EndpointSpecification,
    components: &Components,
    status: u16,
    payload: &Value,
    cache: &SchemaCache,
) -> Result<(), ContractError> {
    let response = spec.get_response_or_default(status, components)?;
    let location = format!("{} {} response {status}", spec.method(), spec.path());

    let mut closest: Option<Vec<ValidationError>> = None;
    for alternative in &response.alternatives {
        let errors = alternative_errors(alternative, components, payload, cache, &location)?;
        if errors.is_empty() {
            return Ok(());
        }
        if closest.as_ref().map_or(true, |best| errors.len() < best.len()) {
            closest = Some(errors);
        }
    }
    let Some(errors) = closest else {
        return Ok(());
    };

    tracing::warn!(
        method = %spec.method(),
        path = spec.path(),
        status,
        errors = errors.len(),
        "response does not match its declaration"
    );
    Err(ResponseValidationFailure { status, errors }.into())
}

/// Deduplicated errors of `payload` against one alternative schema.
fn alternative_errors(
    schema: &Value,
    components: &Components,
    payload: &Value,
    cache: &SchemaCache,
    location: &str,
) -> Result<Vec<ValidationError>, ContractError> {
    let narrowed = components.narrow(schema, payload)?;
    let mut errors: Vec<ValidationError> = narrowed
        .misses
        .into_iter()
        .map(|miss| ValidationError::discriminator(miss.property, miss.value))
        .collect();
    errors.extend(cache.compile(&narrowed.schema, location)?.errors(payload, payload));
    Ok(first_per_property(errors))
}
