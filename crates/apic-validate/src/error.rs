//! # Validation Errors
//!
//! [`ValidationError`] is the structured per-field error both validation
//! stages produce. Request failures are client errors (400); response
//! failures are server bugs and carry the custom `591 Bad Response`
//! status.

use std::collections::BTreeMap;
use std::fmt;

use apic_core::{HttpMethod, BAD_RESPONSE};
use apic_spec::SpecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DISCRIMINATOR_CONSTRAINT: &str = "discriminator";
pub const DISCRIMINATOR_MESSAGE: &str = "value did not match any available schemas";

/// One failed constraint on one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dot path of the failing property, `""` for the document root.
    pub property: String,
    /// The failing keyword: `type`, `minimum`, `required`,
    /// `additionalProp`, `discriminator`, ...
    pub constraint: String,
    pub message: String,
    /// The offending value, looked up in the payload as received.
    pub value: Value,
    /// Constraint-specific fields, e.g. `minItems: 2`.
    #[serde(flatten)]
    pub context: BTreeMap<String, Value>,
}

impl ValidationError {
    pub fn new(
        property: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            property: property.into(),
            constraint: constraint.into(),
            message: message.into(),
            value,
            context: BTreeMap::new(),
        }
    }

    /// The error raised when a discriminator value selects no schema.
    pub fn discriminator(property: impl Into<String>, value: Value) -> Self {
        Self::new(property, DISCRIMINATOR_CONSTRAINT, DISCRIMINATOR_MESSAGE, value)
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let property = if self.property.is_empty() { "(root)" } else { &self.property };
        write!(f, "{property} [{}]: {}", self.constraint, self.message)
    }
}

fn render_list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A request rejected before its handler ran.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("request validation failed: {}", render_list(.errors))]
pub struct RequestValidationFailure {
    pub errors: Vec<ValidationError>,
}

impl RequestValidationFailure {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// A handler produced output that breaks its declared contract.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("response validation failed for status {status}: {}", render_list(.errors))]
pub struct ResponseValidationFailure {
    /// The status the handler responded with.
    pub status: u16,
    pub errors: Vec<ValidationError>,
}

impl ResponseValidationFailure {
    pub fn status_code(&self) -> u16 {
        BAD_RESPONSE
    }
}

/// Everything the contract pipeline can fail with.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error(transparent)]
    Request(#[from] RequestValidationFailure),

    #[error(transparent)]
    Response(#[from] ResponseValidationFailure),

    /// A declaration error surfaced at first use.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// A resolved schema could not be compiled into a validator.
    #[error("schema compilation failed at {location}: {reason}")]
    Schema { location: String, reason: String },

    /// No endpoint is registered for the method and path.
    #[error("no endpoint registered for {method} {path}")]
    UnknownEndpoint { method: HttpMethod, path: String },
}

impl ContractError {
    /// The HTTP status this error should be reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Request(failure) => failure.status_code(),
            Self::Response(failure) => failure.status_code(),
            Self::UnknownEndpoint { .. } => 404,
            Self::Spec(_) | Self::Schema { .. } => 500,
        }
    }

    /// The per-field errors, for validation failures.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Request(failure) => &failure.errors,
            Self::Response(failure) => &failure.errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_is_flattened_into_the_error_object() {
        let err = ValidationError::new("test", "minItems", "too short", json!([123]))
            .with_context("minItems", json!(2));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "property": "test",
                "constraint": "minItems",
                "message": "too short",
                "value": [123],
                "minItems": 2
            })
        );
    }

    #[test]
    fn status_codes() {
        let request = ContractError::from(RequestValidationFailure { errors: vec![] });
        assert_eq!(request.status_code(), 400);
        let response = ContractError::from(ResponseValidationFailure { status: 200, errors: vec![] });
        assert_eq!(response.status_code(), 591);
        let spec = ContractError::from(SpecError::InvalidReference("x".into()));
        assert_eq!(spec.status_code(), 500);
    }

    #[test]
    fn display_lists_every_error() {
        let failure = RequestValidationFailure {
            errors: vec![
                ValidationError::new("a", "type", "wrong type", json!("x")),
                ValidationError::new("", "required", "b is required", Value::Null),
            ],
        };
        assert_eq!(
            failure.to_string(),
            "request validation failed: a [type]: wrong type; (root) [required]: b is required"
        );
    }
}
