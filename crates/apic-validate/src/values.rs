//! # Request Values
//!
//! Raw request values already split by location, as handed over by the
//! transport layer. The coercion stage rewrites them in place and the
//! request validation stage records its verdict in the metadata.

use apic_core::ParameterLocation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of request validation, for logging and response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Pass,
    Fail,
}

/// Request-scoped metadata written by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub validation: ValidationStatus,
}

/// Path, query, header and body values of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestValues {
    #[serde(default)]
    pub path: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Decoded body, `Null` when the request has none.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl RequestValues {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// The value map for a non-body location.
    pub fn location(&self, location: ParameterLocation) -> Option<&Map<String, Value>> {
        match location {
            ParameterLocation::Path => Some(&self.path),
            ParameterLocation::Query => Some(&self.query),
            ParameterLocation::Header => Some(&self.headers),
            ParameterLocation::Body => self.body.as_object(),
        }
    }

    /// Header lookup ignoring ASCII case. Returns the stored name too.
    pub fn header(&self, name: &str) -> Option<(&str, &Value)> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, value)| (key.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_lookup_ignores_case() {
        let values = RequestValues::new().with_header("X-Request-Id", "abc");
        let (stored, value) = values.header("x-request-id").unwrap();
        assert_eq!(stored, "X-Request-Id");
        assert_eq!(value, &json!("abc"));
        assert!(values.header("x-other").is_none());
    }

    #[test]
    fn starts_pending() {
        assert_eq!(RequestValues::new().metadata.validation, ValidationStatus::Pending);
    }
}
