//! # API Error Types
//!
//! Maps contract failures to HTTP responses with a structured JSON body:
//!
//! ```json
//! { "error": { "code": "REQUEST_VALIDATION_FAILED", "message": "...", "details": [...] } }
//! ```
//!
//! `details` carries the per-field validation errors for request and
//! response failures. Server-side errors never expose their cause.

use apic_core::BAD_RESPONSE;
use apic_validate::{ContractError, ValidationError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `REQUEST_VALIDATION_FAILED`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationError>>,
}

/// Errors the adapter layer reports to clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The request body could not be read or decoded.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Internal failure in the adapter itself. Not shown to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Contract(err) => match err {
                ContractError::Request(_) => (StatusCode::BAD_REQUEST, "REQUEST_VALIDATION_FAILED"),
                ContractError::Response(_) => (bad_response(), "BAD_RESPONSE"),
                ContractError::UnknownEndpoint { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ContractError::Spec(_) | ContractError::Schema { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "SPECIFICATION_ERROR")
                }
            },
            Self::MalformedBody(_) => (StatusCode::BAD_REQUEST, "MALFORMED_BODY"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn bad_response() -> StatusCode {
    StatusCode::from_u16(BAD_RESPONSE).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Contract(ContractError::Request(_)) => "request does not match the endpoint contract".to_string(),
            Self::Contract(ContractError::Response(failure)) => {
                format!("response for status {} does not match the endpoint contract", failure.status)
            }
            Self::Contract(ContractError::Spec(_) | ContractError::Schema { .. }) | Self::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        match &self {
            Self::Contract(ContractError::Spec(_) | ContractError::Schema { .. }) => {
                tracing::error!(error = %self, "endpoint declaration is broken");
            }
            Self::Contract(ContractError::Response(_)) => {
                tracing::error!(error = %self, "handler response violates its contract");
            }
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            _ => {}
        }

        let details = match &self {
            Self::Contract(err) if !err.validation_errors().is_empty() => Some(err.validation_errors().to_vec()),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
