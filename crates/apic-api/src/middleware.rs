//! # Contract Middleware
//!
//! Runs the contract pipeline around every request whose method and
//! path match a registered endpoint:
//!
//! 1. decode path, query, header and body values;
//! 2. coerce and validate them, rejecting the request with 400 on failure;
//! 3. hand the coerced values to the handler through [`Validated`];
//! 4. when response validation is enabled, check the handler's JSON
//!    payload against the declared response and replace it with a 591
//!    error if it does not conform.
//!
//! Requests for undeclared endpoints pass through untouched.

use std::str::FromStr;

use apic_core::HttpMethod;
use apic_validate::RequestValues;
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::ApiError;
use crate::extract;
use crate::state::ContractState;

/// Coerced, validated request values, available to handlers behind the
/// contract middleware.
#[derive(Debug, Clone)]
pub struct Validated(pub RequestValues);

impl<S: Send + Sync> FromRequestParts<S> for Validated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Validated>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("contract middleware is not installed on this route".into()))
    }
}

/// Axum middleware entry point, for use with
/// `axum::middleware::from_fn_with_state`.
pub async fn contract_middleware(State(state): State<ContractState>, request: Request, next: Next) -> Response {
    match enforce(&state, request, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn enforce(state: &ContractState, request: Request, next: Next) -> Result<Response, ApiError> {
    let Ok(method) = HttpMethod::from_str(request.method().as_str()) else {
        return Ok(next.run(request).await);
    };
    let path = request.uri().path().to_string();
    let Some((spec, path_values)) = state.validator.find_endpoint(method, &path) else {
        tracing::debug!(%method, %path, "no contract for route");
        return Ok(next.run(request).await);
    };

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, state.body_limit)
        .await
        .map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    let mut values = RequestValues {
        path: path_values,
        query: extract::query_values(parts.uri.query())?,
        headers: extract::header_values(&parts.headers),
        body: extract::body_value(&parts.headers, &bytes)?,
        ..RequestValues::default()
    };
    state.validator.coerce(spec, &mut values);
    state.validator.validate_request(spec, &mut values)?;
    tracing::debug!(%method, %path, "request accepted");

    parts.extensions.insert(Validated(values));
    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    if !state.validator.config().validate_responses {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ApiError::Internal(format!("reading response body: {e}")))?;
    state.validator.validate_response(spec, status, &response_payload(&bytes))?;
    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn response_payload(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
