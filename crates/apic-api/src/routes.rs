//! # Routes
//!
//! The aggregate document route, plus helpers that attach the contract
//! middleware to an application router.

use axum::extract::{RawQuery, State};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::query_values;
use crate::middleware::contract_middleware;
use crate::state::ContractState;

pub const DOCUMENT_PATH: &str = "/openapi.json";

/// Router serving the aggregate document at [`DOCUMENT_PATH`].
///
/// `?scope=a&scope=b` restricts the document to endpoints declaring at
/// least one of the given scopes.
pub fn document_router(state: ContractState) -> Router {
    Router::new().route(DOCUMENT_PATH, get(document)).with_state(state)
}

/// Wrap every route of `router` in the contract middleware.
pub fn enforce_contract<S>(router: Router<S>, state: ContractState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(state, contract_middleware))
}

async fn document(State(state): State<ContractState>, RawQuery(query): RawQuery) -> Result<Json<Value>, ApiError> {
    let query = query_values(query.as_deref())?;
    let scopes: Option<Vec<String>> = query.get("scope").map(|value| match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        other => other.as_str().map(str::to_string).into_iter().collect(),
    });
    let document = state
        .validator
        .registry()
        .to_document(scopes.as_deref())
        .map_err(apic_validate::ContractError::from)?;
    Ok(Json(document))
}
