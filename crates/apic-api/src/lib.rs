//! # apic-api — Axum Adapter
//!
//! Connects the contract pipeline to an axum application.
//!
//! - [`contract_middleware`] coerces and validates requests for declared
//!   endpoints and, when enabled, validates responses.
//! - [`Validated`] hands the coerced request values to handlers.
//! - [`ApiError`] maps contract failures to HTTP responses: 400 for
//!   request failures, 591 for response failures, 500 for broken
//!   declarations.
//! - [`document_router`] serves the aggregate document.
//!
//! ## Crate Policy
//!
//! - No contract logic here; everything delegates to `apic-validate`.
//! - Internal error causes are logged, never returned to clients.

pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use middleware::{contract_middleware, Validated};
pub use routes::{document_router, enforce_contract, DOCUMENT_PATH};
pub use state::ContractState;

/// Bind `addr` and serve `app` until the process is stopped.
pub async fn serve(addr: SocketAddr, app: axum::Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await
}
