//! # Specification Errors
//!
//! Every variant here is a programmer error in the declarations
//! themselves, except [`SpecError::DiscriminatorMismatch`], which the
//! validation stages turn into a client- or server-side validation error.
//! None of them are silently defaulted.

use apic_core::{CoreError, HttpMethod};
use serde_json::Value;
use thiserror::Error;

/// Error raised while declaring, resolving or persisting specifications.
#[derive(Error, Debug)]
pub enum SpecError {
    /// A response was requested for a status the endpoint does not declare.
    #[error("invalid status {status}: {method} {path} declares no response for it")]
    InvalidStatus {
        method: HttpMethod,
        path: String,
        status: u16,
    },

    /// A response description has a shape that cannot be interpreted.
    #[error("invalid description for {context}: {reason}")]
    InvalidDescription { context: String, reason: String },

    /// Authorization scopes were declared as something other than a plain list.
    #[error("invalid scopes for {endpoint}: {reason}")]
    InvalidScopes { endpoint: String, reason: String },

    /// A reference string is not of the form `kind/Name`.
    #[error("malformed reference '{0}'")]
    InvalidReference(String),

    /// A reference names a component section that does not exist.
    #[error("unknown component kind '{0}'")]
    UnknownComponentKind(String),

    /// A reference did not resolve to a registered component.
    #[error("reference not found: {key}")]
    ReferenceNotFound { key: String },

    /// A reference resolved, but to a component of the wrong kind.
    #[error("reference {key} resolves to a {found} component, expected {expected}")]
    WrongComponentKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Following references led back to a component already being expanded.
    #[error("circular reference through {key}")]
    CircularReference { key: String },

    /// A discriminator value selected none of the union's candidate schemas.
    #[error("discriminator '{property_name}' value {value} did not match any available schemas")]
    DiscriminatorMismatch { property_name: String, value: Value },

    /// A parameter declaration could not be built.
    #[error("invalid parameter {context}: {source}")]
    InvalidParameter {
        context: String,
        #[source]
        source: CoreError,
    },

    /// A declaration document is structurally invalid.
    #[error("invalid declaration in {source_name}: {reason}")]
    Declaration { source_name: String, reason: String },

    /// Encoding or decoding a persisted registry failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error reading or writing a cache artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SpecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SpecError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
