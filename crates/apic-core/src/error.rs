//! # Error Types
//!
//! Errors raised while constructing parameter descriptors from untyped
//! input: type tags, schema fragments, HTTP method names and persistence
//! column types. Coercion itself never fails and has no error type.

use thiserror::Error;

/// Top-level error type for `apic-core`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A parameter type tag did not name one of the six parameter kinds.
    #[error("unknown parameter type '{0}'")]
    UnknownType(String),

    /// An HTTP method name was not recognized.
    #[error("unknown HTTP method '{0}'")]
    UnknownMethod(String),

    /// A schema fragment could not be converted into a parameter.
    #[error("invalid schema at '{pointer}': {reason}")]
    InvalidSchema {
        /// JSON Pointer to the offending schema node.
        pointer: String,
        /// Why the node was rejected.
        reason: String,
    },

    /// A persistence column type has no parameter mapping.
    #[error("no parameter mapping for column type '{column_type}' (field '{field}')")]
    UnknownColumnType {
        /// Field name as declared by the persistence layer.
        field: String,
        /// The unmapped column type.
        column_type: String,
    },
}

impl CoreError {
    pub(crate) fn invalid_schema(pointer: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            pointer: if pointer.is_empty() {
                "/".to_string()
            } else {
                pointer.to_string()
            },
            reason: reason.into(),
        }
    }
}
