//! # Application State
//!
//! Shared state for the contract middleware and the document route.

use std::sync::Arc;

use apic_spec::SpecificationRegistry;
use apic_validate::{ContractValidator, ValidationConfig};

/// Request bodies larger than this are rejected before validation.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ContractState {
    pub validator: ContractValidator,
    pub body_limit: usize,
}

impl ContractState {
    pub fn new(registry: Arc<SpecificationRegistry>, config: ValidationConfig) -> Self {
        Self {
            validator: ContractValidator::new(registry, config),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// State configured from the `APIC_*` environment switches.
    pub fn from_env(registry: Arc<SpecificationRegistry>) -> Self {
        Self::new(registry, ValidationConfig::from_env())
    }

    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}
