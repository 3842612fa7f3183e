//! # Validation Configuration
//!
//! Switches for the optional parts of the pipeline. Read from the
//! environment at startup, or built directly in tests.

use serde::{Deserialize, Serialize};

pub const ENV_VALIDATE_RESPONSES: &str = "APIC_VALIDATE_RESPONSES";
pub const ENV_APPLY_DEFAULTS: &str = "APIC_APPLY_DEFAULTS";
pub const ENV_COERCE_TYPES: &str = "APIC_COERCE_TYPES";

/// Pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Validate handler output against the declared response schema.
    /// Off by default: it runs after the handler and is meant for test and
    /// staging deployments.
    pub validate_responses: bool,
    /// Fill declared defaults for missing required fields during the
    /// lenient pass.
    pub apply_defaults: bool,
    /// Convert compatible scalar types during the lenient pass.
    pub coerce_types: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_responses: false,
            apply_defaults: true,
            coerce_types: true,
        }
    }
}

impl ValidationConfig {
    /// Read overrides from `APIC_VALIDATE_RESPONSES`, `APIC_APPLY_DEFAULTS`
    /// and `APIC_COERCE_TYPES`. Unset or unrecognised values keep the
    /// default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ValidationConfig::from_env`], reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str, fallback: bool| match lookup(name).as_deref().map(parse_flag) {
            Some(Some(flag)) => flag,
            Some(None) => {
                tracing::warn!(variable = name, "unrecognised boolean, keeping default");
                fallback
            }
            None => fallback,
        };
        Self {
            validate_responses: read(ENV_VALIDATE_RESPONSES, defaults.validate_responses),
            apply_defaults: read(ENV_APPLY_DEFAULTS, defaults.apply_defaults),
            coerce_types: read(ENV_COERCE_TYPES, defaults.coerce_types),
        }
    }

    #[must_use]
    pub fn with_response_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
