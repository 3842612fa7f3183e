//! # Respond Subcommand
//!
//! Validates a response payload against a cached registry without
//! running the service. Useful for checking recorded fixtures.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use apic_core::HttpMethod;
use apic_validate::{ContractError, ContractValidator, ValidationConfig};
use clap::Args;
use serde_json::Value;

use crate::load_cache;

#[derive(Args, Debug)]
pub struct RespondArgs {
    /// HTTP method of the endpoint, e.g. `get`.
    #[arg(long)]
    pub method: String,

    /// Request path; concrete paths are matched against templates.
    #[arg(long)]
    pub path: String,

    /// Response status code.
    #[arg(long)]
    pub status: u16,

    /// JSON file holding the response payload.
    pub payload: PathBuf,
}

/// Execute `apic respond`. Exit code 1 when the payload does not conform.
pub fn run_respond(cache: Option<&Path>, args: &RespondArgs, out: &mut impl Write) -> Result<u8> {
    let registry = load_cache(cache)?;
    let method: HttpMethod = args.method.parse()?;
    let validator = ContractValidator::new(
        Arc::new(registry),
        ValidationConfig::default().with_response_validation(true),
    );
    let (spec, _) = validator
        .find_endpoint(method, &args.path)
        .ok_or_else(|| anyhow!("no endpoint registered for {method} {}", args.path))?;

    let text = std::fs::read_to_string(&args.payload)
        .with_context(|| format!("reading payload {}", args.payload.display()))?;
    let payload: Value = serde_json::from_str(&text).context("payload is not valid JSON")?;

    match validator.validate_response(spec, args.status, &payload) {
        Ok(()) => {
            writeln!(out, "ok: {method} {} {}", spec.path(), args.status)?;
            Ok(0)
        }
        Err(ContractError::Response(failure)) => {
            for error in &failure.errors {
                writeln!(out, "{error}")?;
            }
            Ok(1)
        }
        Err(other) => Err(other.into()),
    }
}
