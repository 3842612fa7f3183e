//! # Document Subcommand
//!
//! Prints the aggregate API document from a registry cache.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::load_cache;

#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Only include endpoints declaring one of these scopes. Repeatable.
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Execute `apic document`.
pub fn run_document(cache: Option<&Path>, args: &DocumentArgs, out: &mut impl Write) -> Result<u8> {
    let registry = load_cache(cache)?;
    let filter = (!args.scopes.is_empty()).then_some(args.scopes.as_slice());
    let document = registry.to_document(filter).context("rendering document")?;

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&document)?,
        OutputFormat::Yaml => serde_yaml::to_string(&document)?,
    };
    writeln!(out, "{rendered}")?;
    tracing::info!(endpoints = registry.len(), format = ?args.format, "document written");
    Ok(0)
}
