//! # apic-cli — Command-Line Interface
//!
//! Subcommand implementations for the `apic` binary. Each `run_*`
//! function writes its report to the given writer and returns the
//! process exit code, so the commands can be tested without spawning a
//! process.
//!
//! - `apic check`: load declaration files, report broken references,
//!   optionally write a registry cache.
//! - `apic document`: print the aggregate document from a cache.
//! - `apic respond`: validate a response payload offline.

pub mod check;
pub mod document;
pub mod respond;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apic_spec::SpecificationRegistry;

/// Load the registry cache, failing with a hint when none was given.
pub fn load_cache(cache: Option<&Path>) -> Result<SpecificationRegistry> {
    let path: PathBuf = cache
        .map(Path::to_path_buf)
        .context("--cache <file> is required; create one with `apic check --write-cache`")?;
    SpecificationRegistry::load(&path).with_context(|| format!("loading registry cache {}", path.display()))
}
