//! # Check Subcommand
//!
//! Loads declaration files into a registry and reports every problem a
//! request would otherwise surface at first use: broken references and
//! responses that cannot be rendered.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use apic_spec::declaration::endpoints_by_path;
use apic_spec::{CacheFormat, SpecificationRegistry};
use clap::Args;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Declaration files (YAML or JSON), applied in order.
    #[arg(required = true)]
    pub declarations: Vec<PathBuf>,

    /// Write the loaded registry to this cache file. The format follows
    /// the extension: `.yaml`/`.yml` for YAML, JSON otherwise.
    #[arg(long)]
    pub write_cache: Option<PathBuf>,
}

/// Execute `apic check`.
pub fn run_check(args: &CheckArgs, out: &mut impl Write) -> Result<u8> {
    let registry =
        SpecificationRegistry::from_declaration_files(&args.declarations).context("loading declarations")?;

    writeln!(out, "{} endpoint(s) declared", registry.len())?;
    for (path, methods) in endpoints_by_path(&registry) {
        let methods: Vec<String> = methods.iter().map(ToString::to_string).collect();
        writeln!(out, "  {path}  {}", methods.join(", "))?;
    }

    let problems = registry.check_references();
    if !problems.is_empty() {
        for problem in &problems {
            writeln!(out, "error: {}: {}", problem.location, problem.error)?;
        }
        tracing::warn!(count = problems.len(), "declarations reference missing components");
        return Ok(1);
    }

    if let Err(err) = registry.to_document(None) {
        writeln!(out, "error: {err}")?;
        return Ok(1);
    }

    if let Some(path) = &args.write_cache {
        registry
            .save(path, CacheFormat::for_path(path))
            .with_context(|| format!("writing cache {}", path.display()))?;
        writeln!(out, "cache written to {}", path.display())?;
    }
    writeln!(out, "ok")?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn clean_declarations_pass_and_write_a_cache() {
        let dir = tempfile::tempdir().unwrap();
        let decl = write(
            &dir,
            "api.yaml",
            "endpoints:\n  - method: get\n    path: /ping\n    responses:\n      200: Pong\n",
        );
        let cache = dir.path().join("cache/registry.json");
        let args = CheckArgs {
            declarations: vec![decl],
            write_cache: Some(cache.clone()),
        };
        let mut out = Vec::new();
        assert_eq!(run_check(&args, &mut out).unwrap(), 0);
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("1 endpoint(s) declared"));
        assert!(report.contains("/ping  GET"));
        assert!(SpecificationRegistry::load(&cache).unwrap().len() == 1);
    }

    #[test]
    fn broken_reference_fails_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let decl = write(
            &dir,
            "api.yaml",
            "endpoints:\n  - method: get\n    path: /users\n    responses:\n      200: schemas/Missing\n",
        );
        let args = CheckArgs {
            declarations: vec![decl],
            write_cache: None,
        };
        let mut out = Vec::new();
        assert_eq!(run_check(&args, &mut out).unwrap(), 1);
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("error: GET /users response 200"));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let args = CheckArgs {
            declarations: vec![PathBuf::from("/definitely/not/here.yaml")],
            write_cache: None,
        };
        assert!(run_check(&args, &mut Vec::new()).is_err());
    }
}
