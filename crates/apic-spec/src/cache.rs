//! # Registry Cache
//!
//! Persists a built registry so later process starts can skip re-reading
//! declarations. The artifact is the registry's serde form, written as
//! JSON or YAML; a reloaded registry compares equal to the one saved.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::registry::SpecificationRegistry;

/// Encoding of a cache artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    #[default]
    Json,
    Yaml,
}

impl CacheFormat {
    /// Pick the format from a file extension; anything but `.yaml`/`.yml`
    /// is JSON.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

impl FromStr for CacheFormat {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(SpecError::Serialization(format!("unknown cache format '{other}'"))),
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

impl SpecificationRegistry {
    /// Write the registry to `path`.
    pub fn save(&self, path: &Path, format: CacheFormat) -> Result<(), SpecError> {
        let encoded = match format {
            CacheFormat::Json => serde_json::to_string_pretty(self)?,
            CacheFormat::Yaml => serde_yaml::to_string(self)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, encoded)?;
        tracing::info!(path = %path.display(), %format, endpoints = self.len(), "saved specification cache");
        Ok(())
    }

    /// Read a registry saved by [`SpecificationRegistry::save`]. The format
    /// is chosen from the file extension.
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let text = fs::read_to_string(path)?;
        let format = CacheFormat::for_path(path);
        let registry: Self = match format {
            CacheFormat::Json => serde_json::from_str(&text)?,
            CacheFormat::Yaml => serde_yaml::from_str(&text)?,
        };
        tracing::info!(path = %path.display(), %format, endpoints = registry.len(), "loaded specification cache");
        Ok(registry)
    }
}
