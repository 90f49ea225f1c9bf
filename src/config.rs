//! Farm configuration: storage and workspace roots.
//!
//! Everything has a working default (`./storage`, `./workspace`); an
//! optional TOML file can relocate the roots or pin the make job count.
//! Unknown keys are rejected so typos fail loudly instead of silently
//! falling back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FarmConfig {
    /// Root holding `sources/` and `builds/`.
    pub storage_root: PathBuf,
    /// Root holding the reusable scratch directories.
    pub workspace_root: PathBuf,
    /// Fixed make job count; detected when absent.
    pub jobs: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FarmToml {
    storage_root: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    jobs: Option<usize>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            workspace_root: PathBuf::from("workspace"),
            jobs: None,
        }
    }
}

impl FarmConfig {
    /// Load configuration from `path`, or return the defaults when no file
    /// is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading farm config '{}'", path.display()))?;
        let parsed: FarmToml = toml::from_str(&raw)
            .with_context(|| format!("parsing farm config '{}'", path.display()))?;

        let defaults = Self::default();
        Ok(Self {
            storage_root: parsed.storage_root.unwrap_or(defaults.storage_root),
            workspace_root: parsed.workspace_root.unwrap_or(defaults.workspace_root),
            jobs: parsed.jobs,
        })
    }

    /// Where discovery looks for source bundles.
    pub fn sources_root(&self) -> PathBuf {
        self.storage_root.join("sources")
    }

    /// Where install paths are created.
    pub fn builds_root(&self) -> PathBuf {
        self.storage_root.join("builds")
    }
}
