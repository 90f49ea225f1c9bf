//! Shared scratch directories reused across builds.
//!
//! The workspace holds two directories: `tmp`, where source bundles are
//! extracted and `make` runs, and `build`, the kbuild output directory
//! (`O=`). Neither is cleaned between runs: the output directory may contain
//! artifacts from a previous build, and the external build tool is trusted to
//! rebuild what the new configuration requires. A single build process owns
//! the workspace at a time; there is no locking.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Extraction and build working directory (`make` cwd).
    pub fn build_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Kernel build output directory, passed to `make` as `O=`.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    /// The resolved kernel configuration inside the output directory.
    pub fn kconfig_file(&self) -> PathBuf {
        self.output_dir().join(".config")
    }

    /// Captured combined make output for the current build.
    pub fn build_log(&self) -> PathBuf {
        self.output_dir().join("build.log")
    }

    /// Symbol map produced by a successful kernel build.
    pub fn system_map(&self) -> PathBuf {
        self.output_dir().join("System.map")
    }

    /// Boot artifact subtree for one architecture.
    pub fn boot_dir(&self, arch: &str) -> PathBuf {
        self.output_dir().join("arch").join(arch).join("boot")
    }

    /// Guarantee both scratch directories exist before a build starts.
    /// Existing contents are kept.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.build_dir(), self.output_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating workspace directory '{}'", dir.display()))?;
        }
        Ok(())
    }
}
