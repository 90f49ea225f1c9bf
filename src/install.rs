//! Deterministic, version-addressed install paths.
//!
//! `storage/builds/<tree>/<branch>/<version>/<arch>/<defconfigName>` is the
//! sole identity of a build's artifacts. Re-running a build for the same key
//! overwrites the previous contents in place; superseding an earlier result
//! is expected, not an error.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::SourceTree;

/// Compute the install path for one build key without touching the
/// filesystem.
pub fn install_path(
    builds_root: &Path,
    source: &SourceTree,
    arch: &str,
    defconfig_name: &str,
) -> PathBuf {
    builds_root
        .join(&source.tree)
        .join(&source.branch)
        .join(&source.version)
        .join(arch)
        .join(defconfig_name)
}

/// Compute the install path and create it (and any missing ancestors).
/// Idempotent: calling it twice for the same key is a no-op the second time.
pub fn ensure_install_path(
    builds_root: &Path,
    source: &SourceTree,
    arch: &str,
    defconfig_name: &str,
) -> Result<PathBuf> {
    let path = install_path(builds_root, source, arch, defconfig_name);
    fs::create_dir_all(&path)
        .with_context(|| format!("creating install path '{}'", path.display()))?;
    Ok(path)
}
