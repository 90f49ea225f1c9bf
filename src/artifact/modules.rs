//! Kernel module packaging: stage, strip, archive.
//!
//! Modules are installed into an isolated temporary staging root, stripped
//! by the architecture's toolchain `strip`, and archived as
//! `modules.tar.xz`. The staging root is removed unconditionally when
//! packaging finishes, whether archiving succeeded or not.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::arch::ArchSpec;
use crate::build::BuildEngine;
use crate::workspace::Workspace;

/// Name of the compressed module archive in the install path.
pub const MODULES_TARBALL: &str = "modules.tar.xz";

/// Stage, strip and archive the built modules into `install_path`.
///
/// Returns the path of the copied tarball. The temporary staging root lives
/// only for the duration of this call.
pub fn package_modules(
    engine: &BuildEngine,
    arch: &ArchSpec,
    workspace: &Workspace,
    install_path: &Path,
) -> Result<PathBuf> {
    // RAII: the staging root is deleted on drop, also on the error paths.
    let staging = tempfile::tempdir().context("creating module staging directory")?;

    let status = engine.install_modules(arch, workspace, staging.path())?;
    if !status.success() {
        bail!(
            "installing modules into '{}' failed with {status}",
            staging.path().display()
        );
    }

    archive_modules(engine.tar(), staging.path(), install_path)
}

/// Archive `lib/modules` from the staging root and copy the tarball into the
/// install path.
pub(crate) fn archive_modules(
    tar: &Path,
    staging: &Path,
    install_path: &Path,
) -> Result<PathBuf> {
    let tarball = staging.join(MODULES_TARBALL);
    let status = Command::new(tar)
        .arg("-Jcf")
        .arg(&tarball)
        .arg("lib/modules")
        .current_dir(staging)
        .stdin(Stdio::null())
        .status()
        .with_context(|| format!("running '{} -Jcf {}'", tar.display(), tarball.display()))?;

    if !status.success() {
        bail!(
            "archiving modules from '{}' failed with {status}",
            staging.display()
        );
    }

    let dest = install_path.join(MODULES_TARBALL);
    fs::copy(&tarball, &dest).with_context(|| {
        format!("copying '{}' to '{}'", tarball.display(), dest.display())
    })?;
    Ok(dest)
}
