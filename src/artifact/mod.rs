//! Artifact collection into the install path.
//!
//! Collection is unconditional: it runs after every build, successful or
//! not, copying whatever the build produced. A failed kernel build still
//! leaves its resolved config and captured log in the install path for
//! diagnosis. Artifacts are copied, never moved, so the workspace keeps its
//! reusable state.

pub mod modules;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::arch::ArchSpec;
use crate::workspace::Workspace;

/// Extension of compiled device-tree blobs.
pub const DTB_EXTENSION: &str = "dtb";

/// What the collector found and copied, for console reporting and the build
/// manifest.
#[derive(Debug, Default)]
pub struct CollectedArtifacts {
    pub config: bool,
    pub log: bool,
    pub system_map: bool,
    /// Basenames of the kernel images copied.
    pub images: Vec<String>,
    /// Number of device-tree blobs copied.
    pub dtbs: usize,
}

/// Copy the build's artifacts from the workspace into `install_path`.
///
/// The resolved config lands as `kernel.config`, the log as `build.log`, the
/// symbol map keeps its name and is optional. Kernel images are matched by
/// the architecture's image name table anywhere under the boot subtree;
/// device-tree blobs keep their vendor subdirectory grouping under `dtbs/`.
pub fn collect(
    workspace: &Workspace,
    arch: &ArchSpec,
    install_path: &Path,
) -> Result<CollectedArtifacts> {
    let mut collected = CollectedArtifacts::default();

    collected.config = copy_if_exists(&workspace.kconfig_file(), &install_path.join("kernel.config"))?;
    collected.log = copy_if_exists(&workspace.build_log(), &install_path.join("build.log"))?;
    // Absence of the symbol map is normal (failed or image-only builds).
    collected.system_map = copy_if_exists(&workspace.system_map(), &install_path.join("System.map"))?;

    let boot_dir = workspace.boot_dir(arch.name);
    for pattern in arch.image_patterns {
        for entry in WalkDir::new(&boot_dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || entry.file_name().to_string_lossy() != *pattern {
                continue;
            }
            let dest = install_path.join(entry.file_name());
            fs::copy(entry.path(), &dest).with_context(|| {
                format!(
                    "copying kernel image '{}' to '{}'",
                    entry.path().display(),
                    dest.display()
                )
            })?;
            collected.images.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    collected.dtbs = collect_dtbs(&boot_dir.join("dts"), install_path)?;

    Ok(collected)
}

/// Copy device-tree blobs under `dts_root` into `<install>/dtbs`, keeping
/// one level of vendor/platform grouping: a blob directly under the root
/// lands in `dtbs/`, a blob in a subdirectory lands in
/// `dtbs/<immediateParentDirName>/`.
fn collect_dtbs(dts_root: &Path, install_path: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(dts_root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some(DTB_EXTENSION) {
            continue;
        }

        let parent = entry.path().parent();
        let dest_dir = if parent == Some(dts_root) {
            install_path.join("dtbs")
        } else {
            let group = parent
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            install_path.join("dtbs").join(group)
        };

        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("creating dtb directory '{}'", dest_dir.display()))?;
        let dest = dest_dir.join(entry.file_name());
        fs::copy(entry.path(), &dest).with_context(|| {
            format!("copying dtb '{}' to '{}'", entry.path().display(), dest.display())
        })?;
        copied += 1;
    }

    Ok(copied)
}

fn copy_if_exists(src: &Path, dest: &Path) -> Result<bool> {
    if !src.is_file() {
        return Ok(false);
    }
    fs::copy(src, dest)
        .with_context(|| format!("copying '{}' to '{}'", src.display(), dest.display()))?;
    Ok(true)
}
