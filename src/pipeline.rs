//! Sequential build-and-collect orchestration.
//!
//! One pass: resolve the target up front (fail closed on a bad
//! architecture), discover every buildable source tree, then for each tree
//! run the build engine, collect artifacts into the version-addressed
//! install path, package modules when they were built, and record a
//! manifest. A failure for one tree never aborts the run; it is reported and
//! the next tree is attempted.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::arch::{self, ArchSpec};
use crate::artifact::{self, modules};
use crate::build::BuildEngine;
use crate::config::FarmConfig;
use crate::discovery::{self, SourceTree};
use crate::error::FarmError;
use crate::install::ensure_install_path;
use crate::manifest::{self, BuildManifest};
use crate::workspace::Workspace;

/// A resolved (architecture, defconfig) build target.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub arch: &'static ArchSpec,
    /// Absolute path to the defconfig fragment.
    pub defconfig: PathBuf,
    /// Defconfig basename, the last install path component.
    pub name: String,
}

/// Resolve a defconfig path into a build target.
///
/// The defconfig's immediate parent directory names the architecture and
/// must be in the known table. Runs before any extraction or build work so
/// misconfiguration is cheap to detect.
pub fn resolve_target(defconfig: &Path) -> Result<BuildTarget> {
    let defconfig = fs::canonicalize(defconfig)
        .map_err(|_| FarmError::MissingInput(defconfig.to_path_buf()))?;
    if !defconfig.is_file() {
        return Err(FarmError::MissingInput(defconfig).into());
    }

    let name = defconfig
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let arch_name = defconfig
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let arch = arch::resolve(&arch_name)?;

    Ok(BuildTarget {
        arch,
        defconfig,
        name,
    })
}

/// Result of one pass over the discovered source trees.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempted: usize,
    /// `tree/branch` keys of the targets that failed to extract or build.
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed.len()
    }

    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build every discovered source tree against `target`, one after another in
/// discovery order.
pub fn run(config: &FarmConfig, engine: &BuildEngine, target: &BuildTarget) -> Result<RunSummary> {
    let workspace = Workspace::new(&config.workspace_root);
    let trees = discovery::discover(&config.sources_root());
    if trees.is_empty() {
        println!(
            "[discover] no source trees under '{}'",
            config.sources_root().display()
        );
    }

    let mut summary = RunSummary::default();
    for tree in &trees {
        summary.attempted += 1;
        let key = format!("{}/{}", tree.tree, tree.branch);
        println!("[build] {key} ({}) for {}/{}", tree.version, target.arch.name, target.name);

        match build_one(config, engine, target, &workspace, tree) {
            Ok(true) => println!("[build] {key}: ok"),
            Ok(false) => {
                eprintln!("[build] {key}: failed; log and config kept for diagnosis");
                summary.failed.push(key);
            }
            Err(err) => {
                eprintln!("[build] {key}: {err:#}");
                summary.failed.push(key);
            }
        }
    }

    Ok(summary)
}

/// One (tree, target) build: engine, install path, collection, module
/// packaging, manifest. Returns whether every attempted stage succeeded.
fn build_one(
    config: &FarmConfig,
    engine: &BuildEngine,
    target: &BuildTarget,
    workspace: &Workspace,
    tree: &SourceTree,
) -> Result<bool> {
    // Extraction failure returns here: no install path is created for this
    // tree.
    let outcome = engine.build(tree, target.arch, &target.defconfig, workspace)?;

    let install_path =
        ensure_install_path(&config.builds_root(), tree, target.arch.name, &target.name)?;
    let collected = artifact::collect(workspace, target.arch, &install_path)
        .with_context(|| format!("collecting artifacts into '{}'", install_path.display()))?;
    println!(
        "[collect] {} image(s), {} dtb(s) -> {}",
        collected.images.len(),
        collected.dtbs,
        install_path.display()
    );

    if outcome.modules_built() {
        let tarball = modules::package_modules(engine, target.arch, workspace, &install_path)?;
        println!("[modules] packaged {}", tarball.display());
    }

    let manifest = BuildManifest {
        tree: tree.tree.clone(),
        branch: tree.branch.clone(),
        version: tree.version.clone(),
        arch: target.arch.name.to_string(),
        defconfig: target.name.clone(),
        defconfig_sha256: manifest::sha256_file(&target.defconfig)?,
        kernel_exit: outcome.kernel_status.code(),
        modules_exit: outcome.modules_status.and_then(|status| status.code()),
        modules_enabled: outcome.modules_enabled,
        success: outcome.success(),
        finished_at_unix: manifest::now_unix(),
    };
    manifest::write_manifest(&install_path, &manifest)?;

    Ok(outcome.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::modules::MODULES_TARBALL;
    use crate::discovery::{SOURCE_BUNDLE, VERSION_MARKER};
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;
    use tempfile::TempDir;

    fn have(tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// A make stand-in that writes plausible kbuild outputs under `O=`.
    const FAKE_MAKE: &str = r#"#!/bin/sh
out=""; arch=""; target=""
for a in "$@"; do
  case "$a" in
    O=*) out="${a#O=}" ;;
    ARCH=*) arch="${a#ARCH=}" ;;
    olddefconfig|modules|modules_install) target="$a" ;;
  esac
done
case "$target" in
  olddefconfig) echo "configuration written" ;;
  modules) echo "modules built" ;;
  modules_install)
    mkdir -p "$INSTALL_MOD_PATH/lib/modules/6.9.0"
    echo fake > "$INSTALL_MOD_PATH/lib/modules/6.9.0/fake.ko"
    ;;
  *)
    echo "kernel built"
    mkdir -p "$out/arch/$arch/boot/dts/marvell"
    echo map > "$out/System.map"
    echo img > "$out/arch/$arch/boot/zImage"
    echo img > "$out/arch/$arch/boot/bzImage"
    echo dtb > "$out/arch/$arch/boot/dts/board.dtb"
    echo dtb > "$out/arch/$arch/boot/dts/marvell/armada.dtb"
    ;;
esac
exit 0
"#;

    /// A make stand-in whose compile stage fails.
    const FAILING_MAKE: &str = r#"#!/bin/sh
for a in "$@"; do
  case "$a" in olddefconfig) echo "configuration written"; exit 0 ;; esac
done
echo "error: internal compiler error"
exit 1
"#;

    struct Farm {
        _tmp: TempDir,
        config: FarmConfig,
        make: PathBuf,
    }

    fn farm(make_body: &str) -> Farm {
        let tmp = TempDir::new().unwrap();
        let config = FarmConfig {
            storage_root: tmp.path().join("storage"),
            workspace_root: tmp.path().join("workspace"),
            jobs: Some(1),
        };
        let make = tmp.path().join("bin/make");
        fs::create_dir_all(make.parent().unwrap()).unwrap();
        write_script(&make, make_body);
        Farm {
            config,
            make,
            _tmp: tmp,
        }
    }

    fn seed_source(config: &FarmConfig, tree: &str, branch: &str, version: &str) {
        let dir = config.sources_root().join(tree).join(branch);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(VERSION_MARKER), format!("{version}\n")).unwrap();

        let src = dir.join("src-content");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("Makefile"), b"# kernel makefile\n").unwrap();
        let status = Command::new("tar")
            .arg("czf")
            .arg(dir.join(SOURCE_BUNDLE))
            .arg("-C")
            .arg(&src)
            .arg(".")
            .status()
            .unwrap();
        assert!(status.success());
    }

    fn seed_corrupt_source(config: &FarmConfig, tree: &str, branch: &str) {
        let dir = config.sources_root().join(tree).join(branch);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(VERSION_MARKER), "v0.0\n").unwrap();
        fs::write(dir.join(SOURCE_BUNDLE), b"this is not a tarball").unwrap();
    }

    fn seed_defconfig(root: &Path, arch: &str, name: &str, content: &str) -> PathBuf {
        let dir = root.join("configs").join(arch);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn resolve_target_reads_arch_from_parent_dir() {
        let tmp = TempDir::new().unwrap();
        let defconfig = seed_defconfig(tmp.path(), "arm", "mvebu_v7_defconfig", "CONFIG_FOO=y\n");

        let target = resolve_target(&defconfig).unwrap();
        assert_eq!(target.arch.name, "arm");
        assert_eq!(target.name, "mvebu_v7_defconfig");
    }

    #[test]
    fn resolve_target_rejects_unknown_arch_before_any_work() {
        let tmp = TempDir::new().unwrap();
        let defconfig = seed_defconfig(tmp.path(), "sparc", "defconfig", "CONFIG_FOO=y\n");

        let err = resolve_target(&defconfig).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FarmError>(),
            Some(FarmError::UnknownArchitecture { .. })
        ));
    }

    #[test]
    fn resolve_target_rejects_missing_defconfig() {
        let err = resolve_target(Path::new("/nonexistent/arm/defconfig")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FarmError>(),
            Some(FarmError::MissingInput(_))
        ));
    }

    #[test]
    fn pipeline_builds_and_collects_arm_artifacts() {
        if !have("tar") {
            return;
        }

        let farm = farm(FAKE_MAKE);
        seed_source(&farm.config, "mainline", "master", "v6.9-rc2");
        let defconfig = seed_defconfig(
            farm.config.storage_root.parent().unwrap(),
            "arm",
            "mvebu_v7_defconfig",
            "# CONFIG_MODULES is not set\n",
        );

        let engine = BuildEngine::new(1, false).with_make(&farm.make);
        let target = resolve_target(&defconfig).unwrap();
        let summary = run(&farm.config, &engine, &target).unwrap();

        assert_eq!(summary.attempted, 1);
        assert!(summary.all_ok());

        let install = farm
            .config
            .builds_root()
            .join("mainline/master/v6.9-rc2/arm/mvebu_v7_defconfig");
        assert!(install.join("kernel.config").is_file());
        assert!(install.join("build.log").is_file());
        assert!(install.join("System.map").is_file());
        assert!(install.join("zImage").is_file());
        assert!(!install.join("bzImage").exists());
        assert!(install.join("dtbs/board.dtb").is_file());
        assert!(install.join("dtbs/marvell/armada.dtb").is_file());
        assert!(!install.join(MODULES_TARBALL).exists());

        let manifest: BuildManifest =
            serde_json::from_slice(&fs::read(install.join("build.json")).unwrap()).unwrap();
        assert!(manifest.success);
        assert_eq!(manifest.kernel_exit, Some(0));
        assert!(!manifest.modules_enabled);

        // The log captured the make invocations and their output.
        let log = fs::read_to_string(install.join("build.log")).unwrap();
        assert!(log.contains("olddefconfig"));
        assert!(log.contains("kernel built"));
    }

    #[test]
    fn pipeline_packages_modules_when_enabled() {
        if !have("tar") || !have("xz") {
            return;
        }

        let farm = farm(FAKE_MAKE);
        seed_source(&farm.config, "mainline", "master", "v6.9");
        let defconfig = seed_defconfig(
            farm.config.storage_root.parent().unwrap(),
            "arm",
            "mvebu_v7_defconfig",
            "CONFIG_MODULES=y\n",
        );

        let engine = BuildEngine::new(1, false).with_make(&farm.make);
        let target = resolve_target(&defconfig).unwrap();
        let summary = run(&farm.config, &engine, &target).unwrap();
        assert!(summary.all_ok());

        let install = farm
            .config
            .builds_root()
            .join("mainline/master/v6.9/arm/mvebu_v7_defconfig");
        assert!(install.join(MODULES_TARBALL).is_file());

        let manifest: BuildManifest =
            serde_json::from_slice(&fs::read(install.join("build.json")).unwrap()).unwrap();
        assert!(manifest.modules_enabled);
        assert_eq!(manifest.modules_exit, Some(0));
    }

    #[test]
    fn rerunning_a_build_overwrites_in_place() {
        if !have("tar") {
            return;
        }

        let farm = farm(FAKE_MAKE);
        seed_source(&farm.config, "mainline", "master", "v6.9");
        let defconfig = seed_defconfig(
            farm.config.storage_root.parent().unwrap(),
            "arm64",
            "defconfig",
            "# CONFIG_MODULES is not set\n",
        );

        let engine = BuildEngine::new(1, false).with_make(&farm.make);
        let target = resolve_target(&defconfig).unwrap();
        run(&farm.config, &engine, &target).unwrap();
        run(&farm.config, &engine, &target).unwrap();

        let version_dir = farm.config.builds_root().join("mainline/master/v6.9");
        let arch_dirs: Vec<_> = fs::read_dir(&version_dir).unwrap().collect();
        assert_eq!(arch_dirs.len(), 1);
        let config_dirs: Vec<_> = fs::read_dir(version_dir.join("arm64")).unwrap().collect();
        assert_eq!(config_dirs.len(), 1);
    }

    #[test]
    fn extraction_failure_skips_tree_but_continues() {
        if !have("tar") {
            return;
        }

        let farm = farm(FAKE_MAKE);
        seed_corrupt_source(&farm.config, "broken", "master");
        seed_source(&farm.config, "mainline", "master", "v6.9");
        let defconfig = seed_defconfig(
            farm.config.storage_root.parent().unwrap(),
            "arm",
            "defconfig",
            "# CONFIG_MODULES is not set\n",
        );

        let engine = BuildEngine::new(1, false).with_make(&farm.make);
        let target = resolve_target(&defconfig).unwrap();
        let summary = run(&farm.config, &engine, &target).unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, ["broken/master"]);
        // No install path was created for the tree that failed to extract.
        assert!(!farm.config.builds_root().join("broken").exists());
        assert!(farm
            .config
            .builds_root()
            .join("mainline/master/v6.9/arm/defconfig/build.log")
            .is_file());
    }

    #[test]
    fn failed_kernel_build_still_leaves_log_and_config() {
        if !have("tar") {
            return;
        }

        let farm = farm(FAILING_MAKE);
        seed_source(&farm.config, "mainline", "master", "v6.9");
        let defconfig = seed_defconfig(
            farm.config.storage_root.parent().unwrap(),
            "arm",
            "defconfig",
            "CONFIG_MODULES=y\n",
        );

        let engine = BuildEngine::new(1, false).with_make(&farm.make);
        let target = resolve_target(&defconfig).unwrap();
        let summary = run(&farm.config, &engine, &target).unwrap();

        assert_eq!(summary.failed, ["mainline/master"]);

        let install = farm
            .config
            .builds_root()
            .join("mainline/master/v6.9/arm/defconfig");
        assert!(install.join("kernel.config").is_file());
        let log = fs::read_to_string(install.join("build.log")).unwrap();
        assert!(log.contains("internal compiler error"));
        assert!(!install.join(MODULES_TARBALL).exists());

        let manifest: BuildManifest =
            serde_json::from_slice(&fs::read(install.join("build.json")).unwrap()).unwrap();
        assert!(!manifest.success);
        assert_eq!(manifest.kernel_exit, Some(1));
        assert_eq!(manifest.modules_exit, None);
    }
}
