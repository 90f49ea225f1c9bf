//! Multi-stage kernel build driver.
//!
//! For one (source tree, target) pair the engine runs, in order: extract the
//! source bundle, seed `.config` from the caller's defconfig, `make
//! olddefconfig` to resolve a complete configuration, `make` for the kernel
//! itself, and `make modules` when the kernel stage succeeded and the
//! resolved config enables module support. Every make invocation is a
//! blocking subprocess with its combined stdout/stderr appended to
//! `build.log` in the workspace output directory.
//!
//! Compile failures are not errors: they are recorded in [`BuildOutcome`] so
//! that artifact collection still runs and failed builds stay diagnosable.
//! Only extraction failure aborts a target.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::arch::ArchSpec;
use crate::discovery::SourceTree;
use crate::error::FarmError;
use crate::workspace::Workspace;

/// Exit statuses of the attempted build stages.
#[derive(Debug, Clone, Copy)]
pub struct BuildOutcome {
    /// Exit status of the kernel compile stage.
    pub kernel_status: ExitStatus,
    /// Exit status of the modules compile stage, if it was attempted.
    pub modules_status: Option<ExitStatus>,
    /// Whether the resolved configuration enables module support.
    pub modules_enabled: bool,
}

impl BuildOutcome {
    /// True when every attempted stage exited successfully.
    pub fn success(&self) -> bool {
        self.kernel_status.success()
            && self.modules_status.map(|status| status.success()).unwrap_or(true)
    }

    /// True when the modules stage ran and succeeded, i.e. there is a module
    /// tree worth packaging.
    pub fn modules_built(&self) -> bool {
        self.modules_enabled
            && self.modules_status.map(|status| status.success()).unwrap_or(false)
    }
}

/// Number of make jobs: detected processing units plus two, or 1 when the
/// unit count cannot be determined.
pub fn detect_jobs() -> usize {
    match thread::available_parallelism() {
        Ok(count) => count.get() + 2,
        Err(_) => 1,
    }
}

/// Drives the external archive and build tools for one build at a time.
#[derive(Debug, Clone)]
pub struct BuildEngine {
    make: PathBuf,
    tar: PathBuf,
    jobs: usize,
    verbose: bool,
}

impl BuildEngine {
    pub fn new(jobs: usize, verbose: bool) -> Self {
        Self {
            make: PathBuf::from("make"),
            tar: PathBuf::from("tar"),
            jobs,
            verbose,
        }
    }

    /// Use a different build tool binary (also used by tests to substitute a
    /// stub for `make`).
    pub fn with_make(mut self, make: impl Into<PathBuf>) -> Self {
        self.make = make.into();
        self
    }

    /// Use a different archive tool binary.
    pub fn with_tar(mut self, tar: impl Into<PathBuf>) -> Self {
        self.tar = tar.into();
        self
    }

    /// The external archiver, shared with module packaging.
    pub fn tar(&self) -> &Path {
        &self.tar
    }

    /// Run the configure/build/modules-build stages for one source tree.
    ///
    /// Returns `Err` only for failures that abort the target: extraction
    /// failure or an inability to run the external tools at all. Stage exit
    /// codes, success or not, come back in the [`BuildOutcome`].
    pub fn build(
        &self,
        source: &SourceTree,
        arch: &ArchSpec,
        defconfig: &Path,
        workspace: &Workspace,
    ) -> Result<BuildOutcome> {
        workspace.ensure()?;
        self.extract(source, workspace)?;

        let kconfig = workspace.kconfig_file();
        fs::copy(defconfig, &kconfig).with_context(|| {
            format!(
                "seeding '{}' from defconfig '{}'",
                kconfig.display(),
                defconfig.display()
            )
        })?;

        let log_path = workspace.build_log();
        let mut log = File::create(&log_path)
            .with_context(|| format!("creating build log '{}'", log_path.display()))?;

        // Best-effort normalization: a non-zero exit here is not a build
        // failure, the compile stage will surface any real problem.
        let _ = self.do_make(arch, Some("olddefconfig"), workspace, &mut log)?;

        let kernel_status = self.do_make(arch, None, workspace, &mut log)?;

        let mut modules_enabled = false;
        let mut modules_status = None;
        if kernel_status.success() {
            modules_enabled = config_enables_modules(&kconfig)?;
            if modules_enabled {
                modules_status = Some(self.do_make(arch, Some("modules"), workspace, &mut log)?);
            }
        }

        Ok(BuildOutcome {
            kernel_status,
            modules_status,
            modules_enabled,
        })
    }

    /// Populate `staging` with stripped modules via `make modules_install`.
    ///
    /// Installation parameters travel on the child process environment only;
    /// the farm's own environment is never mutated.
    pub fn install_modules(
        &self,
        arch: &ArchSpec,
        workspace: &Workspace,
        staging: &Path,
    ) -> Result<ExitStatus> {
        let args = make_args(
            self.jobs,
            self.verbose,
            arch,
            &workspace.output_dir(),
            Some("modules_install"),
        );
        Command::new(&self.make)
            .args(&args)
            .current_dir(workspace.build_dir())
            .stdin(Stdio::null())
            .env("INSTALL_MOD_PATH", staging)
            .env("INSTALL_MOD_STRIP", "1")
            .env("STRIP", arch.strip_binary())
            .status()
            .with_context(|| format!("running '{} modules_install'", self.make.display()))
    }

    fn extract(&self, source: &SourceTree, workspace: &Workspace) -> Result<()> {
        let status = Command::new(&self.tar)
            .arg("xf")
            .arg(&source.archive)
            .current_dir(workspace.build_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .with_context(|| {
                format!(
                    "running '{} xf {}'",
                    self.tar.display(),
                    source.archive.display()
                )
            })?;

        if !status.success() {
            return Err(FarmError::ExtractionFailed {
                archive: source.archive.clone(),
                status,
            }
            .into());
        }
        Ok(())
    }

    /// Run one make invocation with combined output appended to `log`.
    ///
    /// stdin is closed so any interactive prompt receives the default answer
    /// instead of hanging the farm.
    fn do_make(
        &self,
        arch: &ArchSpec,
        target: Option<&str>,
        workspace: &Workspace,
        log: &mut File,
    ) -> Result<ExitStatus> {
        let args = make_args(self.jobs, self.verbose, arch, &workspace.output_dir(), target);
        let rendered = format!("{} {}", self.make.display(), args.join(" "));
        writeln!(log, "#\n# {rendered}\n#")
            .with_context(|| format!("writing build log header for '{rendered}'"))?;

        let stdout = log.try_clone().context("duplicating build log handle")?;
        let stderr = log.try_clone().context("duplicating build log handle")?;

        Command::new(&self.make)
            .args(&args)
            .current_dir(workspace.build_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .with_context(|| format!("running '{rendered}'"))
    }
}

/// Argument list for one make invocation.
fn make_args(
    jobs: usize,
    verbose: bool,
    arch: &ArchSpec,
    output_dir: &Path,
    target: Option<&str>,
) -> Vec<String> {
    let mut args = vec![format!("-j{jobs}"), "-k".to_string()];
    if !verbose {
        args.push("-s".to_string());
    }
    args.push(format!("ARCH={}", arch.name));
    if let Some(prefix) = arch.cross_compile {
        args.push(format!("CROSS_COMPILE={prefix}"));
    }
    args.push(format!("O={}", output_dir.display()));
    if let Some(target) = target {
        args.push(target.to_string());
    }
    args
}

/// Whether the resolved configuration enables loadable module support.
fn config_enables_modules(kconfig: &Path) -> Result<bool> {
    let config = fs::read_to_string(kconfig)
        .with_context(|| format!("reading resolved config '{}'", kconfig.display()))?;
    Ok(config.lines().any(|line| line.trim() == "CONFIG_MODULES=y"))
}
