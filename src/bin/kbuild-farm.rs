use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use kbuild_farm::build::{detect_jobs, BuildEngine};
use kbuild_farm::config::FarmConfig;
use kbuild_farm::{pipeline, preflight};

#[derive(Parser)]
#[command(
    name = "kbuild-farm",
    about = "Build kernel defconfigs and collect versioned artifacts"
)]
struct Cli {
    /// Path to the defconfig to build (must be a direct child of its arch
    /// directory)
    #[arg(short = 'd', long = "defconfig", value_name = "PATH")]
    defconfig: PathBuf,

    /// Farm configuration file (TOML); built-in defaults when omitted
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the make job count (default: processing units + 2)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,

    /// Verbose mode: let the build tool print its full output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Collected artifacts must be world-readable regardless of the caller's
    // umask.
    unsafe {
        libc::umask(0o022);
    }

    let cli = Cli::parse();
    let config = FarmConfig::load(cli.config.as_deref())?;

    preflight::check_host_tools()?;

    // Fails closed on an unknown architecture before any build work starts.
    let target = pipeline::resolve_target(&cli.defconfig)?;
    println!("defconfig: {}", target.name);
    println!("arch: {}", target.arch.name);
    println!("cross_compile: {}", target.arch.cross_compile.unwrap_or("(native)"));

    let jobs = cli.jobs.or(config.jobs).unwrap_or_else(detect_jobs);
    let engine = BuildEngine::new(jobs, cli.verbose);

    let summary = pipeline::run(&config, &engine, &target)?;
    println!(
        "{} build(s) attempted, {} succeeded, {} failed",
        summary.attempted,
        summary.succeeded(),
        summary.failed.len()
    );

    if !summary.all_ok() {
        bail!("failed targets: {}", summary.failed.join(", "));
    }
    Ok(())
}
