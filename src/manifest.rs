//! Per-build summary written next to the collected artifacts.
//!
//! `build.json` records the build key, the defconfig input hash, and the
//! stage exit codes, so a storage consumer can tell a failed build from a
//! successful one without parsing `build.log`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the manifest file inside the install path.
pub const MANIFEST_FILE: &str = "build.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildManifest {
    pub tree: String,
    pub branch: String,
    pub version: String,
    pub arch: String,
    pub defconfig: String,
    /// sha256 of the defconfig fragment the build was seeded from.
    pub defconfig_sha256: String,
    /// Exit code of the kernel compile stage, if the process reported one.
    pub kernel_exit: Option<i32>,
    /// Exit code of the modules compile stage, if it was attempted.
    pub modules_exit: Option<i32>,
    pub modules_enabled: bool,
    pub success: bool,
    pub finished_at_unix: u64,
}

/// Write the manifest into `install_path`, overwriting any previous one.
pub fn write_manifest(install_path: &Path, manifest: &BuildManifest) -> Result<()> {
    let path = install_path.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(manifest).context("serializing build manifest")?;
    fs::write(&path, bytes)
        .with_context(|| format!("writing build manifest '{}'", path.display()))?;
    Ok(())
}

/// Streamed sha256 of a file, as a lowercase hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
