//! Architecture table: cross-toolchain prefixes and kernel image names.
//!
//! Adding an architecture is a data change here, not a code change anywhere
//! else: the table carries both the `CROSS_COMPILE` prefix and the image
//! basenames the collector looks for under `arch/<name>/boot`. Architectures
//! not listed fail closed with [`FarmError::UnknownArchitecture`] before any
//! build work starts.

use crate::error::FarmError;

/// Toolchain and artifact description for one target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchSpec {
    /// Architecture name as the kernel build system knows it (`ARCH=`).
    pub name: &'static str,
    /// Cross-compile prefix, or `None` for natively-compilable targets.
    pub cross_compile: Option<&'static str>,
    /// Kernel image basenames produced under `arch/<name>/boot`.
    pub image_patterns: &'static [&'static str],
}

/// Every architecture the farm knows how to build.
pub const KNOWN_ARCHES: &[ArchSpec] = &[
    ArchSpec {
        name: "arm",
        cross_compile: Some("arm-linux-gnueabihf-"),
        image_patterns: &["zImage", "xipImage"],
    },
    ArchSpec {
        name: "arm64",
        cross_compile: Some("aarch64-linux-gnu-"),
        image_patterns: &["Image"],
    },
    ArchSpec {
        name: "mips",
        cross_compile: Some("mips-linux-gnu-"),
        image_patterns: &["bzImage"],
    },
    ArchSpec {
        name: "i386",
        cross_compile: None,
        image_patterns: &["bzImage"],
    },
    ArchSpec {
        name: "x86",
        cross_compile: None,
        image_patterns: &["bzImage"],
    },
    ArchSpec {
        name: "x86_64",
        cross_compile: None,
        image_patterns: &["bzImage"],
    },
];

impl ArchSpec {
    /// Name of the `strip` binary for this toolchain, e.g.
    /// `arm-linux-gnueabihf-strip` or plain `strip` for native targets.
    pub fn strip_binary(&self) -> String {
        format!("{}strip", self.cross_compile.unwrap_or(""))
    }
}

/// Look up an architecture by name.
///
/// Fails closed: anything not in [`KNOWN_ARCHES`] is an error, so a
/// misconfigured target is detected before extraction or compilation.
pub fn resolve(name: &str) -> Result<&'static ArchSpec, FarmError> {
    KNOWN_ARCHES
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| FarmError::UnknownArchitecture {
            name: name.to_string(),
            known: KNOWN_ARCHES
                .iter()
                .map(|spec| spec.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}
