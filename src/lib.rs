//! Sequential kernel build farm.
//!
//! Builds a kernel source tree for an (architecture, defconfig) target and
//! collects the binary artifacts into a deterministic, version-addressed
//! storage layout:
//!
//! ```text
//! storage/builds/<tree>/<branch>/<version>/<arch>/<defconfig>/
//!     kernel.config     resolved configuration
//!     build.log         captured make output
//!     System.map        symbol map (when produced)
//!     zImage|Image|...  kernel image(s), per-architecture names
//!     dtbs/             device-tree blobs, vendor grouping preserved
//!     modules.tar.xz    stripped modules (when built)
//!     build.json        build manifest
//! ```
//!
//! The pipeline is strictly sequential: source trees are discovered under
//! `storage/sources`, built one after another, and each build runs
//! extract → configure → compile kernel → compile modules → collect →
//! package. Parallelism exists only inside the external build tool
//! (`make -j`). Failures are local to one tree; the farm keeps going and
//! reports a combined status at the end.

pub mod arch;
pub mod artifact;
pub mod build;
pub mod config;
pub mod discovery;
pub mod error;
pub mod install;
pub mod manifest;
pub mod pipeline;
pub mod preflight;
pub mod workspace;

pub use arch::{ArchSpec, KNOWN_ARCHES};
pub use build::{BuildEngine, BuildOutcome};
pub use config::FarmConfig;
pub use discovery::SourceTree;
pub use error::FarmError;
pub use pipeline::{BuildTarget, RunSummary};
pub use workspace::Workspace;
