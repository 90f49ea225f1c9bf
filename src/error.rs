//! Error taxonomy for the build pipeline.
//!
//! Only failures that short-circuit work are modeled as errors. Non-zero
//! exits from the kernel or modules compile stages are *recorded* in a
//! [`crate::build::BuildOutcome`] instead, because artifact collection must
//! still run for failed builds.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FarmError {
    /// Architecture name not present in the static toolchain table.
    /// Raised before any extraction or build work starts.
    #[error("unknown architecture '{name}' (known: {known})")]
    UnknownArchitecture { name: String, known: String },

    /// The external archive tool returned non-zero while unpacking a source
    /// bundle. Local to one (tree, target) pair: no install path is created
    /// and the pipeline moves on to the next source tree.
    #[error("extracting '{}' failed with {status}", archive.display())]
    ExtractionFailed { archive: PathBuf, status: ExitStatus },

    /// A required input (e.g. the defconfig itself) is missing.
    #[error("required input missing: {}", .0.display())]
    MissingInput(PathBuf),
}
