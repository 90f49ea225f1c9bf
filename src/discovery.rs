//! Discovery of buildable kernel source trees under the storage root.
//!
//! A source tree is any directory that directly contains the source bundle
//! `linux-src.tar.gz` together with a `last.git_describe` version marker.
//! Identity is derived from the directory layout: the bundle's parent is the
//! branch, the grandparent is the tree.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filename of the packed kernel source inside a branch directory.
pub const SOURCE_BUNDLE: &str = "linux-src.tar.gz";

/// Filename of the single-line version marker next to the bundle.
pub const VERSION_MARKER: &str = "last.git_describe";

/// One discovered source tree, immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    /// Tree name (grandparent directory of the bundle).
    pub tree: String,
    /// Branch name (parent directory of the bundle).
    pub branch: String,
    /// Path to `linux-src.tar.gz`.
    pub archive: PathBuf,
    /// Version string read from the marker file, trimmed.
    pub version: String,
}

impl SourceTree {
    /// Read a candidate directory that contains the source bundle.
    ///
    /// Returns an error when the version marker is missing or unreadable; a
    /// tree without a version cannot be addressed in storage.
    fn from_dir(dir: &Path) -> Result<Self> {
        let branch = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tree = dir
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let marker = dir.join(VERSION_MARKER);
        let version = fs::read_to_string(&marker)
            .with_context(|| format!("reading version marker '{}'", marker.display()))?
            .trim()
            .to_string();

        Ok(Self {
            tree,
            branch,
            archive: dir.join(SOURCE_BUNDLE),
            version,
        })
    }
}

/// Recursively scan `sources_root` for buildable source trees.
///
/// The walk is read-only and sorted by file name, so the build order is
/// deterministic across runs. Candidates without a readable version marker
/// are skipped with a warning rather than aborting the scan.
pub fn discover(sources_root: &Path) -> Vec<SourceTree> {
    let mut trees = Vec::new();

    for entry in WalkDir::new(sources_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        if !dir.join(SOURCE_BUNDLE).is_file() {
            continue;
        }

        match SourceTree::from_dir(dir) {
            Ok(tree) => trees.push(tree),
            Err(err) => eprintln!("[discover] skipping {}: {:#}", dir.display(), err),
        }
    }

    trees
}
