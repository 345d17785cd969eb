//! Repository checkouts on disk: cloning, file selection, and size bookkeeping.

pub mod clone;
pub mod select;

use std::path::Path;
use walkdir::WalkDir;

pub use clone::{derive_repo_id, FetchError, GitCloner, RepoCloner, RepoFetcher};
pub use select::FileSelector;

/// Total size of all regular files under `dir`, in bytes. Unreadable entries count as zero.
pub fn dir_size_bytes(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Number of regular files under `dir`, VCS internals included.
pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Bytes to MiB, rounded to two decimals.
pub fn round_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}
