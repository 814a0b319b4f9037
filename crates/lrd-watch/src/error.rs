//! Watch errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while establishing change detection.
///
/// Both variants are startup failures; once a strategy is running, per-file
/// problems are logged and skipped rather than surfaced here.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The configured root does not exist or is not a directory.
    #[error("watch root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// The platform watcher could not be established.
    #[error("failed to start platform watcher: {0}")]
    Notify(#[from] notify::Error),
}
