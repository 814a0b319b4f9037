//! Change event type.

use std::path::PathBuf;

/// One file created or modified under the watched root.
///
/// Deletions are not reported: a browser reloading a page whose file vanished
/// gets a 404 on the next fetch, which is all a developer mid-edit needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path relative to the watched root.
    pub path: PathBuf,
}
