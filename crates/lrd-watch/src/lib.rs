//! Filesystem change detection for the lrd livereload server.
//!
//! Watches a document root and emits one [`ChangeEvent`] per created or
//! modified file, with hidden files, editor lock files, and backup files
//! filtered out. Two strategies are available:
//!
//! - **native**: the platform notification mechanism via the `notify` crate
//!   (inotify, FSEvents, ReadDirectoryChangesW).
//! - **polling**: a recursive tree walk on a fixed interval comparing
//!   modification times.
//!
//! [`WatchMode::Auto`] prefers the native strategy and falls back to polling
//! with a warning when the platform watcher cannot be constructed. Events
//! arrive on a bounded channel; dropping the receiver stops detection.

mod error;
mod event;
mod filter;
mod native;
mod poll;

pub use error::WatchError;
pub use event::ChangeEvent;

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

/// Events buffered between the detector and its consumer.
const EVENT_BUFFER_SIZE: usize = 256;

/// Default pause between polling walks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Detection strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Native notifications when available, polling otherwise.
    #[default]
    Auto,
    /// Platform watcher only; a construction failure is fatal.
    Native,
    /// Fixed-interval tree walks only.
    Poll,
}

/// Keeps the selected strategy alive.
///
/// Hold this for the server lifetime: dropping it stops a native
/// subscription.
pub struct WatcherHandle {
    strategy: &'static str,
    _watcher: Option<RecommendedWatcher>,
}

impl WatcherHandle {
    /// Strategy name for logs and startup output.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy
    }
}

/// Start change detection on `root`.
///
/// Validates the root, records the polling baseline where needed, and spawns
/// the detection task. Returns the keepalive handle together with the
/// receiving end of the event stream.
///
/// # Errors
///
/// Returns an error if the root is not a directory, or, in
/// [`WatchMode::Native`], if the platform subscription cannot be
/// established.
pub fn spawn_watcher(
    root: &Path,
    mode: WatchMode,
    poll_interval: Duration,
) -> Result<(WatcherHandle, mpsc::Receiver<ChangeEvent>), WatchError> {
    let root = root
        .canonicalize()
        .map_err(|_| WatchError::InvalidRoot(root.to_path_buf()))?;
    if !root.is_dir() {
        return Err(WatchError::InvalidRoot(root));
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);

    let handle = match mode {
        WatchMode::Native => native_handle(native::spawn(&root, tx)?),
        WatchMode::Poll => poll_handle(root.clone(), poll_interval, tx),
        WatchMode::Auto => match native::spawn(&root, tx.clone()) {
            Ok(watcher) => native_handle(watcher),
            Err(error) => {
                tracing::warn!(%error, "platform watcher unavailable, falling back to polling");
                poll_handle(root.clone(), poll_interval, tx)
            }
        },
    };
    tracing::debug!(
        root = %root.display(),
        strategy = handle.strategy_name(),
        "change detection started"
    );

    Ok((handle, rx))
}

fn native_handle(watcher: RecommendedWatcher) -> WatcherHandle {
    WatcherHandle {
        strategy: "native",
        _watcher: Some(watcher),
    }
}

fn poll_handle(root: PathBuf, interval: Duration, tx: mpsc::Sender<ChangeEvent>) -> WatcherHandle {
    let watcher = poll::PollingWatcher::new(root);
    tokio::task::spawn_blocking(move || watcher.run(interval, &tx));

    WatcherHandle {
        strategy: "polling",
        _watcher: None,
    }
}
