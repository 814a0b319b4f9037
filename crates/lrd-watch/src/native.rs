//! Event-driven change detection via the platform watcher.
//!
//! Bridges `notify` callbacks (which run on the watcher's own thread) into
//! the tokio channel the consumer reads from. Create and modify
//! notifications become events; everything else is dropped. Watcher errors
//! reported mid-stream are logged and the subscription keeps running.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::event::ChangeEvent;
use crate::filter::is_ignored_name;

/// Subscribe to native notifications on `root`, recursively.
///
/// The returned watcher must stay alive for the subscription to keep
/// delivering; dropping it silently stops the stream.
pub(crate) fn spawn(
    root: &Path,
    tx: mpsc::Sender<ChangeEvent>,
) -> Result<RecommendedWatcher, notify::Error> {
    let watch_root = root.to_path_buf();

    let mut watcher =
        notify::recommended_watcher(move |result: Result<Event, notify::Error>| match result {
            Ok(event) => forward_event(&event, &watch_root, &tx),
            Err(error) => tracing::warn!(%error, "watch notification error"),
        })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    Ok(watcher)
}

/// Turn one raw notification into zero or more change events.
fn forward_event(event: &Event, root: &Path, tx: &mpsc::Sender<ChangeEvent>) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if path.is_dir() {
            continue;
        }
        let ignored = path
            .file_name()
            .is_none_or(|name| is_ignored_name(&name.to_string_lossy()));
        if ignored {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };

        tracing::debug!(path = %relative.display(), "file changed");
        // The callback runs on the notify thread, so a blocking send is
        // safe; a closed channel just means the consumer went away.
        let _ = tx.blocking_send(ChangeEvent {
            path: relative.to_path_buf(),
        });
    }
}
