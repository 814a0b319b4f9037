//! Polling change detection.
//!
//! Walks the tree once at startup to record a baseline of modification
//! times, then re-walks on a fixed interval and reports every tracked file
//! that is new or newer than the recorded value. The map only grows:
//! deleted files keep their entry and simply stop matching anything.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use crate::event::ChangeEvent;
use crate::filter::is_ignored_name;

/// Fixed-interval tree walker.
pub(crate) struct PollingWatcher {
    root: PathBuf,
    seen: HashMap<PathBuf, SystemTime>,
}

impl PollingWatcher {
    /// Records the baseline without emitting events.
    pub(crate) fn new(root: PathBuf) -> Self {
        let mut entries = Vec::new();
        walk_tree(&root, &mut entries);

        let seen = entries.into_iter().collect();
        Self { root, seen }
    }

    /// One comparison pass over the tree.
    ///
    /// Emits an event for every tracked file that is absent from the
    /// baseline or whose modification time is strictly newer than the
    /// recorded one, updating the record as it goes.
    pub(crate) fn scan(&mut self) -> Vec<ChangeEvent> {
        let mut entries = Vec::new();
        walk_tree(&self.root, &mut entries);

        let mut events = Vec::new();
        for (path, mtime) in entries {
            let changed = match self.seen.get(&path) {
                Some(recorded) => mtime > *recorded,
                None => true,
            };
            if !changed {
                continue;
            }
            self.seen.insert(path.clone(), mtime);

            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            events.push(ChangeEvent {
                path: relative.to_path_buf(),
            });
        }
        events
    }

    /// Blocking scan loop; returns when the event receiver is dropped.
    ///
    /// Meant to be driven from `spawn_blocking` so the sleeps and the
    /// filesystem walks never touch an async worker thread. Closure of
    /// the channel is checked once per interval, so the loop ends even
    /// when no events are flowing.
    pub(crate) fn run(mut self, interval: Duration, tx: &mpsc::Sender<ChangeEvent>) {
        loop {
            std::thread::sleep(interval);
            if tx.is_closed() {
                return;
            }
            for event in self.scan() {
                tracing::debug!(path = %event.path.display(), "file changed");
                if tx.blocking_send(event).is_err() {
                    return;
                }
            }
        }
    }
}

/// Collect `(path, mtime)` for every non-skipped file under `dir`.
///
/// Directories are never tracked themselves but are always descended into.
/// Unreadable directories and entries whose metadata cannot be read are
/// skipped; one bad entry never stops the walk.
fn walk_tree(dir: &Path, entries: &mut Vec<(PathBuf, SystemTime)>) {
    let Ok(dir_entries) = fs::read_dir(dir) else {
        tracing::debug!(dir = %dir.display(), "skipping unreadable directory");
        return;
    };

    for entry in dir_entries.filter_map(Result::ok) {
        let path = entry.path();

        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            walk_tree(&path, entries);
            continue;
        }

        if is_ignored_name(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) else {
            tracing::debug!(path = %path.display(), "skipping entry without modification time");
            continue;
        };
        entries.push((path, mtime));
    }
}
