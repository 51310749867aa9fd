//! Disk change detection for open documents.
//!
//! Uses notify crate for cross-platform file system events. Events are
//! debounced, then the document is reloaded; the reload itself decides
//! whether anything changed, so our own saves do not bounce back.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::document::Document;
use crate::paths;

/// Watches a single file and reports debounced change notifications.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    folder: PathBuf,
    target: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl FileWatcher {
    /// Watch `path`. Its parent folder is watched so editors that save by
    /// rename are still seen.
    ///
    /// # Errors
    /// Returns an error if the file watcher cannot be created or the path cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // OS events carry canonical paths.
        let target = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target.file_name().map(std::ffi::OsStr::to_os_string);
        let folder = paths::parent_dir(&target);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&folder, RecursiveMode::NonRecursive)?;
        tracing::debug!(target = %target.display(), "watching file");

        Ok(Self {
            _watcher: watcher,
            rx,
            folder,
            target,
            target_name,
            debounce,
            pending_since: None,
        })
    }

    /// Drain queued events; true once a change has been quiet for the debounce window.
    pub fn take_change_ready(&mut self) -> bool {
        let mut relevant = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(ev) => tracing::trace!(kind = ?ev.kind, paths = ?ev.paths, "irrelevant event"),
                Err(err) => tracing::warn!(%err, "watch error"),
            }
        }
        if relevant > 0 {
            tracing::trace!(relevant, target = %self.target.display(), "file events");
            self.pending_since = Some(Instant::now());
        }

        match self.pending_since {
            Some(since) if since.elapsed() >= self.debounce => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.folder
                || path == &self.target
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

/// Reload `document` whenever its file changes on disk, until it is closed.
pub async fn follow_disk(document: Arc<Document>, mut watcher: FileWatcher, poll: Duration) {
    let mut ticker = tokio::time::interval(poll);
    while !document.is_closed() {
        ticker.tick().await;
        if !watcher.take_change_ready() {
            continue;
        }
        match document.reload_from_disk().await {
            Ok(true) => tracing::info!(path = %document.path().display(), "reloaded from disk"),
            Ok(false) => {}
            Err(err) => tracing::warn!(path = %document.path().display(), %err, "reload failed"),
        }
    }
}
