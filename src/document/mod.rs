//! Host document adapter.
//!
//! This module handles:
//! - Owning the authoritative text of each open markdown file
//! - Applying whole-buffer replacement edits
//! - Fanning every change out to subscribed sessions, in order
//! - Reloading from and saving to disk

mod buffer;
mod registry;

pub use buffer::DocumentBuffer;
pub use registry::DocumentRegistry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{BridgeError, Result};
use crate::session::SessionId;

/// Markdown file extensions the bridge will open.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd", "mkdn"];

/// Returns true if the file extension is a recognized markdown format.
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub type DocumentId = u64;

/// Who caused a document change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOrigin {
    /// Disk reload or any other change made outside a session.
    External,
    /// An edit applied on behalf of a session's surface.
    Session(SessionId),
}

/// One committed change, carrying the full new content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub version: u64,
    pub origin: EditOrigin,
    pub content: String,
}

#[derive(Debug)]
struct DocumentState {
    buffer: DocumentBuffer,
    version: u64,
    /// What the file held when last loaded or saved by us.
    on_disk: String,
}

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    senders: Vec<(u64, UnboundedSender<DocumentChange>)>,
}

/// A shared handle to one open host document.
///
/// Several sessions may hold the same handle when the same file is open in
/// more than one view.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    path: PathBuf,
    state: tokio::sync::Mutex<DocumentState>,
    subscribers: Mutex<Subscribers>,
    closed: AtomicBool,
}

impl Document {
    pub(crate) fn new(id: DocumentId, path: PathBuf, text: &str) -> Self {
        Self {
            id,
            path,
            state: tokio::sync::Mutex::new(DocumentState {
                buffer: DocumentBuffer::from_text(text),
                version: 0,
                on_disk: text.to_string(),
            }),
            subscribers: Mutex::new(Subscribers::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name shown in view titles.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn text(&self) -> String {
        self.state.lock().await.buffer.text()
    }

    /// Version and content, read together.
    pub async fn snapshot(&self) -> (u64, String) {
        let state = self.state.lock().await;
        (state.version, state.buffer.text())
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.buffer.is_dirty()
    }

    /// Subscribe to every change committed after this call.
    ///
    /// The stream ends when the document is closed. Dropping the
    /// [`Subscription`] unsubscribes.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = lock(&self.subscribers);
        let id = subs.next_id;
        subs.next_id += 1;
        if !self.is_closed() {
            subs.senders.push((id, tx));
        }
        Subscription {
            id,
            rx,
            document: Arc::downgrade(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).senders.len()
    }

    fn unsubscribe(&self, id: u64) {
        lock(&self.subscribers).senders.retain(|(sub, _)| *sub != id);
    }

    /// Replace the entire content with `text`.
    ///
    /// Returns `Ok(false)` when the content was already identical and no
    /// change was published.
    ///
    /// # Errors
    /// Returns [`BridgeError::DocumentClosed`] once the document has been closed.
    pub async fn replace_all(&self, origin: EditOrigin, text: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(BridgeError::DocumentClosed(self.path.clone()));
        }
        if !state.buffer.replace_all(text) {
            return Ok(false);
        }
        state.version += 1;
        let change = DocumentChange {
            version: state.version,
            origin,
            content: text.to_string(),
        };
        tracing::debug!(
            id = self.id,
            path = %self.path.display(),
            version = change.version,
            origin = ?origin,
            "document changed"
        );
        self.publish(&change);
        Ok(true)
    }

    /// Pick up changes made to the file by other programs.
    ///
    /// A file still holding what we last loaded or saved is not a change,
    /// even when the buffer has moved on since. Otherwise disk wins over
    /// unsaved edits. Returns whether the content changed.
    ///
    /// # Errors
    /// Returns an error if the document is closed or the file cannot be read.
    pub async fn reload_from_disk(&self) -> Result<bool> {
        let disk = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| BridgeError::Read {
                path: self.path.clone(),
                source,
            })?;
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(BridgeError::DocumentClosed(self.path.clone()));
        }
        if disk == state.on_disk {
            return Ok(false);
        }
        if state.buffer.content_eq(&disk) {
            state.on_disk = disk;
            return Ok(false);
        }
        if state.buffer.is_dirty() {
            tracing::warn!(path = %self.path.display(), "file changed on disk, discarding unsaved edits");
        }
        state.buffer.replace_all(&disk);
        state.buffer.mark_clean();
        state.version += 1;
        state.on_disk.clone_from(&disk);
        let change = DocumentChange {
            version: state.version,
            origin: EditOrigin::External,
            content: disk,
        };
        self.publish(&change);
        Ok(true)
    }

    /// Write the buffer to its file and mark it clean.
    ///
    /// # Errors
    /// Returns an error if the document is closed or the file cannot be written.
    pub async fn save(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(BridgeError::DocumentClosed(self.path.clone()));
        }
        let text = state.buffer.text();
        tokio::fs::write(&self.path, &text)
            .await
            .map_err(|source| BridgeError::Write {
                path: self.path.clone(),
                source,
            })?;
        state.buffer.mark_clean();
        state.on_disk = text;
        tracing::info!(path = %self.path.display(), "document saved");
        Ok(())
    }

    /// Close the document. Every subscription stream ends.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.subscribers).senders.clear();
        tracing::debug!(path = %self.path.display(), "document closed");
    }

    fn publish(&self, change: &DocumentChange) {
        let subs = lock(&self.subscribers);
        for (_, tx) in &subs.senders {
            // A closed receiver belongs to a subscription being dropped.
            let _ = tx.send(change.clone());
        }
    }
}

fn lock(subscribers: &Mutex<Subscribers>) -> std::sync::MutexGuard<'_, Subscribers> {
    match subscribers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A session's ordered stream of document changes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: UnboundedReceiver<DocumentChange>,
    document: Weak<Document>,
}

impl Subscription {
    /// Wait for the next change. `None` once the document is closed.
    pub async fn recv(&mut self) -> Option<DocumentChange> {
        self.rx.recv().await
    }

    /// Take a change that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<DocumentChange> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(document) = self.document.upgrade() {
            document.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(text: &str) -> Arc<Document> {
        Arc::new(Document::new(1, PathBuf::from("/proj/a.md"), text))
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file(Path::new("README.md")));
        assert!(is_markdown_file(Path::new("notes.MARKDOWN")));
        assert!(!is_markdown_file(Path::new("main.rs")));
        assert!(!is_markdown_file(Path::new("Makefile")));
    }

    #[tokio::test]
    async fn test_changes_reach_every_subscriber_in_order() {
        let doc = doc("");
        let mut a = doc.subscribe();
        let mut b = doc.subscribe();

        for text in ["one", "two", "three"] {
            doc.replace_all(EditOrigin::External, text).await.unwrap();
        }

        for sub in [&mut a, &mut b] {
            let seen: Vec<_> = std::iter::from_fn(|| sub.try_recv())
                .map(|c| (c.version, c.content))
                .collect();
            assert_eq!(
                seen,
                vec![
                    (1, "one".to_string()),
                    (2, "two".to_string()),
                    (3, "three".to_string())
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_identical_replace_publishes_nothing() {
        let doc = doc("same");
        let mut sub = doc.subscribe();
        assert!(!doc.replace_all(EditOrigin::External, "same").await.unwrap());
        assert!(sub.try_recv().is_none());
        assert!(!doc.is_dirty().await);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let doc = doc("");
        let sub = doc.subscribe();
        assert_eq!(doc.subscriber_count(), 1);
        drop(sub);
        assert_eq!(doc.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_rejects_edits() {
        let doc = doc("x");
        let mut sub = doc.subscribe();
        doc.close();
        assert!(sub.recv().await.is_none());
        assert!(matches!(
            doc.replace_all(EditOrigin::External, "y").await,
            Err(BridgeError::DocumentClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_save_writes_file_and_clears_dirty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "old").unwrap();
        let doc = Arc::new(Document::new(1, path.clone(), "old"));

        doc.replace_all(EditOrigin::External, "new").await.unwrap();
        assert!(doc.is_dirty().await);
        doc.save().await.unwrap();

        assert!(!doc.is_dirty().await);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_reload_from_disk_publishes_external_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "before").unwrap();
        let doc = Arc::new(Document::new(1, path.clone(), "before"));
        let mut sub = doc.subscribe();

        assert!(!doc.reload_from_disk().await.unwrap());
        std::fs::write(&path, "after").unwrap();
        assert!(doc.reload_from_disk().await.unwrap());

        let change = sub.try_recv().unwrap();
        assert_eq!(change.origin, EditOrigin::External);
        assert_eq!(change.content, "after");
        assert!(!doc.is_dirty().await);
    }

    #[tokio::test]
    async fn test_reload_after_own_save_keeps_later_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "before").unwrap();
        let doc = Arc::new(Document::new(1, path.clone(), "before"));

        doc.replace_all(EditOrigin::Session(1), "saved").await.unwrap();
        doc.save().await.unwrap();
        doc.replace_all(EditOrigin::Session(1), "saved plus more typing")
            .await
            .unwrap();
        let mut sub = doc.subscribe();

        assert!(!doc.reload_from_disk().await.unwrap());
        assert_eq!(doc.text().await, "saved plus more typing");
        assert!(doc.is_dirty().await);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_foreign_write_after_edit_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "before").unwrap();
        let doc = Arc::new(Document::new(1, path.clone(), "before"));

        doc.replace_all(EditOrigin::Session(1), "typing").await.unwrap();
        std::fs::write(&path, "from elsewhere").unwrap();

        assert!(doc.reload_from_disk().await.unwrap());
        assert_eq!(doc.text().await, "from elsewhere");
        assert!(!doc.is_dirty().await);
        // The same content on disk again is not a second change.
        assert!(!doc.reload_from_disk().await.unwrap());
    }
}
