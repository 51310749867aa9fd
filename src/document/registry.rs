use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{Document, is_markdown_file};
use crate::error::{BridgeError, Result};
use crate::paths;

/// Open documents, keyed by absolute path.
///
/// Opening an already-open path returns the existing handle, so every view
/// of a file shares one buffer.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    open: Mutex<HashMap<PathBuf, Arc<Document>>>,
    next_id: AtomicU64,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path`, reading it from disk unless it is already open.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotMarkdown`] for non-markdown files and a read
    /// error if the file cannot be loaded.
    pub async fn open(&self, path: &Path) -> Result<Arc<Document>> {
        if !is_markdown_file(path) {
            return Err(BridgeError::NotMarkdown(path.to_path_buf()));
        }
        let key = Self::key(path)?;
        if let Some(doc) = self.get(&key) {
            return Ok(doc);
        }

        let text = tokio::fs::read_to_string(&key)
            .await
            .map_err(|source| BridgeError::Read {
                path: key.clone(),
                source,
            })?;

        let mut open = self.lock();
        // Another open may have raced us while the file was being read.
        let doc = open
            .entry(key.clone())
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %key.display(), id, "document opened");
                Arc::new(Document::new(id, key, &text))
            })
            .clone();
        Ok(doc)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Document>> {
        let key = Self::key(path).ok()?;
        self.lock().get(&key).cloned()
    }

    /// Close and forget `path`. Returns false if it was not open.
    pub fn close(&self, path: &Path) -> bool {
        let Ok(key) = Self::key(path) else {
            return false;
        };
        let removed = self.lock().remove(&key);
        removed.is_some_and(|doc| {
            doc.close();
            true
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(path: &Path) -> Result<PathBuf> {
        let absolute = std::path::absolute(path).map_err(|source| BridgeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(paths::normalize(&absolute))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<Document>>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_same_path_shares_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "# A").unwrap();
        let registry = DocumentRegistry::new();

        let first = registry.open(&path).await.unwrap();
        let second = registry.open(&dir.path().join(".").join("a.md")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.text().await, "# A");
    }

    #[tokio::test]
    async fn test_rejects_non_markdown() {
        let registry = DocumentRegistry::new();
        let err = registry.open(Path::new("main.rs")).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotMarkdown(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let registry = DocumentRegistry::new();
        let err = registry.open(&dir.path().join("gone.md")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Read { .. }));
    }

    #[tokio::test]
    async fn test_close_ends_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "").unwrap();
        let registry = DocumentRegistry::new();
        let doc = registry.open(&path).await.unwrap();

        assert!(registry.close(&path));
        assert!(doc.is_closed());
        assert!(registry.is_empty());
        assert!(!registry.close(&path));
    }
}
