//! Process-wide user preference storage.
//!
//! Sessions receive the store as an `Arc<dyn PreferenceStore>` and read it
//! freshly on every init. Writes replace a key's value wholesale; there is no
//! merging between concurrent writers.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Key under which the surface's editor options are persisted.
pub const OPTIONS_KEY: &str = "markbridge.options";

/// Key-value storage shared by every session in the process.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if a persistent backend cannot write its state.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Mark keys whose values should follow the user across devices.
    fn set_keys_for_sync(&self, keys: &[&str]);

    fn keys_for_sync(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    values: BTreeMap<String, Value>,
    #[serde(default)]
    sync_keys: BTreeSet<String>,
}

fn lock(state: &Mutex<StoreState>) -> std::sync::MutexGuard<'_, StoreState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory store. Used by tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.state).values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        lock(&self.state).values.insert(key.to_string(), value);
        Ok(())
    }

    fn set_keys_for_sync(&self, keys: &[&str]) {
        lock(&self.state).sync_keys = keys.iter().map(|k| (*k).to_string()).collect();
    }

    fn keys_for_sync(&self) -> Vec<String> {
        lock(&self.state).sync_keys.iter().cloned().collect()
    }
}

/// JSON file backed store. The whole file is rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| BridgeError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw)?
        } else {
            StoreState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let raw = serde_json::to_string_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BridgeError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, raw).map_err(|source| BridgeError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.state).values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = lock(&self.state);
        state.values.insert(key.to_string(), value);
        self.persist(&state)
    }

    fn set_keys_for_sync(&self, keys: &[&str]) {
        let mut state = lock(&self.state);
        state.sync_keys = keys.iter().map(|k| (*k).to_string()).collect();
        if let Err(err) = self.persist(&state) {
            tracing::warn!(path = %self.path.display(), %err, "failed to persist sync keys");
        }
    }

    fn keys_for_sync(&self) -> Vec<String> {
        lock(&self.state).sync_keys.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_set_replaces_wholesale() {
        let store = MemoryStore::new();
        store.set(OPTIONS_KEY, json!({ "a": 1, "b": 2 })).unwrap();
        store.set(OPTIONS_KEY, json!({ "c": 3 })).unwrap();
        assert_eq!(store.get(OPTIONS_KEY), Some(json!({ "c": 3 })));
    }

    #[test]
    fn test_memory_store_missing_key_is_none() {
        assert!(MemoryStore::new().get("nope").is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set_keys_for_sync(&[OPTIONS_KEY]);
        store.set(OPTIONS_KEY, json!({ "mode": "ir" })).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(OPTIONS_KEY), Some(json!({ "mode": "ir" })));
        assert_eq!(reopened.keys_for_sync(), vec![OPTIONS_KEY.to_string()]);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(BridgeError::Json(_))));
    }
}
