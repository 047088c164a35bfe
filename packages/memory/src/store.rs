// ABOUTME: Key/value memory store with optional expiry and best-effort disk snapshots
// ABOUTME: One JSON file per key under the storage root, loaded eagerly at startup

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to prepare storage directory: {0}")]
    Storage(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, MemoryError>;

struct Inner {
    cache: HashMap<String, Value>,
    expiry: HashMap<String, DateTime<Utc>>,
}

/// In-memory store with optional file persistence.
///
/// Writes happen synchronously on every `set`; a failed write is logged and
/// swallowed so callers are never blocked on disk health.
pub struct MemoryStore {
    storage_dir: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a store backed by a storage directory. Existing snapshot files
    /// are loaded eagerly; corrupt files are skipped.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = storage_dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut cache = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<Value>(&s).map_err(|e| e.to_string()))
            {
                Ok(value) => {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        // Restore the original key from the sanitized filename
                        cache.insert(stem.replace('_', ":"), value);
                    }
                }
                Err(e) => {
                    warn!("Skipping corrupt memory file {}: {}", path.display(), e);
                }
            }
        }

        debug!("Loaded {} memory entries from {}", cache.len(), dir.display());

        Ok(Self {
            storage_dir: Some(dir),
            inner: RwLock::new(Inner {
                cache,
                expiry: HashMap::new(),
            }),
        })
    }

    /// Create a purely in-memory store without disk snapshots.
    pub fn ephemeral() -> Self {
        Self {
            storage_dir: None,
            inner: RwLock::new(Inner {
                cache: HashMap::new(),
                expiry: HashMap::new(),
            }),
        }
    }

    /// Get a value. Expired keys are dropped lazily here.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let expired = {
            let inner = self.inner.read().await;
            match inner.expiry.get(key) {
                Some(deadline) => Utc::now() > *deadline,
                None => false,
            }
        };

        if expired {
            self.delete(key).await;
            return None;
        }

        self.inner.read().await.cache.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: Value) {
        self.set_inner(key, value, None).await;
    }

    pub async fn set_with_ttl(&self, key: &str, value: Value, ttl_seconds: i64) {
        self.set_inner(key, value, Some(ttl_seconds)).await;
    }

    async fn set_inner(&self, key: &str, value: Value, ttl_seconds: Option<i64>) {
        {
            let mut inner = self.inner.write().await;
            inner.cache.insert(key.to_string(), value.clone());
            match ttl_seconds {
                Some(secs) => {
                    inner
                        .expiry
                        .insert(key.to_string(), Utc::now() + Duration::seconds(secs));
                }
                None => {
                    inner.expiry.remove(key);
                }
            }
        }

        if let Some(path) = self.file_path(key) {
            let encoded = match serde_json::to_vec_pretty(&value) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to encode memory key {}: {}", key, e);
                    return;
                }
            };
            if let Err(e) = tokio::fs::write(&path, encoded).await {
                warn!("Failed to persist memory key {}: {}", key, e);
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        {
            let mut inner = self.inner.write().await;
            inner.cache.remove(key);
            inner.expiry.remove(key);
        }

        if let Some(path) = self.file_path(key) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove memory file for {}: {}", key, e);
                }
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// All keys, optionally filtered by substring.
    pub async fn keys(&self, filter: Option<&str>) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .cache
            .keys()
            .filter(|k| filter.map(|f| k.contains(f)).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.cache.clear();
            inner.expiry.clear();
        }

        if let Some(dir) = &self.storage_dir {
            if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            warn!("Failed to remove memory file {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        self.storage_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", safe_key(key))))
    }
}

/// Convert a key to a safe filename. Reserved characters are replaced.
fn safe_key(key: &str) -> String {
    key.replace([':', '/', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::ephemeral();
        store.set("alpha", json!({"n": 1})).await;
        assert_eq!(store.get("alpha").await, Some(json!({"n": 1})));
        assert_eq!(store.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::ephemeral();
        store.set_with_ttl("short", json!("v"), -1).await;
        assert_eq!(store.get("short").await, None);
        assert!(!store.exists("short").await);
    }

    #[tokio::test]
    async fn test_set_clears_previous_ttl() {
        let store = MemoryStore::ephemeral();
        store.set_with_ttl("k", json!(1), -1).await;
        store.set("k", json!(2)).await;
        assert_eq!(store.get("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_keys_filter() {
        let store = MemoryStore::ephemeral();
        store.set("conversation:a", json!([])).await;
        store.set("conversation:b", json!([])).await;
        store.set("other", json!([])).await;
        let mut keys = store.keys(Some("conversation")).await;
        keys.sort();
        assert_eq!(keys, vec!["conversation:a", "conversation:b"]);
        assert_eq!(store.keys(None).await.len(), 3);
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = MemoryStore::new(dir.path()).unwrap();
            store.set("conversation:abc", json!(["hello"])).await;
        }
        let reloaded = MemoryStore::new(dir.path()).unwrap();
        assert_eq!(
            reloaded.get("conversation:abc").await,
            Some(json!(["hello"]))
        );
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        assert_eq!(store.get("broken").await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        store.set("a", json!(1)).await;
        store.set("b", json!(2)).await;
        store.clear().await;
        assert!(store.keys(None).await.is_empty());
        let remaining = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(remaining, 0);
    }
}
