//! Durable key-value store

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::{TimerState, TIMER_STATE_KEY};

/// Per-item size limit, matching browser sync storage
pub const DEFAULT_ITEM_QUOTA_BYTES: usize = 8192;

/// Most recent writes kept by `MemoryStore`
pub const WRITE_LOG_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("item '{key}' is {bytes} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        bytes: usize,
        quota: usize,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous, fallible key-value store shared by every popup mount
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StoreError>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Read the timer record, treating every failure as "no prior state"
pub async fn load_timer_state(store: &dyn KeyValueStore) -> Option<TimerState> {
    let value = match store.get(TIMER_STATE_KEY).await {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read timer state, using defaults: {}", e);
            return None;
        }
    };

    match serde_json::from_value(value) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Persisted timer state is unreadable, using defaults: {}", e);
            None
        }
    }
}

/// Store backed by a single JSON object file
///
/// The whole object is cached in memory and the file is replaced atomically
/// on every write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    item_quota_bytes: usize,
    items: tokio::sync::Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file is missing or corrupt
    pub async fn open(path: impl AsRef<Path>, item_quota_bytes: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let items = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(items) => {
                    info!("Opened store {} ({} items)", path.display(), items.len());
                    items
                }
                Err(e) => {
                    warn!("Store file {} is corrupt, starting empty: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store file {} does not exist yet, starting empty", path.display());
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            item_quota_bytes,
            items: tokio::sync::Mutex::new(items),
        })
    }

    async fn write_file(&self, items: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StoreError>> {
        async move { Ok(self.items.lock().await.get(key).cloned()) }.boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let bytes = key.len() + serde_json::to_vec(&value)?.len();
            if bytes > self.item_quota_bytes {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    bytes,
                    quota: self.item_quota_bytes,
                });
            }

            let mut items = self.items.lock().await;
            let previous = items.insert(key.to_string(), value);
            if let Err(e) = self.write_file(&items).await {
                // Keep the cache consistent with what is on disk
                match previous {
                    Some(previous) => items.insert(key.to_string(), previous),
                    None => items.remove(key),
                };
                return Err(e);
            }

            debug!("Stored '{}' ({} bytes)", key, bytes);
            Ok(())
        }
        .boxed()
    }
}

/// In-memory store with write accounting and failure injection
///
/// Only the last `WRITE_LOG_CAPACITY` writes are remembered, so the store can
/// back a long-running `--ephemeral` session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Value>>,
    writes: Mutex<VecDeque<(String, Value)>>,
    failures_remaining: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// The most recent successful writes, oldest first
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes
            .lock()
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Successful writes of one key
    pub fn writes_for(&self, key: &str) -> Vec<Value> {
        self.writes()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    /// Seed a value without counting it as a write
    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value);
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StoreError>> {
        let result = self
            .items
            .lock()
            .map(|items| items.get(key).cloned())
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock memory store: {}", e)));
        futures::future::ready(result).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        let result = (|| {
            let failing = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StoreError::Unavailable("injected write failure".to_string()));
            }

            self.items
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("Failed to lock memory store: {}", e)))?
                .insert(key.to_string(), value.clone());
            let mut writes = self
                .writes
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("Failed to lock write log: {}", e)))?;
            if writes.len() == WRITE_LOG_CAPACITY {
                writes.pop_front();
            }
            writes.push_back((key.to_string(), value));
            Ok(())
        })();
        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path, DEFAULT_ITEM_QUOTA_BYTES).await.unwrap();
        assert_eq!(store.get("theme").await.unwrap(), None);
        store.set("theme", json!("dark")).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path, DEFAULT_ITEM_QUOTA_BYTES).await.unwrap();
        assert_eq!(reopened.get("theme").await.unwrap(), Some(json!("dark")));
    }

    #[tokio::test]
    async fn file_store_rejects_oversized_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json"), 64).await.unwrap();

        let err = store.set("notes", json!("x".repeat(100))).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { quota: 64, .. }));
        assert_eq!(store.get("notes").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::open(&path, DEFAULT_ITEM_QUOTA_BYTES).await.unwrap();
        assert_eq!(store.get(TIMER_STATE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_timer_record_loads_as_none() {
        let store = MemoryStore::new();
        store.insert(TIMER_STATE_KEY, json!({ "timeLeftSeconds": "soon" }));
        assert_eq!(load_timer_state(&store).await, None);

        store.insert(TIMER_STATE_KEY, serde_json::to_value(TimerState::new()).unwrap());
        assert_eq!(load_timer_state(&store).await, Some(TimerState::new()));
    }

    #[tokio::test]
    async fn memory_store_injects_failures() {
        let store = MemoryStore::new();
        store.fail_next_writes(1);

        assert!(store.set("k", json!(1)).await.is_err());
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.writes_for("k"), vec![json!(2)]);
    }

    #[tokio::test]
    async fn memory_store_write_log_is_bounded() {
        let store = MemoryStore::new();
        for n in 0..WRITE_LOG_CAPACITY + 10 {
            store.set("k", json!(n)).await.unwrap();
        }

        let writes = store.writes_for("k");
        assert_eq!(writes.len(), WRITE_LOG_CAPACITY);
        assert_eq!(writes.first(), Some(&json!(10)));
        assert_eq!(writes.last(), Some(&json!(WRITE_LOG_CAPACITY + 9)));
        assert_eq!(store.get("k").await.unwrap(), Some(json!(WRITE_LOG_CAPACITY + 9)));
    }
}
