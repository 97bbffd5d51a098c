//! The Month Cache: verbatim trade list payloads keyed by month.
//!
//! An entry exists only for a month whose fetch succeeded. Entries are never expired or replaced;
//! the history of a closed month does not change.

use crate::model::MonthKey;
use crate::{utils, Result};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A write-once store of month payloads.
#[async_trait::async_trait]
pub trait MonthCache {
    /// The payload stored for `key`, or `None` if the month has never been stored.
    async fn get(&self, key: MonthKey) -> Result<Option<Value>>;

    /// Stores `payload` for `key` unless an entry already exists. Returns whether it was written.
    async fn put(&self, key: MonthKey, payload: &Value) -> Result<bool>;
}

/// Stores each month as `<root>/<year>/<MM>.json`.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The deterministic location of the entry for `key`.
    pub fn path(&self, key: MonthKey) -> PathBuf {
        self.root
            .join(key.year().to_string())
            .join(format!("{:02}.json", key.month()))
    }
}

#[async_trait::async_trait]
impl MonthCache for FileCache {
    async fn get(&self, key: MonthKey) -> Result<Option<Value>> {
        let path = self.path(key);
        if !utils::exists(&path).await? {
            return Ok(None);
        }
        let payload = utils::deserialize(&path)
            .await
            .with_context(|| format!("The cache entry for {key} is unreadable"))?;
        Ok(Some(payload))
    }

    async fn put(&self, key: MonthKey, payload: &Value) -> Result<bool> {
        let path = self.path(key);
        if utils::exists(&path).await? {
            debug!("Cache entry for {key} already exists, leaving it untouched");
            return Ok(false);
        }
        if let Some(dir) = path.parent() {
            utils::make_dir(dir).await?;
        }
        let json = serde_json::to_string_pretty(payload)
            .with_context(|| format!("Unable to serialize the payload for {key}"))?;
        utils::write_atomic(&path, json).await?;
        debug!("Cached {key} at {}", path.display());
        Ok(true)
    }
}

/// An in-memory cache. Clones share the same entries, so a test can keep a handle while a
/// collector owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<MonthKey, Value>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: MonthKey) -> bool {
        self.lock().contains_key(&key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MonthKey, Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl MonthCache for MemoryCache {
    async fn get(&self, key: MonthKey) -> Result<Option<Value>> {
        Ok(self.lock().get(&key).cloned())
    }

    async fn put(&self, key: MonthKey, payload: &Value) -> Result<bool> {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, payload.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn key(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    #[test]
    fn test_file_cache_layout() {
        let cache = FileCache::new("/tmp/cardstat/cache");
        assert_eq!(
            cache.path(key(2024, 3)),
            PathBuf::from("/tmp/cardstat/cache/2024/03.json")
        );
        assert_eq!(
            cache.path(key(2024, 11)),
            PathBuf::from("/tmp/cardstat/cache/2024/11.json")
        );
    }

    #[tokio::test]
    async fn test_file_cache_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        assert!(cache.get(key(2024, 3)).await.unwrap().is_none());

        let payload = json!({"success": true, "data": {"data": [{"mername": "天天餐厅"}]}});
        assert!(cache.put(key(2024, 3), &payload).await.unwrap());
        assert_eq!(cache.get(key(2024, 3)).await.unwrap(), Some(payload));
        assert!(cache.get(key(2024, 4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_is_write_once() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let first = json!({"success": true, "n": 1});
        let second = json!({"success": true, "n": 2});
        assert!(cache.put(key(2024, 1), &first).await.unwrap());
        assert!(!cache.put(key(2024, 1), &second).await.unwrap());
        assert_eq!(cache.get(key(2024, 1)).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_file_cache_corrupt_entry_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let path = cache.path(key(2024, 2));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(cache.get(key(2024, 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_cache_shares_entries_between_clones() {
        let cache = MemoryCache::new();
        let handle = cache.clone();
        assert!(cache.put(key(2024, 5), &json!({"a": 1})).await.unwrap());
        assert!(!cache.put(key(2024, 5), &json!({"a": 2})).await.unwrap());
        assert!(handle.contains(key(2024, 5)));
        assert_eq!(handle.len(), 1);
        assert_eq!(
            handle.get(key(2024, 5)).await.unwrap(),
            Some(json!({"a": 1}))
        );
    }
}
