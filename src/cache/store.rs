//! In-memory cache backend
//!
//! Entries are kept in their JSON layout, so a single `MemoryCache` can hold
//! values of different types and reads go through the same shape check a
//! remote backend would need.

use crate::cache::{
    backend::Cache,
    entry::CacheEntry,
    types::{CacheKey, CacheStats},
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Shared in-memory cache backend
///
/// Cloning is cheap and every clone sees the same entries. There is no
/// eviction: entries stay until they are deleted, overwritten or cleared.
#[derive(Clone, Default)]
pub struct MemoryCache {
    /// Internal storage
    store: Arc<RwLock<CacheStore>>,
}

/// Internal cache storage
#[derive(Default)]
struct CacheStore {
    /// Main storage: key -> encoded entry
    entries: HashMap<CacheKey, serde_json::Value>,

    /// Current cache statistics
    stats: CacheStats,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw JSON under `key` without any checks.
    ///
    /// Handy for seeding entries written by another process, or for
    /// planting corrupted data.
    pub async fn insert_raw(&self, key: impl Into<CacheKey>, raw: serde_json::Value) {
        let key = key.into();
        let mut store = self.store.write().await;
        debug!("Inserting raw cache entry: {}", key);
        store.entries.insert(key, raw);
        store.stats.entries = store.entries.len();
    }

    /// Get the raw JSON stored under `key` (does not count as a hit or miss)
    pub async fn get_raw(&self, key: &str) -> Option<serde_json::Value> {
        let store = self.store.read().await;
        store.entries.get(key).cloned()
    }

    /// Check if a key exists in the cache
    pub async fn contains_key(&self, key: &str) -> bool {
        let store = self.store.read().await;
        store.entries.contains_key(key)
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.entries.is_empty()
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) {
        let mut store = self.store.write().await;

        let count = store.entries.len();
        store.entries.clear();
        store.stats.entries = 0;

        info!("Cleared {} entries from cache", count);
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        store.stats.clone()
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        let raw = {
            let mut store = self.store.write().await;
            match store.entries.get(key).cloned() {
                Some(raw) => {
                    store.stats.hits += 1;
                    raw
                }
                None => {
                    debug!("Cache miss: {}", key);
                    store.stats.misses += 1;
                    return Ok(None);
                }
            }
        };

        debug!("Cache hit: {}", key);
        CacheEntry::from_json(key, raw).map(Some)
    }

    async fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<()> {
        let raw = entry.to_json()?;

        let mut store = self.store.write().await;
        if store.entries.insert(key.to_string(), raw).is_some() {
            debug!("Updating existing cache entry: {}", key);
        } else {
            debug!("Inserting new cache entry: {}", key);
        }
        store.stats.writes += 1;
        store.stats.entries = store.entries.len();

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.write().await;

        if store.entries.remove(key).is_some() {
            store.stats.deletes += 1;
            store.stats.entries = store.entries.len();
            debug!("Removed cache entry: {}", key);
        }

        Ok(())
    }
}
