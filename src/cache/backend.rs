//! Cache backend trait
//!
//! The orchestration layer never stores anything itself. Every read, write
//! and delete goes through a caller-supplied [`Cache`] implementation.

use crate::cache::entry::CacheEntry;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations own persisted entries. They must answer `Ok(None)` for
/// keys that were never set, and should surface undecodable data as
/// [`crate::CachifiedError::MalformedEntry`] so the read path can drop it.
#[async_trait]
pub trait Cache<V>: Send + Sync {
    /// Human readable backend name, used in logs
    fn name(&self) -> &str {
        "unknown"
    }

    /// Read the entry stored under `key`
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>>;

    /// Store `entry` under `key`, replacing whatever was there
    async fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<()>;

    /// Remove the entry stored under `key`
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<V, C> Cache<V> for Arc<C>
where
    V: Send + Sync + 'static,
    C: Cache<V> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<()> {
        (**self).set(key, entry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}
