//! Cache read path
//!
//! Reads the backend, classifies the entry, validates the value and kicks
//! off background refreshes. Nothing in here ever fails a call: any problem
//! with the cached entry deletes it and reports [`CachedValue::Empty`], which
//! makes the orchestrator produce a fresh value instead.

use crate::cache::{CacheEntry, Freshness};
use crate::cachified::schedule_refresh;
use crate::context::Context;
use crate::error::{CachifiedError, Result};
use crate::producer::ValueCheck;
use crate::reporter::CacheEvent;
use std::fmt;
use tracing::{debug, warn};

/// Result of consulting the cache
///
/// Kept apart from `Option<V>` so that `None`-like values are cacheable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue<V> {
    /// A usable cached value
    Hit(V),

    /// Nothing usable in cache
    Empty,
}

/// Read the raw entry for the context's key, reporting the read
pub async fn fetch_entry<V, E>(context: &Context<V, E>) -> Result<Option<CacheEntry<V>>> {
    context.report(&CacheEvent::GetCachedValueStart);
    let cached = context.cache.get(&context.key).await?;
    context.report(&CacheEvent::GetCachedValueRead {
        entry: cached.as_ref(),
    });
    Ok(cached)
}

/// Answer the call from cache if possible.
///
/// Fresh entries are served as is. Stale entries, and expired entries when
/// the stale window is infinite, are served while a refresh runs in the
/// background. Invalid or unreadable entries are deleted.
pub async fn resolve_from_cache<V, E>(context: &Context<V, E>) -> CachedValue<V>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    match read_cached_value(context).await {
        Ok(value) => value,
        Err(error) => {
            context.report(&CacheEvent::GetCachedValueError { error: &error });
            delete_entry(context).await;
            CachedValue::Empty
        }
    }
}

async fn read_cached_value<V, E>(context: &Context<V, E>) -> Result<CachedValue<V>>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    let Some(entry) = fetch_entry(context).await? else {
        context.report(&CacheEvent::GetCachedValueEmpty);
        return Ok(CachedValue::Empty);
    };

    let freshness = entry.metadata.freshness(context.now());
    // An infinite stale window never blocks on a refresh, even past ttl + window
    let stale_refresh = freshness == Freshness::Stale
        || (freshness == Freshness::Expired && context.stale_while_revalidate.is_infinite());

    debug!(
        "Cached value for {} is {} (stale refresh: {})",
        context.key, freshness, stale_refresh
    );

    if freshness == Freshness::Expired {
        context.report(&CacheEvent::GetCachedValueOutdated { entry: &entry });
    }

    if stale_refresh {
        schedule_refresh(context);
    }

    if freshness == Freshness::Fresh || stale_refresh {
        match (context.check_value)(&entry.value) {
            ValueCheck::Valid => {
                context.report(&CacheEvent::GetCachedValueSuccess {
                    value: &entry.value,
                });
                if !stale_refresh {
                    context.get_fresh_value.notify_cache_hit();
                }
                return Ok(CachedValue::Hit(entry.value));
            }
            invalid => {
                context.report(&CacheEvent::CheckCachedValueError {
                    reason: invalid.reason().unwrap_or("unknown"),
                });
                delete_entry(context).await;
            }
        }
    }

    Ok(CachedValue::Empty)
}

/// Remove the context's key from the backend, logging failures
pub(crate) async fn delete_entry<V, E>(context: &Context<V, E>) {
    warn!("Deleting cache entry: {}", context.key);
    if let Err(error) = context.cache.delete(&context.key).await {
        warn!("Failed to delete cache entry {}: {}", context.key, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, CacheMetadata, Lifetime, MemoryCache};
    use crate::clock::{Clock, ManualClock};
    use crate::context::CachifiedOptions;
    use crate::producer::{check_value, FreshValue};
    use crate::reporter::{create_reporter, reporter};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Harness {
        cache: MemoryCache,
        clock: ManualClock,
        events: Arc<Mutex<Vec<&'static str>>>,
        cache_hits: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                cache: MemoryCache::new(),
                clock: ManualClock::default(),
                events: Arc::new(Mutex::new(Vec::new())),
                cache_hits: Arc::new(AtomicUsize::new(0)),
            }
        }

        async fn seed(&self, value: &str, ttl: Lifetime, swr: Lifetime) {
            let entry = CacheEntry::new(
                CacheMetadata::new(self.clock.now(), ttl, swr),
                value.to_string(),
            );
            Cache::<String>::set(&self.cache, "key", &entry).await.unwrap();
        }

        fn options(&self) -> CachifiedOptions<String, String> {
            let hits = self.cache_hits.clone();
            let events = self.events.clone();
            CachifiedOptions::new(
                "key",
                self.cache.clone(),
                FreshValue::from_fn(|| Ok("fresh".to_string())).on_cache_hit(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .clock(Arc::new(self.clock.clone()))
            .reporter(create_reporter(move |_context| {
                let events = events.clone();
                reporter(move |event| events.lock().unwrap().push(event.name()))
            }))
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_empty_cache() {
        let harness = Harness::new();
        let context = Context::new(harness.options());

        assert_eq!(resolve_from_cache(&context).await, CachedValue::Empty);
        assert_eq!(
            harness.events(),
            vec!["getCachedValueStart", "getCachedValueRead", "getCachedValueEmpty"]
        );
    }

    #[tokio::test]
    async fn test_fresh_hit_notifies_hook() {
        let harness = Harness::new();
        harness
            .seed("cached", Lifetime::from(Duration::from_millis(1000)), Lifetime::ZERO)
            .await;
        harness.clock.advance(Duration::from_millis(500));

        let context = Context::new(harness.options());
        assert_eq!(
            resolve_from_cache(&context).await,
            CachedValue::Hit("cached".to_string())
        );
        assert_eq!(harness.cache_hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            harness.events(),
            vec!["getCachedValueStart", "getCachedValueRead", "getCachedValueSuccess"]
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_outdated() {
        let harness = Harness::new();
        harness
            .seed("cached", Lifetime::from(Duration::from_millis(1000)), Lifetime::ZERO)
            .await;
        harness.clock.advance(Duration::from_millis(1500));

        let context = Context::new(harness.options());
        assert_eq!(resolve_from_cache(&context).await, CachedValue::Empty);
        assert!(harness.events().contains(&"getCachedValueOutdated"));
        assert_eq!(harness.cache_hits.load(Ordering::SeqCst), 0);

        // Expired entries are left for the fresh write to replace
        assert!(harness.cache.contains_key("key").await);
    }

    #[tokio::test]
    async fn test_stale_hit_does_not_notify_hook() {
        let harness = Harness::new();
        harness
            .seed(
                "cached",
                Lifetime::from(Duration::from_millis(1000)),
                Lifetime::from(Duration::from_millis(5000)),
            )
            .await;
        harness.clock.advance(Duration::from_millis(1500));

        let context = Context::new(
            harness
                .options()
                .stale_while_revalidate(Duration::from_millis(5000))
                .stale_refresh_timeout(Duration::from_secs(3600)),
        );
        assert_eq!(
            resolve_from_cache(&context).await,
            CachedValue::Hit("cached".to_string())
        );
        assert_eq!(harness.cache_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_cached_value_is_deleted() {
        let harness = Harness::new();
        harness.seed("x", Lifetime::Infinite, Lifetime::ZERO).await;

        let context = Context::new(
            harness
                .options()
                .check_value(check_value(|value: &String| value.len() > 1)),
        );
        assert_eq!(resolve_from_cache(&context).await, CachedValue::Empty);
        assert!(harness.events().contains(&"checkCachedValueError"));
        assert!(!harness.cache.contains_key("key").await);
    }

    #[tokio::test]
    async fn test_rejection_reason_is_reported() {
        let harness = Harness::new();
        harness.seed("x", Lifetime::Infinite, Lifetime::ZERO).await;

        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = reasons.clone();
        let context = Context::new(
            harness
                .options()
                .check_value(check_value(|_: &String| Err::<(), _>("too short".to_string())))
                .reporter(create_reporter(move |_context| {
                    let sink = sink.clone();
                    reporter(move |event| {
                        if let CacheEvent::CheckCachedValueError { reason } = event {
                            sink.lock().unwrap().push(reason.to_string());
                        }
                    })
                })),
        );

        resolve_from_cache(&context).await;
        assert_eq!(*reasons.lock().unwrap(), vec!["too short".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_deleted() {
        let harness = Harness::new();
        harness.cache.insert_raw("key", json!(["not", "an", "entry"])).await;

        let context = Context::new(harness.options());
        assert_eq!(resolve_from_cache(&context).await, CachedValue::Empty);
        assert_eq!(
            harness.events(),
            vec!["getCachedValueStart", "getCachedValueError"]
        );
        assert!(!harness.cache.contains_key("key").await);
    }

    #[test]
    fn test_cached_none_is_not_empty() {
        assert_ne!(CachedValue::Hit(None::<u32>), CachedValue::Empty);
    }
}
