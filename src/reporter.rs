//! Observation hooks for cachified calls
//!
//! Every call builds one [`Reporter`] from the caller's [`CreateReporter`]
//! factory and feeds it a [`CacheEvent`] at each decision point. Reporters
//! are purely observational: they cannot change the outcome of a call.

use crate::cache::{CacheEntry, CacheMetadata, Lifetime};
use crate::error::CachifiedError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Something that happened during a cachified call
#[derive(Debug)]
pub enum CacheEvent<'a, V> {
    /// About to read the backend
    GetCachedValueStart,

    /// The backend answered; `None` when nothing was stored
    GetCachedValueRead { entry: Option<&'a CacheEntry<V>> },

    /// Nothing stored under the key
    GetCachedValueEmpty,

    /// The stored entry is past its TTL and stale window
    GetCachedValueOutdated { entry: &'a CacheEntry<V> },

    /// The cached value was accepted
    GetCachedValueSuccess { value: &'a V },

    /// The cached value failed `check_value` and was deleted
    CheckCachedValueError { reason: &'a str },

    /// Reading or checking the cache failed; the entry was deleted
    GetCachedValueError { error: &'a CachifiedError },

    /// Calling the fresh value function
    GetFreshValueStart,

    /// The fresh value function returned a value
    GetFreshValueSuccess { value: &'a V },

    /// The fresh value failed `check_value`
    CheckFreshValueError { reason: &'a str },

    /// The fresh value function failed
    GetFreshValueError { error: String },

    /// A cached value was used because the fresh value function failed
    GetFreshValueCacheFallback { value: &'a V },

    /// The fresh value was written to the backend
    WriteFreshValueSuccess { metadata: &'a CacheMetadata },

    /// Writing the fresh value failed; the value is still returned
    WriteFreshValueError { error: &'a CachifiedError },

    /// A background refresh is starting
    RefreshValueStart,

    /// A background refresh stored a new value
    RefreshValueSuccess { value: &'a V },

    /// A background refresh failed
    RefreshValueError { error: String },

    /// The call resolved with a value
    Done { value: &'a V },

    /// The call failed
    Failed { error: String },
}

impl<V> CacheEvent<'_, V> {
    /// Stable event name, useful for logs and assertions
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::GetCachedValueStart => "getCachedValueStart",
            CacheEvent::GetCachedValueRead { .. } => "getCachedValueRead",
            CacheEvent::GetCachedValueEmpty => "getCachedValueEmpty",
            CacheEvent::GetCachedValueOutdated { .. } => "getCachedValueOutdated",
            CacheEvent::GetCachedValueSuccess { .. } => "getCachedValueSuccess",
            CacheEvent::CheckCachedValueError { .. } => "checkCachedValueError",
            CacheEvent::GetCachedValueError { .. } => "getCachedValueError",
            CacheEvent::GetFreshValueStart => "getFreshValueStart",
            CacheEvent::GetFreshValueSuccess { .. } => "getFreshValueSuccess",
            CacheEvent::CheckFreshValueError { .. } => "checkFreshValueError",
            CacheEvent::GetFreshValueError { .. } => "getFreshValueError",
            CacheEvent::GetFreshValueCacheFallback { .. } => "getFreshValueCacheFallback",
            CacheEvent::WriteFreshValueSuccess { .. } => "writeFreshValueSuccess",
            CacheEvent::WriteFreshValueError { .. } => "writeFreshValueError",
            CacheEvent::RefreshValueStart => "refreshValueStart",
            CacheEvent::RefreshValueSuccess { .. } => "refreshValueSuccess",
            CacheEvent::RefreshValueError { .. } => "refreshValueError",
            CacheEvent::Done { .. } => "done",
            CacheEvent::Failed { .. } => "failed",
        }
    }
}

/// Resolved settings of a call, handed to a reporter factory
#[derive(Debug, Clone)]
pub struct ReporterContext<'a> {
    pub key: &'a str,
    pub cache_name: &'a str,
    pub ttl: Lifetime,
    pub stale_while_revalidate: Lifetime,
    pub force_fresh: bool,
    pub fallback_to_cache: Lifetime,
    pub stale_refresh_timeout: Duration,
    pub metadata: &'a CacheMetadata,
}

/// Receives the events of one call
pub type Reporter<V> = Arc<dyn Fn(&CacheEvent<'_, V>) + Send + Sync>;

/// Builds a [`Reporter`] once per call
pub type CreateReporter<V> = Arc<dyn Fn(&ReporterContext<'_>) -> Reporter<V> + Send + Sync>;

/// Wrap a closure as a [`Reporter`]
pub fn reporter<V, F>(f: F) -> Reporter<V>
where
    F: Fn(&CacheEvent<'_, V>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`CreateReporter`]
pub fn create_reporter<V, F>(f: F) -> CreateReporter<V>
where
    F: Fn(&ReporterContext<'_>) -> Reporter<V> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A reporter that ignores everything
pub fn noop_reporter<V: 'static>() -> Reporter<V> {
    reporter(|_event| {})
}

/// Combine several reporter factories; every event reaches all of them in order
pub fn merge_reporters<V: 'static>(factories: Vec<CreateReporter<V>>) -> CreateReporter<V> {
    create_reporter(move |context| {
        let reporters: Vec<Reporter<V>> = factories.iter().map(|factory| factory(context)).collect();
        reporter(move |event| {
            for report in &reporters {
                report(event);
            }
        })
    })
}

/// Reporter factory that turns cache events into `tracing` records.
///
/// Problems (rejected values, failing fresh value functions, backend
/// errors) are logged at `warn`, cache updates and fallbacks at `info`, the
/// rest at `debug` and `trace`.
pub fn tracing_reporter<V: 'static>() -> CreateReporter<V> {
    create_reporter(|context| {
        let key = context.key.to_string();
        let cache_name = context.cache_name.to_string();
        let ttl = context.ttl;
        let started = Instant::now();

        reporter(move |event| match event {
            CacheEvent::GetCachedValueError { error } => {
                warn!(
                    "Error with cached value in {} for key {}, deleting the cache key: {}",
                    cache_name, key, error
                );
            }
            CacheEvent::CheckCachedValueError { reason } => {
                warn!(
                    "Invalid cached value in {} for key {}, deleting the cache key: {}",
                    cache_name, key, reason
                );
            }
            CacheEvent::GetCachedValueOutdated { entry } => {
                info!(
                    "Cached value in {} for key {} is outdated (created {})",
                    cache_name, key, entry.metadata.created_time
                );
            }
            CacheEvent::GetFreshValueError { error } => {
                warn!("Getting a fresh value for key {} failed: {}", key, error);
            }
            CacheEvent::CheckFreshValueError { reason } => {
                warn!("Fresh value for key {} failed validation: {}", key, reason);
            }
            CacheEvent::GetFreshValueCacheFallback { .. } => {
                info!(
                    "Falling back to cached value in {} for key {}",
                    cache_name, key
                );
            }
            CacheEvent::WriteFreshValueSuccess { .. } => {
                if ttl.is_zero() {
                    info!(
                        "Wrote value for key {} to {} with a zero TTL, it will not be served fresh",
                        key, cache_name
                    );
                } else {
                    info!(
                        "Updated the cache value for key {} in {} after {}ms",
                        key,
                        cache_name,
                        started.elapsed().as_millis()
                    );
                }
            }
            CacheEvent::WriteFreshValueError { error } => {
                warn!(
                    "Failed to write fresh value for key {} to {}: {}",
                    key, cache_name, error
                );
            }
            CacheEvent::RefreshValueSuccess { .. } => {
                info!("Background refresh for key {} succeeded", key);
            }
            CacheEvent::RefreshValueError { error } => {
                warn!("Background refresh for key {} failed: {}", key, error);
            }
            CacheEvent::Failed { error } => {
                debug!(
                    "Call for key {} failed after {}ms: {}",
                    key,
                    started.elapsed().as_millis(),
                    error
                );
            }
            other => {
                trace!("{} for key {}", other.name(), key);
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn metadata() -> CacheMetadata {
        CacheMetadata::new(Utc::now(), Lifetime::Infinite, Lifetime::ZERO)
    }

    fn context(metadata: &CacheMetadata) -> ReporterContext<'_> {
        ReporterContext {
            key: "key",
            cache_name: "memory",
            ttl: Lifetime::Infinite,
            stale_while_revalidate: Lifetime::ZERO,
            force_fresh: false,
            fallback_to_cache: Lifetime::Infinite,
            stale_refresh_timeout: Duration::ZERO,
            metadata,
        }
    }

    fn recording(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> CreateReporter<u32> {
        create_reporter(move |_context| {
            let log = log.clone();
            reporter(move |event| {
                log.lock().unwrap().push(format!("{}:{}", tag, event.name()));
            })
        })
    }

    #[test]
    fn test_event_names() {
        let value = 7u32;
        assert_eq!(CacheEvent::<u32>::GetCachedValueStart.name(), "getCachedValueStart");
        assert_eq!(CacheEvent::Done { value: &value }.name(), "done");
        let rejected: CacheEvent<'_, u32> = CacheEvent::CheckCachedValueError { reason: "unknown" };
        assert_eq!(rejected.name(), "checkCachedValueError");
    }

    #[test]
    fn test_merge_reporters_calls_all_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let merged = merge_reporters(vec![
            recording(log.clone(), "a"),
            recording(log.clone(), "b"),
        ]);

        let metadata = metadata();
        let report = merged(&context(&metadata));
        report(&CacheEvent::GetCachedValueStart);
        report(&CacheEvent::GetCachedValueEmpty);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:getCachedValueStart",
                "b:getCachedValueStart",
                "a:getCachedValueEmpty",
                "b:getCachedValueEmpty",
            ]
        );
    }

    #[test]
    fn test_tracing_reporter_handles_every_event() {
        let metadata = metadata();
        let report = tracing_reporter::<u32>()(&context(&metadata));
        let value = 1u32;
        let entry = CacheEntry::new(metadata.clone(), value);
        let error = CachifiedError::Backend("down".to_string());

        report(&CacheEvent::GetCachedValueStart);
        report(&CacheEvent::GetCachedValueRead { entry: Some(&entry) });
        report(&CacheEvent::GetCachedValueOutdated { entry: &entry });
        report(&CacheEvent::GetCachedValueError { error: &error });
        report(&CacheEvent::WriteFreshValueSuccess { metadata: &metadata });
        report(&CacheEvent::RefreshValueError {
            error: "boom".to_string(),
        });
        report(&CacheEvent::Done { value: &value });
    }

    #[test]
    fn test_noop_reporter() {
        let report = noop_reporter::<u32>();
        report(&CacheEvent::GetFreshValueStart);
    }
}
