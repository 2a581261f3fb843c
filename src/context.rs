//! Caller options and the resolved per-call context
//!
//! [`CachifiedOptions`] is what a caller fills in; everything it leaves out
//! is defaulted exactly once, in [`Context::new`]. The resulting [`Context`]
//! is never mutated for the rest of the call.

use crate::cache::{Cache, CacheKey, CacheMetadata, Lifetime};
use crate::clock::{Clock, SystemClock};
use crate::producer::{accept_all, CheckValue, FreshValue};
use crate::reporter::{noop_reporter, CacheEvent, CreateReporter, Reporter, ReporterContext};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Whether, and how far, to fall back to a cached value when the fresh
/// value function fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackToCache {
    /// `true` accepts a cached value of any age, `false` disables fallback
    Enabled(bool),

    /// Accept cached values up to this age
    MaxAge(Duration),
}

impl FallbackToCache {
    /// The maximum acceptable fallback age; zero means disabled
    pub fn limit(&self) -> Lifetime {
        match self {
            FallbackToCache::Enabled(true) => Lifetime::Infinite,
            FallbackToCache::Enabled(false) => Lifetime::ZERO,
            FallbackToCache::MaxAge(max_age) => Lifetime::Finite(*max_age),
        }
    }
}

impl Default for FallbackToCache {
    fn default() -> Self {
        FallbackToCache::Enabled(true)
    }
}

impl From<bool> for FallbackToCache {
    fn from(enabled: bool) -> Self {
        FallbackToCache::Enabled(enabled)
    }
}

impl From<Duration> for FallbackToCache {
    fn from(max_age: Duration) -> Self {
        FallbackToCache::MaxAge(max_age)
    }
}

/// Options for a single [`crate::cachified`] call
///
/// # Example
///
/// ```no_run
/// use ouroboros_cachified::{cachified, CachifiedOptions, FreshValue, MemoryCache};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let cache = MemoryCache::new();
///
///     let options = CachifiedOptions::new(
///         "user:1",
///         cache.clone(),
///         FreshValue::new(|| async { Ok::<_, anyhow::Error>("Alice".to_string()) }),
///     )
///     .ttl(Duration::from_secs(60))
///     .stale_while_revalidate(Duration::from_secs(300));
///
///     let name: String = cachified(options).await?;
///     println!("{}", name);
///     Ok(())
/// }
/// ```
pub struct CachifiedOptions<V, E> {
    key: CacheKey,
    cache: Arc<dyn Cache<V>>,
    get_fresh_value: FreshValue<V, E>,
    ttl: Option<Lifetime>,
    stale_while_revalidate: Option<Lifetime>,
    check_value: Option<CheckValue<V>>,
    force_fresh: Option<bool>,
    fallback_to_cache: Option<FallbackToCache>,
    stale_refresh_timeout: Option<Duration>,
    reporter: Option<CreateReporter<V>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<V, E> CachifiedOptions<V, E> {
    /// Start from the three required settings
    pub fn new<C>(key: impl Into<CacheKey>, cache: C, get_fresh_value: FreshValue<V, E>) -> Self
    where
        C: Cache<V> + 'static,
    {
        Self::with_shared_cache(key, Arc::new(cache), get_fresh_value)
    }

    /// Start from a cache handle that is already shared
    pub fn with_shared_cache(
        key: impl Into<CacheKey>,
        cache: Arc<dyn Cache<V>>,
        get_fresh_value: FreshValue<V, E>,
    ) -> Self {
        Self {
            key: key.into(),
            cache,
            get_fresh_value,
            ttl: None,
            stale_while_revalidate: None,
            check_value: None,
            force_fresh: None,
            fallback_to_cache: None,
            stale_refresh_timeout: None,
            reporter: None,
            clock: None,
        }
    }

    /// How long a value stays fresh (default: forever)
    pub fn ttl(mut self, ttl: impl Into<Lifetime>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// How long past its TTL a stale value may be served while it is
    /// refreshed in the background (default: zero)
    pub fn stale_while_revalidate(mut self, window: impl Into<Lifetime>) -> Self {
        self.stale_while_revalidate = Some(window.into());
        self
    }

    /// Check applied to every cached and fresh value (default: accept all)
    pub fn check_value(mut self, check: CheckValue<V>) -> Self {
        self.check_value = Some(check);
        self
    }

    /// Skip reading the cache and always produce a fresh value (default: false)
    pub fn force_fresh(mut self, force: bool) -> Self {
        self.force_fresh = Some(force);
        self
    }

    /// Fallback behaviour when the fresh value function fails (default: any age)
    pub fn fallback_to_cache(mut self, fallback: impl Into<FallbackToCache>) -> Self {
        self.fallback_to_cache = Some(fallback.into());
        self
    }

    /// Delay before a background refresh starts (default: zero)
    pub fn stale_refresh_timeout(mut self, delay: Duration) -> Self {
        self.stale_refresh_timeout = Some(delay);
        self
    }

    /// Reporter factory receiving this call's events (default: none)
    pub fn reporter(mut self, reporter: CreateReporter<V>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Time source (default: [`SystemClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Fully resolved configuration of one call
pub struct Context<V, E> {
    pub key: CacheKey,
    pub cache: Arc<dyn Cache<V>>,
    pub get_fresh_value: FreshValue<V, E>,
    pub ttl: Lifetime,
    pub stale_while_revalidate: Lifetime,
    pub check_value: CheckValue<V>,
    pub force_fresh: bool,
    pub fallback_to_cache: Lifetime,
    pub stale_refresh_timeout: Duration,
    pub clock: Arc<dyn Clock>,
    /// Stamp for any value written during this call
    pub metadata: CacheMetadata,
    report: Reporter<V>,
}

impl<V: 'static, E> Context<V, E> {
    /// Resolve `options` against the defaults and stamp the metadata.
    ///
    /// The reporter factory, if any, is invoked here and only here.
    pub fn new(options: CachifiedOptions<V, E>) -> Self {
        let CachifiedOptions {
            key,
            cache,
            get_fresh_value,
            ttl,
            stale_while_revalidate,
            check_value,
            force_fresh,
            fallback_to_cache,
            stale_refresh_timeout,
            reporter,
            clock,
        } = options;

        let ttl = ttl.unwrap_or(Lifetime::Infinite);
        let stale_while_revalidate = stale_while_revalidate.unwrap_or(Lifetime::ZERO);
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metadata = CacheMetadata::new(clock.now(), ttl, stale_while_revalidate);

        let mut context = Self {
            key,
            cache,
            get_fresh_value,
            ttl,
            stale_while_revalidate,
            check_value: check_value.unwrap_or_else(accept_all),
            force_fresh: force_fresh.unwrap_or(false),
            fallback_to_cache: fallback_to_cache.unwrap_or_default().limit(),
            stale_refresh_timeout: stale_refresh_timeout.unwrap_or(Duration::ZERO),
            clock,
            metadata,
            report: noop_reporter(),
        };

        if let Some(create) = reporter {
            context.report = create(&context.reporter_context());
        }

        context
    }

    /// Options for a background refresh of this call's key: forced fresh,
    /// no fallback, no reporting, and a new metadata stamp once resolved
    pub fn refresh_options(&self) -> CachifiedOptions<V, E> {
        CachifiedOptions::with_shared_cache(
            self.key.clone(),
            self.cache.clone(),
            self.get_fresh_value.clone(),
        )
        .ttl(self.ttl)
        .stale_while_revalidate(self.stale_while_revalidate)
        .check_value(self.check_value.clone())
        .force_fresh(true)
        .fallback_to_cache(false)
        .stale_refresh_timeout(self.stale_refresh_timeout)
        .clock(self.clock.clone())
    }
}

impl<V, E> Context<V, E> {
    /// Send an event to this call's reporter
    pub fn report(&self, event: &CacheEvent<'_, V>) {
        (self.report)(event)
    }

    /// Handle to this call's reporter
    pub fn reporter(&self) -> Reporter<V> {
        self.report.clone()
    }

    /// The current time according to this call's clock
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    fn reporter_context(&self) -> ReporterContext<'_> {
        ReporterContext {
            key: &self.key,
            cache_name: self.cache.name(),
            ttl: self.ttl,
            stale_while_revalidate: self.stale_while_revalidate,
            force_fresh: self.force_fresh,
            fallback_to_cache: self.fallback_to_cache,
            stale_refresh_timeout: self.stale_refresh_timeout,
            metadata: &self.metadata,
        }
    }
}

impl<V, E> fmt::Debug for Context<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("key", &self.key)
            .field("cache", &self.cache.name())
            .field("ttl", &self.ttl)
            .field("stale_while_revalidate", &self.stale_while_revalidate)
            .field("force_fresh", &self.force_fresh)
            .field("fallback_to_cache", &self.fallback_to_cache)
            .field("stale_refresh_timeout", &self.stale_refresh_timeout)
            .field("metadata", &self.metadata)
            .finish()
    }
}
