//! # Ouroboros Cachified (ouroboros-cachified)
//!
//! A cache-aside control layer for Rust: wrap any async value computation with
//! TTL expiry, stale-while-revalidate, validation and fallback-to-cache on
//! errors, on top of a pluggable cache backend.
//!
//! ## Features
//!
//! - TTL and stale-while-revalidate freshness, judged against an injectable clock
//! - Background refresh of stale values without blocking the caller
//! - Value validation with self-healing deletion of bad cache entries
//! - Fallback to older cached values when the fresh value function fails
//! - Event reporting with a ready-made `tracing` reporter
//! - Request coalescing through [`Batch`]
//!
//! ## Basic Usage
//!
//! ```no_run
//! use ouroboros_cachified::{cachified, CachifiedOptions, FreshValue, MemoryCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = MemoryCache::new();
//!
//!     let options = CachifiedOptions::new(
//!         "weather:berlin",
//!         cache.clone(),
//!         FreshValue::new(|| async { Ok::<_, anyhow::Error>(21.5f64) }),
//!     )
//!     .ttl(Duration::from_secs(60));
//!
//!     let temperature = cachified(options).await?;
//!     println!("Temperature: {}", temperature);
//!     Ok(())
//! }
//! ```
//!
//! ## Stale While Revalidate
//!
//! With a stale window, values past their TTL are still served while a
//! background task refreshes them.
//!
//! ```no_run
//! use ouroboros_cachified::{cachified, tracing_reporter, CachifiedOptions, FreshValue, MemoryCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = MemoryCache::new();
//!
//!     let options = CachifiedOptions::new(
//!         "config",
//!         cache.clone(),
//!         FreshValue::new(|| async { Ok::<_, anyhow::Error>(vec!["feature-a".to_string()]) }),
//!     )
//!     .ttl(Duration::from_secs(60))
//!     .stale_while_revalidate(Duration::from_secs(600))
//!     .reporter(tracing_reporter());
//!
//!     let flags = cachified(options).await?;
//!     println!("Enabled flags: {:?}", flags);
//!     Ok(())
//! }
//! ```
//!
//! ## Validation and Fallback
//!
//! ```no_run
//! use ouroboros_cachified::{cachified, check_value, CachifiedOptions, FreshValue, MemoryCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = MemoryCache::new();
//!
//!     let options = CachifiedOptions::new(
//!         "exchange-rate",
//!         cache.clone(),
//!         FreshValue::new(|| async { Ok::<_, anyhow::Error>(1.08f64) }),
//!     )
//!     .ttl(Duration::from_secs(30))
//!     .check_value(check_value(|rate: &f64| *rate > 0.0))
//!     // Serve a cached rate up to an hour old if the source is down
//!     .fallback_to_cache(Duration::from_secs(3600));
//!
//!     let rate = cachified(options).await?;
//!     println!("Rate: {}", rate);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod cachified;
pub mod clock;
pub mod context;
pub mod error;
pub mod lookup;
pub mod producer;
pub mod reporter;

// Re-export main types for convenience
pub use batch::Batch;
pub use cache::{
    Cache, CacheEntry, CacheKey, CacheMetadata, CacheStats, Freshness, Lifetime, MemoryCache,
};
pub use cachified::cachified;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{CachifiedOptions, Context, FallbackToCache};
pub use error::{CachifiedError, Result};
pub use lookup::CachedValue;
pub use producer::{accept_all, check_value, CheckValue, FreshValue, ValueCheck};
pub use reporter::{
    create_reporter, merge_reporters, noop_reporter, reporter, tracing_reporter, CacheEvent,
    CreateReporter, Reporter, ReporterContext,
};
