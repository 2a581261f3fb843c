//! # Cache Entries and Backends
//!
//! Everything the orchestrator needs to know about stored values lives here:
//! the `{ metadata, value }` entry layout, the freshness classification of an
//! entry, the [`Cache`] backend trait, and [`MemoryCache`], an in-process
//! backend that stores entries in their JSON form.
//!
//! ## Entry Layout
//!
//! Entries are stored as
//!
//! ```json
//! { "metadata": { "createdTime": 1700000000000, "ttl": 60000, "swv": null }, "value": "..." }
//! ```
//!
//! where `ttl` and `swv` (stale while revalidate) are milliseconds and `null`
//! means infinite.
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_cachified::cache::{Cache, CacheEntry, CacheMetadata, Freshness, Lifetime, MemoryCache};
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = MemoryCache::new();
//!
//! let metadata = CacheMetadata::new(Utc::now(), Lifetime::from(Duration::from_secs(60)), Lifetime::ZERO);
//! cache.set("greeting", &CacheEntry::new(metadata, "hello".to_string())).await?;
//!
//! let entry: Option<CacheEntry<String>> = cache.get("greeting").await?;
//! if let Some(entry) = entry {
//!     assert_eq!(entry.metadata.freshness(Utc::now()), Freshness::Fresh);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod entry;
pub mod freshness;
pub mod store;
pub mod types;

pub use backend::Cache;
pub use entry::{CacheEntry, CacheMetadata};
pub use freshness::Freshness;
pub use store::MemoryCache;
pub use types::{CacheKey, CacheStats, Lifetime};
