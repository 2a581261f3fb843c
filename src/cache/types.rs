//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cache key type
pub type CacheKey = String;

/// A duration that may be unbounded.
///
/// Used for TTL, stale-while-revalidate windows and the maximum age of
/// fallback values. `Finite(Duration::ZERO)` is a real zero, not "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Bounded by the given duration
    Finite(Duration),

    /// Never runs out
    Infinite,
}

impl Lifetime {
    /// A zero-length lifetime
    pub const ZERO: Lifetime = Lifetime::Finite(Duration::ZERO);

    /// Whether this lifetime is unbounded
    pub fn is_infinite(&self) -> bool {
        matches!(self, Lifetime::Infinite)
    }

    /// Whether this lifetime is exactly zero
    pub fn is_zero(&self) -> bool {
        matches!(self, Lifetime::Finite(d) if d.is_zero())
    }

    /// The bounded duration, `None` when infinite
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Lifetime::Finite(d) => Some(*d),
            Lifetime::Infinite => None,
        }
    }

    /// Whether `age` is still covered by this lifetime (inclusive upper bound)
    pub fn covers(&self, age: Duration) -> bool {
        match self {
            Lifetime::Finite(d) => age <= *d,
            Lifetime::Infinite => true,
        }
    }
}

impl From<Duration> for Lifetime {
    fn from(duration: Duration) -> Self {
        Lifetime::Finite(duration)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Finite(d) => write!(f, "{}ms", d.as_millis()),
            Lifetime::Infinite => write!(f, "infinite"),
        }
    }
}

/// Statistics for monitoring an in-memory backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Total number of reads that found an entry
    pub hits: u64,

    /// Total number of reads that found nothing
    pub misses: u64,

    /// Number of entries written
    pub writes: u64,

    /// Number of delete calls that removed an entry
    pub deletes: u64,

    /// Number of entries currently in cache
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, miss_rate: {:.2}%, entries: {}, writes: {}, deletes: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.miss_rate(),
            self.entries,
            self.writes,
            self.deletes
        )
    }
}
