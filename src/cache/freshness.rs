//! Freshness classification of cache entries

use crate::cache::entry::CacheMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a cached value relates to its TTL and stale window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Younger than the TTL, serve as is
    Fresh,

    /// Past the TTL but inside the stale window, serve and refresh in the background
    Stale,

    /// Past the TTL and the stale window, refresh now
    Expired,
}

impl Freshness {
    /// Classify `metadata` at `now`.
    ///
    /// The TTL boundary belongs to the stale side: an entry whose age equals
    /// its TTL is no longer fresh, and a TTL of zero is never fresh.
    pub fn evaluate(metadata: &CacheMetadata, now: DateTime<Utc>) -> Self {
        let Some(ttl) = metadata.ttl else {
            return Freshness::Fresh;
        };

        let age = metadata.age(now);
        if age < ttl {
            return Freshness::Fresh;
        }

        match metadata.stale_while_revalidate {
            None => Freshness::Stale,
            Some(window) if age < ttl.saturating_add(window) => Freshness::Stale,
            Some(_) => Freshness::Expired,
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fresh => write!(f, "fresh"),
            Freshness::Stale => write!(f, "stale"),
            Freshness::Expired => write!(f, "expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn created() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_000_000).unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        created() + chrono::Duration::milliseconds(millis)
    }

    fn metadata(ttl: Option<u64>, swr: Option<u64>) -> CacheMetadata {
        CacheMetadata {
            created_time: created(),
            ttl: ttl.map(Duration::from_millis),
            stale_while_revalidate: swr.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_no_ttl_is_always_fresh() {
        let meta = metadata(None, Some(0));
        for age in [0, 1, 1_000, 86_400_000, 10 * 365 * 86_400_000] {
            assert_eq!(Freshness::evaluate(&meta, at(age)), Freshness::Fresh);
        }
    }

    #[test]
    fn test_ttl_boundary_is_not_fresh() {
        let meta = metadata(Some(1000), Some(0));
        assert_eq!(Freshness::evaluate(&meta, at(999)), Freshness::Fresh);
        assert_ne!(Freshness::evaluate(&meta, at(1000)), Freshness::Fresh);
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let meta = metadata(Some(0), Some(0));
        assert_eq!(Freshness::evaluate(&meta, at(0)), Freshness::Expired);

        let meta = metadata(Some(0), Some(500));
        assert_eq!(Freshness::evaluate(&meta, at(0)), Freshness::Stale);
    }

    #[test]
    fn test_stale_window() {
        let meta = metadata(Some(1000), Some(5000));
        assert_eq!(Freshness::evaluate(&meta, at(500)), Freshness::Fresh);
        assert_eq!(Freshness::evaluate(&meta, at(1500)), Freshness::Stale);
        assert_eq!(Freshness::evaluate(&meta, at(5999)), Freshness::Stale);
        assert_eq!(Freshness::evaluate(&meta, at(6000)), Freshness::Expired);
        assert_eq!(Freshness::evaluate(&meta, at(60_000)), Freshness::Expired);
    }

    #[test]
    fn test_infinite_stale_window_never_expires() {
        let meta = metadata(Some(1000), None);
        assert_eq!(Freshness::evaluate(&meta, at(10_000)), Freshness::Stale);
        assert_eq!(Freshness::evaluate(&meta, at(i32::MAX as i64)), Freshness::Stale);
    }

    #[test]
    fn test_zero_stale_window_expires_at_ttl() {
        let meta = metadata(Some(1000), Some(0));
        assert_eq!(Freshness::evaluate(&meta, at(1500)), Freshness::Expired);
    }

    #[test]
    fn test_display() {
        assert_eq!(Freshness::Fresh.to_string(), "fresh");
        assert_eq!(Freshness::Stale.to_string(), "stale");
        assert_eq!(Freshness::Expired.to_string(), "expired");
    }
}
