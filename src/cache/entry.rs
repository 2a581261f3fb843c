//! Cache entry and metadata with TTL support
//!
//! Entries are stored as `{ metadata, value }`. The metadata uses the same
//! JSON layout as other cachified implementations (`createdTime`, `ttl` and
//! `swv` in milliseconds) so entries can be shared through a common backend.

use crate::cache::freshness::Freshness;
use crate::cache::types::Lifetime;
use crate::error::{CachifiedError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata stamped on an entry when its value was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the value was produced
    #[serde(rename = "createdTime", with = "chrono::serde::ts_milliseconds")]
    pub created_time: DateTime<Utc>,

    /// How long the value is fresh, `None` for forever
    #[serde(default, with = "duration_millis")]
    pub ttl: Option<Duration>,

    /// How long after the TTL a stale value may still be served, `None` for forever
    #[serde(rename = "swv", default, with = "duration_millis")]
    pub stale_while_revalidate: Option<Duration>,
}

impl CacheMetadata {
    /// Create metadata for a value produced at `created_time`
    pub fn new(created_time: DateTime<Utc>, ttl: Lifetime, stale_while_revalidate: Lifetime) -> Self {
        Self {
            created_time,
            ttl: ttl.as_duration(),
            stale_while_revalidate: stale_while_revalidate.as_duration(),
        }
    }

    /// Get the age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_time)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Classify this metadata at `now`
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        Freshness::evaluate(self, now)
    }
}

/// A cached value together with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Entry metadata
    pub metadata: CacheMetadata,

    /// The cached value
    pub value: V,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry
    pub fn new(metadata: CacheMetadata, value: V) -> Self {
        Self { metadata, value }
    }

    /// Get the age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        self.metadata.age(now)
    }
}

impl<V: Serialize> CacheEntry<V> {
    /// Encode the entry in its stored JSON layout
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<V: DeserializeOwned> CacheEntry<V> {
    /// Decode an entry read from an untyped backend.
    ///
    /// Anything that is not an object carrying both `metadata` and `value`
    /// is rejected as [`CachifiedError::MalformedEntry`], as is a value that
    /// does not decode into `V`.
    pub fn from_json(key: &str, raw: serde_json::Value) -> Result<Self> {
        let shape_error = match raw.as_object() {
            None => Some(format!("expected an object, found {}", json_kind(&raw))),
            Some(object) => ["metadata", "value"]
                .iter()
                .find(|field| !object.contains_key(**field))
                .map(|field| format!("missing field `{}`", field)),
        };

        if let Some(reason) = shape_error {
            return Err(malformed(key, reason));
        }

        serde_json::from_value(raw).map_err(|e| malformed(key, e.to_string()))
    }
}

fn malformed(key: &str, reason: String) -> CachifiedError {
    CachifiedError::MalformedEntry {
        key: key.to_string(),
        reason,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Optional durations as (possibly fractional) milliseconds, `null` for forever
mod duration_millis {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(millis) = Option::<f64>::deserialize(deserializer)? else {
            return Ok(None);
        };
        Duration::try_from_secs_f64(millis.max(0.0) / 1000.0)
            .map(Some)
            .map_err(|e| <D::Error as Error>::custom(format!("invalid duration {}ms: {}", millis, e)))
    }
}
