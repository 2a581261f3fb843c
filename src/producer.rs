//! Fresh value producers and value checks

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type InvokeFn<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type CacheHitHook = Arc<dyn Fn() + Send + Sync>;

/// Describes how to produce a fresh value
///
/// Besides the producing function, a descriptor may carry an `on_cache_hit`
/// hook. The orchestrator calls it when a call was answered from a fresh
/// cache entry, so a request coalescer (see [`crate::batch::Batch`]) can stop
/// waiting for this producer.
pub struct FreshValue<V, E> {
    invoke: InvokeFn<V, E>,
    on_cache_hit: Option<CacheHitHook>,
}

impl<V, E> FreshValue<V, E> {
    /// Create a producer from an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: 'static,
        E: 'static,
    {
        Self {
            invoke: Arc::new(move || f().boxed()),
            on_cache_hit: None,
        }
    }

    /// Create a producer from a synchronous closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<V, E> + Send + Sync + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        Self {
            invoke: Arc::new(move || futures::future::ready(f()).boxed()),
            on_cache_hit: None,
        }
    }

    /// Attach a hook that fires when the call is answered from cache
    pub fn on_cache_hit<H>(mut self, hook: H) -> Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_cache_hit = Some(Arc::new(hook));
        self
    }

    /// Run the producer
    pub fn invoke(&self) -> BoxFuture<'static, Result<V, E>> {
        (self.invoke)()
    }

    /// Tell the producer it will not be needed for this call
    pub fn notify_cache_hit(&self) {
        if let Some(hook) = &self.on_cache_hit {
            hook();
        }
    }
}

impl<V, E> Clone for FreshValue<V, E> {
    fn clone(&self) -> Self {
        Self {
            invoke: self.invoke.clone(),
            on_cache_hit: self.on_cache_hit.clone(),
        }
    }
}

impl<V, E> fmt::Debug for FreshValue<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshValue")
            .field("on_cache_hit", &self.on_cache_hit.is_some())
            .finish()
    }
}

/// Outcome of checking a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueCheck {
    /// The value can be used
    Valid,

    /// The value must not be used, optionally with a reason
    Invalid(Option<String>),
}

impl ValueCheck {
    /// Whether the value passed
    pub fn is_valid(&self) -> bool {
        matches!(self, ValueCheck::Valid)
    }

    /// The rejection reason, `"unknown"` when none was given
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValueCheck::Valid => None,
            ValueCheck::Invalid(reason) => Some(reason.as_deref().unwrap_or("unknown")),
        }
    }
}

impl From<bool> for ValueCheck {
    fn from(valid: bool) -> Self {
        if valid {
            ValueCheck::Valid
        } else {
            ValueCheck::Invalid(None)
        }
    }
}

impl From<Result<(), String>> for ValueCheck {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => ValueCheck::Valid,
            Err(reason) => ValueCheck::Invalid(Some(reason)),
        }
    }
}

/// Predicate applied to every cached and fresh value
pub type CheckValue<V> = Arc<dyn Fn(&V) -> ValueCheck + Send + Sync>;

/// Wrap a closure as a [`CheckValue`]
///
/// The closure may return anything convertible into [`ValueCheck`], such
/// as a `bool` or a `Result<(), String>`.
pub fn check_value<V, F, R>(f: F) -> CheckValue<V>
where
    V: 'static,
    F: Fn(&V) -> R + Send + Sync + 'static,
    R: Into<ValueCheck>,
{
    Arc::new(move |value: &V| f(value).into())
}

/// A check that accepts every value
pub fn accept_all<V: 'static>() -> CheckValue<V> {
    Arc::new(|_: &V| ValueCheck::Valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_async_producer() {
        let producer: FreshValue<u32, String> = FreshValue::new(|| async { Ok(42) });
        assert_eq!(producer.invoke().await, Ok(42));
        producer.notify_cache_hit();
    }

    #[tokio::test]
    async fn test_sync_producer_runs_on_every_invoke() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let producer: FreshValue<usize, String> =
            FreshValue::from_fn(move || Ok(counter.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(producer.invoke().await, Ok(0));
        assert_eq!(producer.clone().invoke().await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_hit_hook() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let producer: FreshValue<u32, String> = FreshValue::from_fn(|| Ok(1)).on_cache_hit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        producer.notify_cache_hit();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_check_conversions() {
        assert!(ValueCheck::from(true).is_valid());
        assert_eq!(ValueCheck::from(false).reason(), Some("unknown"));
        assert_eq!(
            ValueCheck::from(Err::<(), _>("too short".to_string())).reason(),
            Some("too short")
        );
        assert_eq!(ValueCheck::Valid.reason(), None);
    }

    #[test]
    fn test_check_value_helpers() {
        let non_empty = check_value(|value: &String| !value.is_empty());
        assert!(non_empty(&"x".to_string()).is_valid());
        assert!(!non_empty(&String::new()).is_valid());

        let all = accept_all::<String>();
        assert!(all(&String::new()).is_valid());
    }
}
