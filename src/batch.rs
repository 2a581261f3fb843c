//! Request coalescing for fresh value functions
//!
//! A [`Batch`] hands out one [`FreshValue`] per requested parameter. Each
//! producer either gets invoked (the call missed the cache) or is withdrawn
//! through its `on_cache_hit` hook (the call was answered from cache). Once
//! every producer has done one or the other, the loader runs a single time
//! with the parameters of the invoked producers, and each waiting call gets
//! the value at its position.
//!
//! ```no_run
//! use ouroboros_cachified::{cachified, Batch, CachifiedError, CachifiedOptions, MemoryCache};
//!
//! # async fn example() -> Result<(), CachifiedError> {
//! let cache = MemoryCache::new();
//! let batch = Batch::new(|ids: Vec<u32>| async move {
//!     Ok::<_, CachifiedError>(ids.iter().map(|id| format!("user {}", id)).collect::<Vec<_>>())
//! });
//!
//! let mut calls = Vec::new();
//! for id in [1u32, 2, 3] {
//!     let options = CachifiedOptions::new(format!("user:{}", id), cache.clone(), batch.add(id)?);
//!     calls.push(cachified(options));
//! }
//! let users = futures::future::try_join_all(calls).await?;
//! assert_eq!(users.len(), 3);
//! # Ok(())
//! # }
//! ```

use crate::error::{CachifiedError, Result};
use crate::producer::FreshValue;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type LoaderFn<P, V, E> = Arc<dyn Fn(Vec<P>) -> BoxFuture<'static, std::result::Result<Vec<V>, E>> + Send + Sync>;
type Waiter<V, E> = oneshot::Sender<std::result::Result<V, E>>;

/// Coalesces fresh value calls into one loader call
pub struct Batch<P, V, E> {
    loader: LoaderFn<P, V, E>,
    state: Arc<Mutex<BatchState<P, V, E>>>,
}

struct BatchState<P, V, E> {
    /// Producers handed out that were neither invoked nor withdrawn
    pending: usize,

    /// Parameters of invoked producers, in invocation order
    requests: Vec<(P, Waiter<V, E>)>,

    auto_submit: bool,
    submitted: bool,
}

impl<P, V, E> Batch<P, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Send + 'static,
    E: Clone + From<CachifiedError> + Send + 'static,
{
    /// Create a batch that runs `loader` as soon as every producer settled
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<V>, E>> + Send + 'static,
    {
        Self::with_auto_submit(loader, true)
    }

    /// Create a batch that only runs `loader` after [`Batch::submit`]
    pub fn manual<F, Fut>(loader: F) -> Self
    where
        F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<V>, E>> + Send + 'static,
    {
        Self::with_auto_submit(loader, false)
    }

    fn with_auto_submit<F, Fut>(loader: F, auto_submit: bool) -> Self
    where
        F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<V>, E>> + Send + 'static,
    {
        Self {
            loader: Arc::new(move |params| loader(params).boxed()),
            state: Arc::new(Mutex::new(BatchState {
                pending: 0,
                requests: Vec::new(),
                auto_submit,
                submitted: false,
            })),
        }
    }

    /// Add a parameter and get the producer to pass to `cachified`.
    ///
    /// Fails with [`CachifiedError::BatchSubmitted`] once the loader started.
    pub fn add(&self, param: P) -> Result<FreshValue<V, E>> {
        {
            let mut state = self.lock();
            if state.submitted {
                return Err(CachifiedError::BatchSubmitted);
            }
            state.pending += 1;
        }

        // Each producer settles its slot exactly once
        let settled = Arc::new(AtomicBool::new(false));

        let batch = self.clone();
        let invoke_settled = settled.clone();
        let producer = FreshValue::new(move || {
            let receiver = batch.enqueue(param.clone(), &invoke_settled);
            async move {
                match receiver {
                    Ok(receiver) => receiver
                        .await
                        .unwrap_or_else(|_| Err(CachifiedError::BatchDropped.into())),
                    Err(error) => Err(error.into()),
                }
            }
        });

        let batch = self.clone();
        Ok(producer.on_cache_hit(move || {
            if !settled.swap(true, Ordering::SeqCst) {
                let mut state = batch.lock();
                state.pending = state.pending.saturating_sub(1);
                batch.try_submit(state);
            }
        }))
    }

    /// Start the loader once the outstanding producers settle.
    ///
    /// Only needed for batches created with [`Batch::manual`].
    pub fn submit(&self) -> Result<()> {
        let mut state = self.lock();
        if state.submitted {
            return Err(CachifiedError::BatchSubmitted);
        }
        state.auto_submit = true;
        self.try_submit(state);
        Ok(())
    }

    /// Whether the loader was started
    pub fn is_submitted(&self) -> bool {
        self.lock().submitted
    }

    fn enqueue(
        &self,
        param: P,
        settled: &AtomicBool,
    ) -> Result<oneshot::Receiver<std::result::Result<V, E>>> {
        let mut state = self.lock();
        if state.submitted {
            return Err(CachifiedError::BatchSubmitted);
        }

        let (sender, receiver) = oneshot::channel();
        state.requests.push((param, sender));
        if !settled.swap(true, Ordering::SeqCst) {
            state.pending = state.pending.saturating_sub(1);
        }
        self.try_submit(state);
        Ok(receiver)
    }

    fn try_submit(&self, mut state: MutexGuard<'_, BatchState<P, V, E>>) {
        if !state.auto_submit || state.submitted || state.pending > 0 {
            return;
        }
        state.submitted = true;

        let requests = std::mem::take(&mut state.requests);
        drop(state);

        if requests.is_empty() {
            debug!("Every batched call was answered from cache, skipping loader");
            return;
        }

        let (params, waiters): (Vec<P>, Vec<Waiter<V, E>>) = requests.into_iter().unzip();
        debug!("Submitting batch of {} requests", params.len());

        let load = (self.loader)(params);
        tokio::spawn(async move {
            match load.await {
                Ok(values) if values.len() == waiters.len() => {
                    for (waiter, value) in waiters.into_iter().zip(values) {
                        let _ = waiter.send(Ok(value));
                    }
                }
                Ok(values) => {
                    let error = CachifiedError::BatchSizeMismatch {
                        expected: waiters.len(),
                        actual: values.len(),
                    };
                    warn!("{}", error);
                    for waiter in waiters {
                        let _ = waiter.send(Err(error.clone().into()));
                    }
                }
                Err(error) => {
                    for waiter in waiters {
                        let _ = waiter.send(Err(error.clone()));
                    }
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, BatchState<P, V, E>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P, V, E> Clone for Batch<P, V, E> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn doubling(loads: Arc<AtomicUsize>) -> Batch<u32, u32, CachifiedError> {
        Batch::new(move |params: Vec<u32>| {
            loads.fetch_add(1, Ordering::SeqCst);
            async move { Ok(params.into_iter().map(|param| param * 2).collect()) }
        })
    }

    #[tokio::test]
    async fn test_loader_runs_once_for_all_producers() {
        let loads = Arc::new(AtomicUsize::new(0));
        let batch = doubling(loads.clone());

        let first = batch.add(1).unwrap();
        let second = batch.add(2).unwrap();

        let first = first.invoke();
        assert!(!batch.is_submitted());
        let second = second.invoke();
        assert!(batch.is_submitted());

        assert_eq!(first.await, Ok(2));
        assert_eq!(second.await, Ok(4));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_withdraws_param() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let batch: Batch<u32, u32, CachifiedError> = Batch::new(move |params: Vec<u32>| {
            recorded.lock().unwrap().extend(params.clone());
            async move { Ok(params) }
        });

        let hit = batch.add(1).unwrap();
        let miss = batch.add(2).unwrap();

        let value = miss.invoke();
        hit.notify_cache_hit();
        hit.notify_cache_hit();

        assert_eq!(value.await, Ok(2));
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_all_hits_skip_loader() {
        let loads = Arc::new(AtomicUsize::new(0));
        let batch = doubling(loads.clone());

        batch.add(1).unwrap().notify_cache_hit();
        assert!(batch.is_submitted());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(matches!(batch.add(2), Err(CachifiedError::BatchSubmitted)));
    }

    #[tokio::test]
    async fn test_size_mismatch_fails_every_waiter() {
        let batch: Batch<u32, u32, CachifiedError> =
            Batch::new(|_params: Vec<u32>| async { Ok(vec![1]) });

        let first = batch.add(1).unwrap();
        let second = batch.add(2).unwrap();
        let (first, second) = (first.invoke(), second.invoke());

        let expected = CachifiedError::BatchSizeMismatch {
            expected: 2,
            actual: 1,
        };
        assert_eq!(first.await, Err(expected.clone()));
        assert_eq!(second.await, Err(expected));
    }

    #[tokio::test]
    async fn test_loader_error_reaches_every_waiter() {
        let batch: Batch<u32, u32, String> =
            Batch::new(|_params: Vec<u32>| async { Err("backend down".to_string()) });

        let first = batch.add(1).unwrap();
        let second = batch.add(2).unwrap();
        let (first, second) = (first.invoke(), second.invoke());

        assert_eq!(first.await, Err("backend down".to_string()));
        assert_eq!(second.await, Err("backend down".to_string()));
    }

    #[tokio::test]
    async fn test_manual_submit_waits() {
        let loads = Arc::new(AtomicUsize::new(0));
        let recorded = loads.clone();
        let batch: Batch<u32, u32, CachifiedError> = Batch::manual(move |params: Vec<u32>| {
            recorded.fetch_add(1, Ordering::SeqCst);
            async move { Ok(params) }
        });

        let value = batch.add(7).unwrap().invoke();
        assert!(!batch.is_submitted());

        batch.submit().unwrap();
        assert_eq!(value.await, Ok(7));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(matches!(batch.submit(), Err(CachifiedError::BatchSubmitted)));
    }
}
