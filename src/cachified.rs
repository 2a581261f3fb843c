//! The cache-aside orchestrator
//!
//! [`cachified`] answers a call from cache when it can, and otherwise runs the
//! fresh value function, validates its result and writes it back. A failing
//! fresh value function may still be answered from cache when
//! `fallback_to_cache` allows it.

use crate::cache::CacheEntry;
use crate::context::{CachifiedOptions, Context};
use crate::error::CachifiedError;
use crate::lookup::{delete_entry, fetch_entry, resolve_from_cache, CachedValue};
use crate::reporter::CacheEvent;
use futures::future::BoxFuture;
use std::fmt;
use tracing::debug;

/// Resolve a value through the cache.
///
/// Errors returned by the fresh value function come back unchanged. The
/// only error this layer creates itself is
/// [`CachifiedError::InvalidFreshValue`], converted into `E`. Cache backend
/// failures never fail a call: unreadable entries are deleted and failed
/// writes are reported, while the value is still returned.
pub async fn cachified<V, E>(options: CachifiedOptions<V, E>) -> Result<V, E>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    let context = Context::new(options);
    let result = resolve(&context).await;

    match &result {
        Ok(value) => context.report(&CacheEvent::Done { value }),
        Err(error) => context.report(&CacheEvent::Failed {
            error: error.to_string(),
        }),
    }

    result
}

async fn resolve<V, E>(context: &Context<V, E>) -> Result<V, E>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    if !context.force_fresh {
        if let CachedValue::Hit(value) = resolve_from_cache(context).await {
            return Ok(value);
        }
    }

    produce_fresh_value(context).await
}

async fn produce_fresh_value<V, E>(context: &Context<V, E>) -> Result<V, E>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    context.report(&CacheEvent::GetFreshValueStart);

    let value = match context.get_fresh_value.invoke().await {
        Ok(value) => value,
        Err(error) => {
            context.report(&CacheEvent::GetFreshValueError {
                error: error.to_string(),
            });
            return fall_back_to_cache(context, error).await;
        }
    };

    context.report(&CacheEvent::GetFreshValueSuccess { value: &value });

    let check = (context.check_value)(&value);
    if let Some(reason) = check.reason() {
        context.report(&CacheEvent::CheckFreshValueError { reason });
        return Err(CachifiedError::InvalidFreshValue {
            key: context.key.clone(),
            reason: reason.to_string(),
        }
        .into());
    }

    let entry = CacheEntry::new(context.metadata.clone(), value);
    match context.cache.set(&context.key, &entry).await {
        Ok(()) => context.report(&CacheEvent::WriteFreshValueSuccess {
            metadata: &entry.metadata,
        }),
        Err(error) => context.report(&CacheEvent::WriteFreshValueError { error: &error }),
    }

    Ok(entry.value)
}

/// Answer a failed fresh value call from cache, or hand back its error
async fn fall_back_to_cache<V, E>(context: &Context<V, E>, error: E) -> Result<V, E>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    let limit = context.fallback_to_cache;
    if limit.is_zero() {
        return Err(error);
    }

    match fetch_entry(context).await {
        Ok(Some(entry)) => {
            let age = entry.age(context.now());
            // Only the age bound applies here, not the entry's own ttl
            if limit.covers(age) {
                context.report(&CacheEvent::GetFreshValueCacheFallback {
                    value: &entry.value,
                });
                return Ok(entry.value);
            }
            debug!(
                "Cached value for {} is not usable as fallback (age {}ms, limit {})",
                context.key,
                age.as_millis(),
                limit
            );
        }
        Ok(None) => {
            debug!("No cached value for {} to fall back to", context.key);
        }
        Err(cache_error) => {
            context.report(&CacheEvent::GetCachedValueError { error: &cache_error });
            delete_entry(context).await;
        }
    }

    Err(error)
}

/// Start a detached refresh of the context's key.
///
/// The refresh waits `stale_refresh_timeout`, then runs a forced fresh call
/// without fallback. Its outcome only reaches the reporter of the call that
/// scheduled it.
pub(crate) fn schedule_refresh<V, E>(context: &Context<V, E>)
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    let options = context.refresh_options();
    let report = context.reporter();
    let delay = context.stale_refresh_timeout;

    debug!(
        "Scheduling background refresh for {} in {}ms",
        context.key,
        delay.as_millis()
    );

    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        report(&CacheEvent::RefreshValueStart);
        match cachified_boxed(options).await {
            Ok(value) => report(&CacheEvent::RefreshValueSuccess { value: &value }),
            Err(error) => report(&CacheEvent::RefreshValueError {
                error: error.to_string(),
            }),
        }
    });
}

// Boxed so the refresh task does not need the type of the future it is part of
fn cachified_boxed<V, E>(options: CachifiedOptions<V, E>) -> BoxFuture<'static, Result<V, E>>
where
    V: Send + Sync + 'static,
    E: From<CachifiedError> + fmt::Display + Send + 'static,
{
    Box::pin(cachified(options))
}
