//! Demonstrates stale-while-revalidate caching
//!
//! This example shows how to:
//! - Cache a slow computation with a TTL and a stale window
//! - Serve stale values instantly while a background refresh runs
//! - Fall back to the cached value when the source fails
//!
//! Run with `RUST_LOG=debug` to see every cache event.

use anyhow::anyhow;
use ouroboros_cachified::{cachified, tracing_reporter, CachifiedOptions, FreshValue, MemoryCache};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cache = MemoryCache::new();
    let version = Arc::new(AtomicUsize::new(0));
    let source_down = Arc::new(AtomicBool::new(false));

    let producer = {
        let version = version.clone();
        let source_down = source_down.clone();
        FreshValue::new(move || {
            let version = version.clone();
            let source_down = source_down.clone();
            async move {
                // Simulate a slow upstream service
                tokio::time::sleep(Duration::from_millis(300)).await;
                if source_down.load(Ordering::SeqCst) {
                    return Err(anyhow!("upstream unavailable"));
                }
                let n = version.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("report v{}", n))
            }
        })
    };

    let call = |force_fresh: bool| {
        CachifiedOptions::new("daily-report", cache.clone(), producer.clone())
            .ttl(Duration::from_millis(500))
            .stale_while_revalidate(Duration::from_secs(10))
            .force_fresh(force_fresh)
            .reporter(tracing_reporter())
    };

    // 1. Cold cache: the caller waits for the producer
    println!("1. Cold cache...");
    let started = Instant::now();
    let value = cachified(call(false)).await?;
    println!("   {} ({}ms)", value, started.elapsed().as_millis());

    // 2. Within the TTL: served from cache
    println!("2. Fresh read...");
    let started = Instant::now();
    let value = cachified(call(false)).await?;
    println!("   {} ({}ms)", value, started.elapsed().as_millis());

    // 3. Past the TTL but inside the stale window: served stale, refreshed in the background
    tokio::time::sleep(Duration::from_millis(600)).await;
    println!("3. Stale read...");
    let started = Instant::now();
    let value = cachified(call(false)).await?;
    println!("   {} ({}ms)", value, started.elapsed().as_millis());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let value = cachified(call(false)).await?;
    println!("   After background refresh: {}", value);

    // 4. Forced refresh while the source is down: falls back to the cached value
    source_down.store(true, Ordering::SeqCst);
    println!("4. Forced refresh with failing source...");
    let value = cachified(call(true)).await?;
    println!("   Fallback value: {}", value);

    let stats = cache.stats().await;
    println!("\nCache statistics: {}", stats);

    Ok(())
}
