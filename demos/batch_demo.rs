//! Demonstrates coalescing cache misses into one loader call
//!
//! Two rounds of lookups share a cache. In the second round only the ids
//! that were not cached before reach the loader.

use ouroboros_cachified::{cachified, tracing_reporter, Batch, CachifiedOptions, MemoryCache};
use futures::future::try_join_all;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cache = MemoryCache::new();

    for round in [vec![1u32, 2, 3], vec![2, 3, 4, 5]] {
        println!("Looking up users {:?}", round);

        let batch: Batch<u32, String, String> = Batch::new(|ids: Vec<u32>| async move {
            println!("   Loader called with {:?}", ids);
            Ok(ids.iter().map(|id| format!("User #{}", id)).collect::<Vec<_>>())
        });

        let mut calls = Vec::new();
        for id in &round {
            let options = CachifiedOptions::new(format!("user:{}", id), cache.clone(), batch.add(*id)?)
                .ttl(Duration::from_secs(60))
                .reporter(tracing_reporter());
            calls.push(cachified(options));
        }

        let users = try_join_all(calls).await.map_err(anyhow::Error::msg)?;
        for user in users {
            println!("   {}", user);
        }
    }

    println!("\nCache statistics: {}", cache.stats().await);
    Ok(())
}
