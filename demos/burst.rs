//! Bursty load against an adaptive pool
//!
//! `RUST_LOG=info cargo run --example burst [config.json]`

use adaptive_pool::{AdaptivePool, PoolConfig, PoolError, Task};
use futures::StreamExt;
use log::{info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> adaptive_pool::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => PoolConfig::from_file(path)?,
        None => PoolConfig::new(2, 8, 10),
    };
    let pool = AdaptivePool::new(config)?;
    let mut results = pool.take_results().ok_or(PoolError::Closed)?;

    let cancel = CancellationToken::new();
    pool.start(cancel.clone())?;

    let consumer = tokio::spawn(async move {
        let mut done = 0usize;
        while let Some(result) = results.next().await {
            done += 1;
            info!(
                "task {} finished on drone {} in {:?}",
                result.task_id, result.worker_id, result.duration
            );
        }
        done
    });

    let mut next_id = 0u64;
    for burst in 0..4 {
        let mut rejected = 0;
        for _ in 0..12 {
            match pool.submit(Task::new(next_id, rand::random_range(200..800), 0)) {
                Ok(()) => next_id += 1,
                Err(PoolError::QueueFull) => rejected += 1,
                Err(e) => return Err(e),
            }
        }
        if rejected > 0 {
            warn!("burst {}: {} tasks rejected, queue full", burst, rejected);
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        info!("after burst {}: {:?}", burst, pool.metrics());
    }

    tokio::time::sleep(Duration::from_secs(8)).await;
    cancel.cancel();
    pool.shutdown().await;

    let done = consumer.await.unwrap_or(0);
    info!("{} of {} accepted tasks completed", done, next_id);
    Ok(())
}
