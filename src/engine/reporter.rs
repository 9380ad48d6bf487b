//! Periodic metrics reporter

use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::PoolInner;

/// Logs one metrics line per `period` until the pool scope is cancelled.
pub(crate) async fn run(inner: Arc<PoolInner>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = inner.scope.cancelled() => break,
            _ = ticker.tick() => {
                let snap = inner.snapshot();
                info!(
                    "Pool metrics: avg={:?} queue={:.0}% workers={} processed={}",
                    snap.average_processing_time,
                    snap.queue_utilization * 100.0,
                    snap.active_workers,
                    snap.total_tasks_processed
                );
            }
        }
    }
}
