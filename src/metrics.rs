//! 指标聚合模块
//!
//! Keeps the running processing-time average and the processed-task counter
//! behind atomics so drones can update them without a lock, and mirrors every
//! update into the `metrics` facade.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const TASKS_PROCESSED: &str = "adaptive_pool_tasks_processed_total";
pub const TASK_DURATION: &str = "adaptive_pool_task_duration_seconds";
pub const ACTIVE_WORKERS: &str = "adaptive_pool_active_workers";
pub const QUEUE_UTILIZATION: &str = "adaptive_pool_queue_utilization";
pub const SCALING_EVENTS: &str = "adaptive_pool_scaling_events_total";

/// Point-in-time view of the pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolMetrics {
    pub average_processing_time: Duration,
    pub queue_utilization: f64,
    pub active_workers: usize,
    pub total_tasks_processed: u64,
    #[serde(rename = "since_last_scaling_ms", serialize_with = "elapsed_ms")]
    pub last_scaling_event: Option<Instant>,
}

fn elapsed_ms<S: Serializer>(at: &Option<Instant>, serializer: S) -> Result<S::Ok, S::Error> {
    at.map(|at| at.elapsed().as_millis() as u64).serialize(serializer)
}

/// `queued / capacity`, clamped to `[0, 1]`.
pub fn utilization(queued: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    (queued as f64 / capacity as f64).clamp(0.0, 1.0)
}

/// Two-sample blend: the first sample is taken as is, every later one is
/// averaged with the previous value.
pub fn blend(previous: Duration, sample: Duration) -> Duration {
    if previous.is_zero() {
        sample
    } else {
        (previous + sample) / 2
    }
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    average_nanos: AtomicU64,
    total_processed: AtomicU64,
    last_scaling_event: parking_lot::Mutex<Option<Instant>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one completed task into the average and bumps the counter.
    pub fn record_completion(&self, duration: Duration) {
        let sample = duration.as_nanos().min(u64::MAX as u128) as u64;
        // fetch_update retries on contention, so concurrent drones never lose a
        // sample; the closure always returns Some, so it cannot fail
        let _ = self
            .average_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                let next = blend(Duration::from_nanos(prev), Duration::from_nanos(sample));
                Some(next.as_nanos().min(u64::MAX as u128) as u64)
            });
        self.total_processed.fetch_add(1, Ordering::AcqRel);

        metrics::counter!(TASKS_PROCESSED).increment(1);
        metrics::histogram!(TASK_DURATION).record(duration.as_secs_f64());
    }

    pub fn average_processing_time(&self) -> Duration {
        Duration::from_nanos(self.average_nanos.load(Ordering::Acquire))
    }

    pub fn total_tasks_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Acquire)
    }

    pub fn last_scaling_event(&self) -> Option<Instant> {
        *self.last_scaling_event.lock()
    }

    pub(crate) fn mark_scaling_event(&self, at: Instant, direction: &'static str) {
        *self.last_scaling_event.lock() = Some(at);
        metrics::counter!(SCALING_EVENTS, "direction" => direction).increment(1);
    }

    pub(crate) fn set_active_workers(&self, active: usize) {
        metrics::gauge!(ACTIVE_WORKERS).set(active as f64);
    }

    pub fn snapshot(&self, queue_utilization: f64, active_workers: usize) -> PoolMetrics {
        metrics::gauge!(QUEUE_UTILIZATION).set(queue_utilization);
        self.set_active_workers(active_workers);

        PoolMetrics {
            average_processing_time: self.average_processing_time(),
            queue_utilization,
            active_workers,
            total_tasks_processed: self.total_tasks_processed(),
            last_scaling_event: self.last_scaling_event(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn first_sample_is_taken_verbatim() {
        let agg = MetricsAggregator::new();
        agg.record_completion(Duration::from_millis(400));
        assert_eq!(agg.average_processing_time(), Duration::from_millis(400));
        assert_eq!(agg.total_tasks_processed(), 1);
    }

    #[test]
    fn later_samples_are_halved_in() {
        let agg = MetricsAggregator::new();
        agg.record_completion(Duration::from_millis(400));
        agg.record_completion(Duration::from_millis(200));
        agg.record_completion(Duration::from_millis(100));
        // (400 + 200) / 2 = 300, then (300 + 100) / 2 = 200
        assert_eq!(agg.average_processing_time(), Duration::from_millis(200));
        assert_eq!(agg.total_tasks_processed(), 3);
    }

    #[test]
    fn utilization_is_clamped() {
        assert_relative_eq!(utilization(8, 10), 0.8);
        assert_relative_eq!(utilization(0, 10), 0.0);
        assert_relative_eq!(utilization(12, 10), 1.0);
    }

    #[test]
    fn concurrent_updates_keep_every_count() {
        let agg = Arc::new(MetricsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = Arc::clone(&agg);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        agg.record_completion(Duration::from_millis(5));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(agg.total_tasks_processed(), 8_000);
        assert_eq!(agg.average_processing_time(), Duration::from_millis(5));
    }

    #[test]
    fn snapshot_carries_scaling_event() {
        let agg = MetricsAggregator::new();
        assert!(agg.snapshot(0.0, 2).last_scaling_event.is_none());

        let now = Instant::now();
        agg.mark_scaling_event(now, "up");
        let snap = agg.snapshot(0.5, 4);
        assert_eq!(snap.last_scaling_event, Some(now));
        assert_eq!(snap.active_workers, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_json_reports_scaling_age() {
        let agg = MetricsAggregator::new();
        let json = serde_json::to_value(agg.snapshot(0.0, 2)).unwrap();
        assert!(json["since_last_scaling_ms"].is_null());

        agg.mark_scaling_event(Instant::now(), "up");
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let json = serde_json::to_value(agg.snapshot(0.9, 4)).unwrap();
        assert_eq!(json["since_last_scaling_ms"], 1_500);
        assert_eq!(json["active_workers"], 4);
    }

    proptest! {
        #[test]
        fn blend_stays_between_inputs(prev in 1u64..10_000_000, sample in 0u64..10_000_000) {
            let out = blend(Duration::from_nanos(prev), Duration::from_nanos(sample));
            let lo = Duration::from_nanos(prev.min(sample));
            let hi = Duration::from_nanos(prev.max(sample));
            prop_assert!(out >= lo && out <= hi);
        }
    }
}
