//! 任务执行引擎核心组件
//!
//! `AdaptivePool` owns the queue, the metrics, the queen and the result
//! channel, and wires them under one cancellation scope. Every background
//! task is spawned on a `TaskTracker` so `shutdown` can wait for all of them.

pub mod reporter;

use futures::Stream;
use log::info;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::PoolConfig;
use crate::drone::{DroneContext, SimulatedLoad, TaskExecutor, TaskQueue};
use crate::metrics::{MetricsAggregator, PoolMetrics};
use crate::queen::ScalingController;
use crate::task::{Task, TaskResult};
use crate::{PoolError, Result};

#[derive(Debug)]
pub(crate) struct PoolInner {
    pub(crate) config: PoolConfig,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) metrics: Arc<MetricsAggregator>,
    pub(crate) controller: Arc<ScalingController>,
    pub(crate) scope: CancellationToken,
    pub(crate) tracker: TaskTracker,
}

impl PoolInner {
    pub(crate) fn snapshot(&self) -> PoolMetrics {
        self.metrics
            .snapshot(self.queue.utilization(), self.controller.active_workers())
    }

    /// Cancels every loop and stops accepting work. Safe to call repeatedly.
    fn close(&self) {
        self.scope.cancel();
        self.queue.close();
        self.tracker.close();
    }
}

/// Adaptive worker pool facade.
#[derive(Debug)]
pub struct AdaptivePool {
    inner: Arc<PoolInner>,
    results: Mutex<Option<mpsc::Receiver<TaskResult>>>,
    started: AtomicBool,
}

impl AdaptivePool {
    /// Validates `config` and builds a pool that runs `SimulatedLoad`.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_executor(config, Arc::new(SimulatedLoad))
    }

    pub fn with_executor(config: PoolConfig, executor: Arc<dyn TaskExecutor>) -> Result<Self> {
        config.validate()?;

        let queue = TaskQueue::new(config.queue_capacity);
        let metrics = Arc::new(MetricsAggregator::new());
        let (results_tx, results_rx) = mpsc::channel(config.queue_capacity);
        let scope = CancellationToken::new();
        let tracker = TaskTracker::new();

        let ctx = DroneContext {
            queue: Arc::clone(&queue),
            results: results_tx,
            metrics: Arc::clone(&metrics),
            executor,
            shutdown: scope.clone(),
        };
        let controller = Arc::new(ScalingController::new(config.clone(), ctx, tracker.clone()));

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                queue,
                metrics,
                controller,
                scope,
                tracker,
            }),
            results: Mutex::new(Some(results_rx)),
            started: AtomicBool::new(false),
        })
    }

    /// Launches `min_workers` drones, the scaling loop and the metrics
    /// reporter, then returns. Everything stops once `cancel` fires.
    ///
    /// Must be called from within a tokio runtime. A second call is a no-op.
    pub fn start(&self, cancel: CancellationToken) -> Result<()> {
        tokio::runtime::Handle::try_current()?;
        if self.inner.scope.is_cancelled() {
            return Err(PoolError::Closed);
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let inner = &self.inner;
        inner.controller.spawn_initial();

        let controller = Arc::clone(&inner.controller);
        inner.tracker.spawn(async move { controller.run().await });

        inner.tracker.spawn(reporter::run(
            Arc::clone(inner),
            inner.config.scaling.report_interval(),
        ));

        let watcher = Arc::clone(inner);
        inner.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = watcher.scope.cancelled() => {}
            }
            watcher.close();
        });

        info!(
            "Pool started with {} drones (max {}, queue capacity {})",
            inner.config.min_workers, inner.config.max_workers, inner.config.queue_capacity
        );
        Ok(())
    }

    /// Non-blocking enqueue. Fails with `QueueFull` instead of waiting.
    pub fn submit(&self, task: Task) -> Result<()> {
        self.inner.queue.submit(task)
    }

    /// The result stream. Only the first call returns it.
    pub fn take_results(&self) -> Option<ResultStream> {
        let receiver = self.results.lock().take()?;
        let tracker = self.inner.tracker.clone();
        Some(ResultStream {
            receiver,
            drones_done: Box::pin(async move { tracker.wait().await }),
            drones_gone: false,
        })
    }

    /// Cancels the pool and waits for every drone and loop to exit.
    /// A drone busy with a task finishes it first.
    pub async fn shutdown(&self) {
        self.inner.close();
        self.inner.tracker.wait().await;
        info!("Pool stopped");
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.inner.snapshot()
    }

    pub fn active_workers(&self) -> usize {
        self.inner.controller.active_workers()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Direct handle on the scaling controller, mainly for driving ticks by hand.
    pub fn controller(&self) -> &ScalingController {
        &self.inner.controller
    }
}

impl Drop for AdaptivePool {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Results in completion order. Ends after the pool has shut down and every
/// buffered result has been read.
pub struct ResultStream {
    receiver: mpsc::Receiver<TaskResult>,
    drones_done: Pin<Box<dyn Future<Output = ()> + Send>>,
    drones_gone: bool,
}

impl Stream for ResultStream {
    type Item = TaskResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TaskResult>> {
        let this = &mut *self;
        if let Poll::Ready(item) = this.receiver.poll_recv(cx) {
            return Poll::Ready(item);
        }
        if !this.drones_gone {
            match this.drones_done.as_mut().poll(cx) {
                Poll::Ready(()) => this.drones_gone = true,
                Poll::Pending => return Poll::Pending,
            }
        }
        // no drone is left to send, so whatever is buffered is all there is
        Poll::Ready(this.receiver.try_recv().ok())
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("drones_gone", &self.drones_gone)
            .finish()
    }
}
