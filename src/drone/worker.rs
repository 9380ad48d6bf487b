//! Drone (worker) implementation
//!
//! A drone pulls one task at a time from the shared queue, runs it to
//! completion, publishes a `TaskResult` and folds the elapsed time into the
//! pool metrics. Cancellation is only observed between tasks.

use chrono::Utc;
use futures::future::BoxFuture;
use log::debug;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::task_queue::TaskQueue;
use crate::metrics::MetricsAggregator;
use crate::task::{Task, TaskResult, WorkerId};

/// Runs the body of a task.
pub trait TaskExecutor: Send + Sync + fmt::Debug {
    fn execute<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, ()>;
}

/// Sleeps for the task's load hint.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedLoad;

impl TaskExecutor for SimulatedLoad {
    fn execute<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, ()> {
        Box::pin(tokio::time::sleep(task.load()))
    }
}

/// Everything a drone shares with the rest of the pool.
#[derive(Clone)]
pub struct DroneContext {
    pub queue: Arc<TaskQueue>,
    pub results: mpsc::Sender<TaskResult>,
    pub metrics: Arc<MetricsAggregator>,
    pub executor: Arc<dyn TaskExecutor>,
    /// Pool-wide scope; every drone's retire token is a child of it.
    pub shutdown: CancellationToken,
}

impl fmt::Debug for DroneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DroneContext")
            .field("queue_len", &self.queue.len())
            .field("executor", &self.executor)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// Owner-side handle used to retire one specific drone.
#[derive(Debug)]
pub struct DroneHandle {
    id: WorkerId,
    retire: CancellationToken,
}

impl DroneHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The drone finishes its current task, if any, and then exits.
    pub fn retire(&self) {
        self.retire.cancel();
    }
}

struct Drone {
    id: WorkerId,
    ctx: DroneContext,
    retire: CancellationToken,
}

/// Spawns a drone onto `tracker` and returns its retire handle.
pub fn spawn_drone(id: WorkerId, ctx: DroneContext, tracker: &TaskTracker) -> DroneHandle {
    let retire = ctx.shutdown.child_token();
    let drone = Drone {
        id,
        ctx,
        retire: retire.clone(),
    };
    tracker.spawn(drone.run());
    DroneHandle { id, retire }
}

impl Drone {
    async fn run(self) {
        debug!("Drone {} started", self.id);

        loop {
            let task = tokio::select! {
                biased;
                _ = self.retire.cancelled() => break,
                next = self.ctx.queue.next() => match next {
                    Some(task) => task,
                    None => break,
                },
            };

            debug!("Drone {} executing task {}", self.id, task.id);
            let started = Instant::now();
            self.ctx.executor.execute(&task).await;
            let duration = started.elapsed();

            let result = TaskResult {
                task_id: task.id,
                duration,
                worker_id: self.id,
                timestamp: Utc::now(),
            };

            // Retirement must not drop a finished result, only pool shutdown may.
            let stop = tokio::select! {
                biased;
                sent = self.ctx.results.send(result) => {
                    if sent.is_err() {
                        debug!("Drone {}: result stream dropped, discarding task {}", self.id, task.id);
                    }
                    false
                }
                _ = self.ctx.shutdown.cancelled() => true,
            };
            self.ctx.metrics.record_completion(duration);

            if stop {
                break;
            }
        }

        debug!("Drone {} exited", self.id);
    }
}
