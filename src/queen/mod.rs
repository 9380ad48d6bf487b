//! Queen模块实现 - 扩缩容控制器
//!
//! Once per tick the queen reads queue occupancy and either spawns drones,
//! retires one, or does nothing. The decision and its application run under
//! a single lock; the queue and the counters are never behind it.

pub mod policy;

use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::task::TaskTracker;

use crate::config::PoolConfig;
use crate::drone::{spawn_drone, DroneContext, DroneHandle};
use crate::task::WorkerId;

pub use policy::{decide, ScalingDecision, ScalingInputs};

/// 扩缩容控制器
#[derive(Debug)]
pub struct ScalingController {
    config: PoolConfig,
    ctx: DroneContext,
    tracker: TaskTracker,
    /// Live drones, newest last. Doubles as the scaling lock.
    drones: Mutex<Vec<DroneHandle>>,
    active: AtomicUsize,
    next_id: AtomicUsize,
    /// Set by `spawn_initial`; nothing scales before the pool is started.
    started: AtomicBool,
}

impl ScalingController {
    pub fn new(config: PoolConfig, ctx: DroneContext, tracker: TaskTracker) -> Self {
        Self {
            config,
            ctx,
            tracker,
            drones: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// Brings the pool up to `min_workers` drones.
    pub fn spawn_initial(&self) {
        let mut drones = self.drones.lock();
        let missing = self.config.min_workers.saturating_sub(drones.len());
        self.spawn_locked(&mut drones, missing);
        self.started.store(true, Ordering::Release);
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// One controller tick: observe, decide, apply.
    pub fn evaluate(&self) -> ScalingDecision {
        if !self.started.load(Ordering::Acquire) || self.ctx.shutdown.is_cancelled() {
            return ScalingDecision::Hold;
        }

        let mut drones = self.drones.lock();
        let now = Instant::now();
        let inputs = ScalingInputs {
            queued: self.ctx.queue.len(),
            capacity: self.ctx.queue.capacity(),
            active_workers: self.active_workers(),
            min_workers: self.config.min_workers,
            max_workers: self.config.max_workers,
            since_last_scaling: self
                .ctx
                .metrics
                .last_scaling_event()
                .map(|at| now.saturating_duration_since(at)),
        };

        let decision = decide(&inputs, &self.config.scaling);
        match decision {
            ScalingDecision::ScaleUp(n) => {
                self.spawn_locked(&mut drones, n);
                self.ctx.metrics.mark_scaling_event(now, "up");
                info!(
                    "Scaled up by {} drones ({} active, queue {}/{})",
                    n,
                    self.active_workers(),
                    inputs.queued,
                    inputs.capacity
                );
            }
            ScalingDecision::ScaleDown(n) => {
                for _ in 0..n {
                    if let Some(drone) = drones.pop() {
                        drone.retire();
                        self.active.fetch_sub(1, Ordering::AcqRel);
                        debug!("Retiring drone {}", drone.id());
                    }
                }
                self.ctx.metrics.set_active_workers(self.active_workers());
                self.ctx.metrics.mark_scaling_event(now, "down");
                info!(
                    "Scaled down by {} drones ({} active, queue {}/{})",
                    n,
                    self.active_workers(),
                    inputs.queued,
                    inputs.capacity
                );
            }
            ScalingDecision::Hold => {}
        }
        decision
    }

    /// Tick loop; returns when the pool scope is cancelled.
    pub async fn run(&self) {
        let period = self.config.scaling.tick_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.evaluate();
                }
            }
        }
        debug!("Scaling controller stopped");
    }

    fn spawn_locked(&self, drones: &mut Vec<DroneHandle>, n: usize) {
        for _ in 0..n {
            let id: WorkerId = self.next_id.fetch_add(1, Ordering::Relaxed);
            drones.push(spawn_drone(id, self.ctx.clone(), &self.tracker));
            self.active.fetch_add(1, Ordering::AcqRel);
        }
        self.ctx.metrics.set_active_workers(self.active_workers());
    }
}
