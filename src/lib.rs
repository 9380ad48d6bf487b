//! 自适应工作池核心库入口
//!
//! An async worker pool whose drone (worker) count follows queue pressure.
//! Tasks go into a bounded queue, drones drain it and publish results, and
//! the queen (scaling controller) adds or retires drones on a fixed tick.
//!
//! ```no_run
//! use adaptive_pool::{AdaptivePool, PoolConfig, Task};
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> adaptive_pool::Result<()> {
//! let pool = AdaptivePool::new(PoolConfig::new(2, 8, 10))?;
//! let cancel = CancellationToken::new();
//! pool.start(cancel.clone())?;
//!
//! pool.submit(Task::new(1, 50, 0))?;
//! let mut results = pool.take_results().expect("results taken once");
//! if let Some(result) = results.next().await {
//!     println!("task {} done by drone {}", result.task_id, result.worker_id);
//! }
//! cancel.cancel();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod drone;
pub mod engine;
pub mod metrics;
pub mod queen;
pub mod task;

/// 工作池错误类型
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("task queue is full")]
    QueueFull,

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("task queue is closed")]
    Closed,

    #[error("pool must be started inside a tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;

// 公开导出模块的公共接口
pub use config::{PoolConfig, ScalingPolicy};
pub use drone::{SimulatedLoad, TaskExecutor};
pub use engine::{AdaptivePool, ResultStream};
pub use crate::metrics::{MetricsAggregator, PoolMetrics};
pub use queen::{ScalingController, ScalingDecision};
pub use task::{Task, TaskId, TaskResult, WorkerId};
