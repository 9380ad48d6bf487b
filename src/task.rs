//! Task and result records exchanged with the pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 任务标识类型
pub type TaskId = u64;

/// Drone identity, unique for the lifetime of a pool.
pub type WorkerId = usize;

/// A unit of work. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Work size hint in milliseconds.
    pub load_ms: u64,
    /// Recorded only; the queue stays FIFO.
    pub priority: i32,
}

impl Task {
    pub fn new(id: TaskId, load_ms: u64, priority: i32) -> Self {
        Self {
            id,
            load_ms,
            priority,
        }
    }

    pub fn load(&self) -> Duration {
        Duration::from_millis(self.load_ms)
    }
}

/// Outcome record produced by a drone after finishing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub duration: Duration,
    pub worker_id: WorkerId,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_is_milliseconds() {
        let task = Task::new(7, 250, 3);
        assert_eq!(task.load(), Duration::from_millis(250));
        assert_eq!(task.priority, 3);
    }

    #[test]
    fn task_json_shape() {
        let task: Task = serde_json::from_str(r#"{"id":1,"load_ms":500,"priority":0}"#).unwrap();
        assert_eq!(task, Task::new(1, 500, 0));
    }
}
