//! Drone任务队列模块 - 基于tokio有界通道实现
//!
//! Submitters never wait: a full buffer is reported straight back as
//! `PoolError::QueueFull`. Drones share the single receiver behind an async
//! mutex, so each queued task is handed to exactly one drone.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;

use crate::metrics::utilization;
use crate::task::Task;
use crate::{PoolError, Result};

/// 任务队列结构体
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    queued: AtomicUsize,
    capacity: usize,
    closed: AtomicBool,
}

impl TaskQueue {
    /// 创建新任务队列
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(capacity);
        Arc::new(Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            queued: AtomicUsize::new(0),
            capacity,
            closed: AtomicBool::new(false),
        })
    }

    /// 提交新任务(非阻塞)
    pub fn submit(&self, task: Task) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        // reserve first: a full buffer must not move the counter
        match self.sender.try_reserve() {
            Ok(permit) => {
                self.queued.fetch_add(1, Ordering::AcqRel);
                permit.send(task);
                Ok(())
            }
            Err(TrySendError::Full(())) => Err(PoolError::QueueFull),
            Err(TrySendError::Closed(())) => Err(PoolError::Closed),
        }
    }

    /// Waits for the next task. `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Task> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let mut receiver = self.receiver.lock().await;
        let task = receiver.recv().await?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        Some(task)
    }

    /// Rejects further submissions and stops handing out tasks.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// `recv` frees the slot before the counter drops, so a racing submit
    /// can push the raw counter one past capacity for an instant.
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 获取队列使用率 (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        utilization(self.len(), self.capacity)
    }
}
