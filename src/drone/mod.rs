//! 工蜂(Drone)节点实现模块

pub mod task_queue;
pub mod worker;

pub use task_queue::TaskQueue;
pub use worker::{spawn_drone, DroneContext, DroneHandle, SimulatedLoad, TaskExecutor};
