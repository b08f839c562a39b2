//! Stage-task worker: pulls tasks from the durable queue and runs them
//! through the pipeline orchestrator.

pub mod config;
pub mod pool;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
