//! The Applaude generation pipeline.
//!
//! A project moves through five stages (market analysis, design, code
//! generation, QA, deployment). Each stage runs as an independent queued
//! task; the project row in the store is the only shared state, and every
//! write to it happens under the row lock.
//!
//! Collaborators are traits so the worker can wire Postgres and Gemini while
//! tests use the in-memory versions in [`memory`].

pub mod artifacts;
pub mod dispatch;
pub mod gateway;
pub mod memory;
pub mod notify;
pub mod orchestrator;
pub mod prompts;
pub mod queue;
pub mod stage;
pub mod store;

pub use dispatch::{DispatchError, Dispatcher};
pub use gateway::{GatewayError, GeminiGateway, LlmConfig, LlmGateway, RetryPolicy};
pub use orchestrator::{Orchestrator, OrchestratorError, TaskOutcome, TimeLimits};
pub use queue::{QueueRetryPolicy, QueuedTask, TaskQueue};
pub use stage::{StageDeps, StageError, StageHandler, StageOutcome, StageRegistry};
pub use store::{ProjectStore, StoreError};
