//! Durable task queue seam.
//!
//! The queue guarantees at-least-once delivery, not ordering or
//! exclusivity. Stage handlers stay correct under redelivery through their
//! entry check and guarded commit.

use std::time::Duration;

use applaude_core::stage::Stage;
use applaude_core::types::{DbId, ProjectId};
use applaude_db::repositories::StageTaskRepo;
use applaude_db::DbPool;
use async_trait::async_trait;

/// A claimed unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub id: DbId,
    pub project_id: ProjectId,
    pub stage: Stage,
    /// How many times the task has been claimed, including this one.
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Task {id} is unusable: {reason}")]
    InvalidTask { id: DbId, reason: String },
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Queue `stage` for `project_id`. Returns `false` when a queued or
    /// running task for the same pair already exists.
    async fn enqueue(&self, stage: Stage, project_id: ProjectId) -> Result<bool, QueueError>;

    /// Claim the next due task, leasing it for `lease`. A task whose lease
    /// runs out without being settled is delivered again.
    async fn claim(&self, lease: Duration) -> Result<Option<QueuedTask>, QueueError>;

    async fn complete(&self, task_id: DbId) -> Result<(), QueueError>;

    /// Release the task back to the queue, due after `delay`.
    async fn retry_later(&self, task_id: DbId, delay: Duration, error: &str)
        -> Result<(), QueueError>;

    /// Drop the task for good.
    async fn bury(&self, task_id: DbId, error: &str) -> Result<(), QueueError>;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Upper bound on any single retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// Queue-level retry applied after a stage's own gateway retries run out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueRetryPolicy {
    /// Retries after the first run.
    pub max_retries: u32,
    pub delay: Duration,
    /// Multiplier per retry. `1.0` keeps the delay fixed.
    pub backoff: f64,
}

impl Default for QueueRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(60),
            backoff: 1.0,
        }
    }
}

impl QueueRetryPolicy {
    /// Whether a task that just failed on its `attempts`-th run gets another.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts <= self.max_retries
    }

    /// Delay before the run following the `attempts`-th, capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16) as i32;
        let factor = self.backoff.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`TaskQueue`] over the `stage_tasks` table.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: DbPool,
}

impl PgTaskQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, stage: Stage, project_id: ProjectId) -> Result<bool, QueueError> {
        Ok(StageTaskRepo::enqueue(&self.pool, project_id, stage).await?)
    }

    async fn claim(&self, lease: Duration) -> Result<Option<QueuedTask>, QueueError> {
        let Some(task) = StageTaskRepo::claim_next(&self.pool, lease.as_secs_f64()).await? else {
            return Ok(None);
        };

        match task.parsed_stage() {
            Ok(stage) => Ok(Some(QueuedTask {
                id: task.id,
                project_id: task.project_id,
                stage,
                attempts: u32::try_from(task.attempts).unwrap_or(u32::MAX),
            })),
            Err(e) => {
                let reason = e.to_string();
                StageTaskRepo::bury(&self.pool, task.id, &reason).await?;
                Err(QueueError::InvalidTask {
                    id: task.id,
                    reason,
                })
            }
        }
    }

    async fn complete(&self, task_id: DbId) -> Result<(), QueueError> {
        Ok(StageTaskRepo::complete(&self.pool, task_id).await?)
    }

    async fn retry_later(
        &self,
        task_id: DbId,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        Ok(StageTaskRepo::retry_later(&self.pool, task_id, delay.as_secs_f64(), error).await?)
    }

    async fn bury(&self, task_id: DbId, error: &str) -> Result<(), QueueError> {
        Ok(StageTaskRepo::bury(&self.pool, task_id, error).await?)
    }
}
