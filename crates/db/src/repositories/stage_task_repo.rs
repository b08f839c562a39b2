//! Repository for the `stage_tasks` queue table.
//!
//! Uses `StageTaskStatus` from `models::status` for every status literal.
//! Claims use `SELECT FOR UPDATE SKIP LOCKED` so any number of workers can
//! poll concurrently without double-dispatch. A running task whose lease has
//! expired is claimable again, which gives at-least-once delivery when a
//! worker dies mid-task.

use applaude_core::stage::Stage;
use applaude_core::types::{DbId, ProjectId};
use sqlx::PgPool;

use crate::models::stage_task::StageTask;
use crate::models::status::StageTaskStatus;

/// Column list for `stage_tasks` queries.
const COLUMNS: &str = "\
    id, project_id, stage, status_id, attempts, run_after, \
    lease_expires_at, last_error, created_at, updated_at";

/// Provides queue operations for stage tasks.
pub struct StageTaskRepo;

impl StageTaskRepo {
    /// Queue `stage` for `project_id` unless a live task for the pair exists.
    ///
    /// Returns `true` if a new row was inserted.
    pub async fn enqueue(
        pool: &PgPool,
        project_id: ProjectId,
        stage: Stage,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO stage_tasks (project_id, stage, status_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (project_id, stage) WHERE status_id IN (1, 2) DO NOTHING",
        )
        .bind(project_id)
        .bind(stage.as_str())
        .bind(StageTaskStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim the next due task and lease it for `lease_secs`.
    ///
    /// Increments `attempts` on every claim, including re-claims of expired
    /// leases.
    pub async fn claim_next(
        pool: &PgPool,
        lease_secs: f64,
    ) -> Result<Option<StageTask>, sqlx::Error> {
        let query = format!(
            "UPDATE stage_tasks \
             SET status_id = $1, attempts = attempts + 1, \
                 lease_expires_at = NOW() + make_interval(secs => $2), \
                 updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM stage_tasks \
                 WHERE (status_id = $3 AND run_after <= NOW()) \
                    OR (status_id = $1 AND lease_expires_at < NOW()) \
                 ORDER BY run_after ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StageTask>(&query)
            .bind(StageTaskStatus::Running.id())
            .bind(lease_secs)
            .bind(StageTaskStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a task as done.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE stage_tasks \
             SET status_id = $2, lease_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(StageTaskStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put a task back in the queue, due after `delay_secs`.
    pub async fn retry_later(
        pool: &PgPool,
        id: DbId,
        delay_secs: f64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE stage_tasks \
             SET status_id = $2, run_after = NOW() + make_interval(secs => $3), \
                 lease_expires_at = NULL, last_error = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(StageTaskStatus::Queued.id())
        .bind(delay_secs)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Give up on a task for good.
    pub async fn bury(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE stage_tasks \
             SET status_id = $2, lease_expires_at = NULL, last_error = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(StageTaskStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StageTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stage_tasks WHERE id = $1");
        sqlx::query_as::<_, StageTask>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All tasks of a project in creation order.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: ProjectId,
    ) -> Result<Vec<StageTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stage_tasks WHERE project_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, StageTask>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}
