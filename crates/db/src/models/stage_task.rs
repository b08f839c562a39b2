//! Stage task queue rows.

use applaude_core::error::CoreError;
use applaude_core::stage::Stage;
use applaude_core::types::{DbId, ProjectId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `stage_tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StageTask {
    pub id: DbId,
    pub project_id: ProjectId,
    pub stage: String,
    pub status_id: StatusId,
    /// Number of times the task has been claimed.
    pub attempts: i32,
    pub run_after: Timestamp,
    pub lease_expires_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StageTask {
    pub fn parsed_stage(&self) -> Result<Stage, CoreError> {
        self.stage.parse()
    }
}
