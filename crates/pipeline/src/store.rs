//! Persistent project store seam.
//!
//! Every pipeline mutation is a guarded update: the row is locked, a check
//! runs against the locked state, and the change is written only if the
//! check passes. Stage handlers use the check to express both their entry
//! precondition and the compare-and-set on their in-progress status.

use std::time::Duration;

use applaude_core::error::CoreError;
use applaude_core::project::{Project, ProjectChange};
use applaude_core::status::ProjectStatus;
use applaude_core::types::ProjectId;
use applaude_db::repositories::ProjectRepo;
use applaude_db::DbPool;
use async_trait::async_trait;

/// Predicate evaluated against the locked row.
pub type ProjectCheck<'a> = &'a (dyn Fn(&Project) -> bool + Send + Sync);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(ProjectId),

    /// The change would make an illegal status transition.
    #[error(transparent)]
    Transition(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of [`ProjectStore::update_locked`].
#[derive(Debug, Clone)]
pub enum LockedUpdate {
    /// The check passed and the change was committed.
    Applied { previous: Project, project: Project },
    /// The check failed; nothing was written. Carries the locked state.
    Rejected(Project),
}

impl LockedUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The project as it stands after the update attempt.
    pub fn into_project(self) -> Project {
        match self {
            Self::Applied { project, .. } | Self::Rejected(project) => project,
        }
    }
}

/// Validate a change's status against the locked project.
///
/// Writing the current status again is allowed and leaves it unchanged.
pub fn validate_change(current: &Project, change: &ProjectChange) -> Result<(), CoreError> {
    match change.status {
        Some(to) if to != current.status => current.status.validate_transition(to),
        _ => Ok(()),
    }
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Lock `id`, run `check`, and apply `change` if it passes, all in one
    /// transaction. Illegal status transitions fail with
    /// [`StoreError::Transition`] and write nothing.
    async fn update_locked(
        &self,
        id: ProjectId,
        check: ProjectCheck<'_>,
        change: &ProjectChange,
    ) -> Result<LockedUpdate, StoreError>;

    /// Projects resting in one of `statuses` for longer than `idle_for`.
    async fn list_idle(
        &self,
        statuses: &[ProjectStatus],
        idle_for: Duration,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError>;

    /// Unconditional status transition with an optional message.
    async fn transition(
        &self,
        id: ProjectId,
        to: ProjectStatus,
        message: Option<&str>,
    ) -> Result<Project, StoreError> {
        let change = ProjectChange::status(to, message);
        let update = self.update_locked(id, &|_: &Project| true, &change).await?;
        Ok(update.into_project())
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`ProjectStore`] over the `projects` table, using `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PgProjectStore {
    pool: DbPool,
}

impl PgProjectStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn find(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update_locked(
        &self,
        id: ProjectId,
        check: ProjectCheck<'_>,
        change: &ProjectChange,
    ) -> Result<LockedUpdate, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(previous) = ProjectRepo::lock_for_update(&mut tx, id).await? else {
            return Err(StoreError::NotFound(id));
        };

        if !check(&previous) {
            tx.rollback().await?;
            return Ok(LockedUpdate::Rejected(previous));
        }

        validate_change(&previous, change)?;
        let project = ProjectRepo::apply_change(&mut tx, id, change).await?;
        tx.commit().await?;

        Ok(LockedUpdate::Applied { previous, project })
    }

    async fn list_idle(
        &self,
        statuses: &[ProjectStatus],
        idle_for: Duration,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError> {
        let idle_for = chrono::Duration::from_std(idle_for).unwrap_or(chrono::Duration::zero());
        let idle_since = chrono::Utc::now() - idle_for;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(ProjectRepo::list_idle(&self.pool, statuses, idle_since, limit).await?)
    }
}
