//! Repository for the `projects` table.
//!
//! Pipeline mutations go through [`ProjectRepo::lock_for_update`] followed by
//! [`ProjectRepo::apply_change`] inside one transaction, so concurrent stage
//! runs on the same project are serialized by the row lock.

use applaude_core::project::{Project, ProjectChange};
use applaude_core::status::ProjectStatus;
use applaude_core::types::{ProjectId, Timestamp};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::project::{decode_row, CreateProject, ProjectListQuery, ProjectRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, owner_id, name, source_url, app_type, deployment_option, \
    enable_ux_survey, enable_pmf_survey, ux_survey_questions, pmf_survey_questions, \
    status, status_message, user_persona_document, brand_palette, \
    generated_code_path, qa_report, deployment_report, deployment_url, \
    created_at, updated_at";

/// Maximum page size for project listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for project listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides persistence operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new `PENDING` project, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects \
                 (id, owner_id, name, source_url, app_type, deployment_option, \
                  enable_ux_survey, enable_pmf_survey, ux_survey_questions, pmf_survey_questions, \
                  status, status_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(input.owner_id)
            .bind(input.name.trim())
            .bind(&input.source_url)
            .bind(input.app_type.as_str())
            .bind(input.deployment_option.as_str())
            .bind(input.enable_ux_survey)
            .bind(input.enable_pmf_survey)
            .bind(input.ux_survey_questions.as_ref().map(Json))
            .bind(input.pmf_survey_questions.as_ref().map(Json))
            .bind(ProjectStatus::Pending.as_str())
            .bind("Project created")
            .fetch_one(pool)
            .await?;
        decode_row(row)
    }

    /// Find a project by id.
    pub async fn find_by_id(pool: &PgPool, id: ProjectId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(decode_row)
            .transpose()
    }

    /// List projects, newest first, optionally filtered by owner.
    pub async fn list(pool: &PgPool, params: &ProjectListQuery) -> Result<Vec<Project>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM projects \
             WHERE ($1::BIGINT IS NULL OR owner_id = $1) \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(params.owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    /// Delete a project and its queued tasks. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: ProjectId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Read a project and hold its row lock until the caller's transaction ends.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: ProjectId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(decode_row)
            .transpose()
    }

    /// Write the non-`None` fields of `change`. The caller is expected to hold
    /// the row lock and to have validated any status transition.
    pub async fn apply_change(
        conn: &mut PgConnection,
        id: ProjectId,
        change: &ProjectChange,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET \
                 status = COALESCE($2, status), \
                 status_message = COALESCE($3, status_message), \
                 deployment_option = COALESCE($4, deployment_option), \
                 ux_survey_questions = COALESCE($5, ux_survey_questions), \
                 pmf_survey_questions = COALESCE($6, pmf_survey_questions), \
                 user_persona_document = COALESCE($7, user_persona_document), \
                 brand_palette = COALESCE($8, brand_palette), \
                 generated_code_path = COALESCE($9, generated_code_path), \
                 qa_report = COALESCE($10, qa_report), \
                 deployment_report = COALESCE($11, deployment_report), \
                 deployment_url = COALESCE($12, deployment_url), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(change.status.map(ProjectStatus::as_str))
            .bind(change.status_message.as_deref())
            .bind(change.deployment_option.map(|o| o.as_str()))
            .bind(change.ux_survey_questions.as_ref().map(Json))
            .bind(change.pmf_survey_questions.as_ref().map(Json))
            .bind(change.user_persona_document.as_deref())
            .bind(change.brand_palette.as_ref().map(Json))
            .bind(change.generated_code_path.as_deref())
            .bind(change.qa_report.as_deref())
            .bind(change.deployment_report.as_deref())
            .bind(change.deployment_url.as_deref())
            .fetch_one(&mut *conn)
            .await?;
        decode_row(row)
    }

    /// Projects resting in one of `statuses` since before `idle_since`,
    /// oldest first.
    pub async fn list_idle(
        pool: &PgPool,
        statuses: &[ProjectStatus],
        idle_since: Timestamp,
        limit: i64,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM projects \
             WHERE status = ANY($1) AND updated_at < $2 \
             ORDER BY updated_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(statuses)
            .bind(idle_since)
            .bind(limit)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(decode_row)
            .collect()
    }
}
