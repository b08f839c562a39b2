//! Handlers for the `/projects` resource.

use applaude_core::app_target::DeploymentOption;
use applaude_core::error::CoreError;
use applaude_core::project::{Project, ProjectChange};
use applaude_core::status::ProjectStatus;
use applaude_core::survey::validate_questions;
use applaude_core::types::{ProjectId, Timestamp};
use applaude_db::models::project::{CreateProject, ProjectListQuery};
use applaude_db::repositories::ProjectRepo;
use applaude_pipeline::store::LockedUpdate;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /api/v1/projects/{id}/deployment`.
#[derive(Debug, Deserialize)]
pub struct SetDeployment {
    pub deployment_option: DeploymentOption,
}

/// Lightweight progress view for polling clients.
#[derive(Debug, Serialize)]
pub struct ProjectStatusView {
    pub project_id: ProjectId,
    pub status: ProjectStatus,
    pub status_message: Option<String>,
    pub deployment_url: Option<String>,
    pub updated_at: Timestamp,
}

impl From<&Project> for ProjectStatusView {
    fn from(project: &Project) -> Self {
        Self {
            project_id: project.id,
            status: project.status,
            status_message: project.status_message.clone(),
            deployment_url: project.deployment_url.clone(),
            updated_at: project.updated_at,
        }
    }
}

/// The deployment target may change until the deployment stage starts.
fn deployment_open(project: &Project) -> bool {
    let cutoff = ProjectStatus::DeploymentPending.ordinal();
    project
        .status
        .ordinal()
        .is_some_and(|i| cutoff.is_some_and(|c| i < c))
}

async fn find_project(state: &AppState, id: ProjectId) -> AppResult<Project> {
    ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::project_not_found(id)))
}

/// POST /api/v1/projects
///
/// Creates a `PENDING` project and queues market analysis. A failed enqueue
/// is logged only; the idle sweep picks the project up later.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    input.validate()?;
    for questions in [&input.ux_survey_questions, &input.pmf_survey_questions]
        .into_iter()
        .flatten()
    {
        validate_questions(questions)?;
    }

    let project = ProjectRepo::create(&state.pool, &input).await?;
    tracing::info!(
        project_id = %project.id,
        owner_id = project.owner_id,
        app_type = %project.app_type,
        "Project created",
    );

    if let Err(e) = state.dispatcher.dispatch_next(project.id).await {
        tracing::warn!(project_id = %project.id, error = %e, "Failed to queue market analysis");
    }

    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ProjectListQuery>,
) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let projects = ProjectRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/projects/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<ProjectStatusView>>> {
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse {
        data: ProjectStatusView::from(&project),
    }))
}

/// PUT /api/v1/projects/{id}/deployment
///
/// Checked under the row lock, so it cannot interleave with the deployment
/// stage claiming the project.
pub async fn set_deployment(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(input): Json<SetDeployment>,
) -> AppResult<Json<DataResponse<Project>>> {
    let change = ProjectChange {
        deployment_option: Some(input.deployment_option),
        ..ProjectChange::default()
    };

    match state.store.update_locked(id, &deployment_open, &change).await? {
        LockedUpdate::Applied { project, .. } => {
            tracing::info!(
                project_id = %id,
                deployment_option = %input.deployment_option,
                "Deployment target updated",
            );
            Ok(Json(DataResponse { data: project }))
        }
        LockedUpdate::Rejected(project) => Err(AppError::Core(CoreError::Conflict(format!(
            "Deployment target can no longer change (status: {})",
            project.status
        )))),
    }
}

/// DELETE /api/v1/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<StatusCode> {
    if ProjectRepo::delete(&state.pool, id).await? {
        tracing::info!(project_id = %id, "Project deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::project_not_found(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applaude_core::app_target::AppType;

    fn at(status: ProjectStatus) -> Project {
        let mut project = Project::new_pending(1, "Demo", "https://example.com", AppType::Ios);
        project.status = status;
        project
    }

    #[test]
    fn deployment_is_open_before_the_deployment_stage() {
        assert!(deployment_open(&at(ProjectStatus::Pending)));
        assert!(deployment_open(&at(ProjectStatus::QaComplete)));
    }

    #[test]
    fn deployment_is_closed_once_started_or_terminal() {
        assert!(!deployment_open(&at(ProjectStatus::DeploymentPending)));
        assert!(!deployment_open(&at(ProjectStatus::Completed)));
        assert!(!deployment_open(&at(ProjectStatus::Failed)));
    }
}
