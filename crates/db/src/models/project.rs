//! Project rows and DTOs.

use applaude_core::app_target::{AppType, DeploymentOption};
use applaude_core::error::CoreError;
use applaude_core::palette::BrandPalette;
use applaude_core::project::Project;
use applaude_core::survey::SurveyQuestion;
use applaude_core::types::{DbId, ProjectId, Timestamp};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `projects` table, with enum columns still as text.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: ProjectId,
    pub owner_id: DbId,
    pub name: String,
    pub source_url: String,
    pub app_type: String,
    pub deployment_option: String,
    pub enable_ux_survey: bool,
    pub enable_pmf_survey: bool,
    pub ux_survey_questions: Option<Json<Vec<SurveyQuestion>>>,
    pub pmf_survey_questions: Option<Json<Vec<SurveyQuestion>>>,
    pub status: String,
    pub status_message: Option<String>,
    pub user_persona_document: Option<String>,
    pub brand_palette: Option<Json<BrandPalette>>,
    pub generated_code_path: Option<String>,
    pub qa_report: Option<String>,
    pub deployment_report: Option<String>,
    pub deployment_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ProjectRow> for Project {
    type Error = CoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            source_url: row.source_url,
            app_type: row.app_type.parse()?,
            deployment_option: row.deployment_option.parse()?,
            enable_ux_survey: row.enable_ux_survey,
            enable_pmf_survey: row.enable_pmf_survey,
            ux_survey_questions: row.ux_survey_questions.map(|j| j.0),
            pmf_survey_questions: row.pmf_survey_questions.map(|j| j.0),
            status: row.status.parse()?,
            status_message: row.status_message,
            user_persona_document: row.user_persona_document,
            brand_palette: row.brand_palette.map(|j| j.0),
            generated_code_path: row.generated_code_path,
            qa_report: row.qa_report,
            deployment_report: row.deployment_report,
            deployment_url: row.deployment_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert a fetched row, reporting bad enum text as a decode error.
pub fn decode_row(row: ProjectRow) -> Result<Project, sqlx::Error> {
    Project::try_from(row).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// DTO for `POST /api/v1/projects`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProject {
    pub owner_id: DbId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(url)]
    pub source_url: String,
    #[serde(default)]
    pub app_type: AppType,
    #[serde(default)]
    pub deployment_option: DeploymentOption,
    #[serde(default)]
    pub enable_ux_survey: bool,
    #[serde(default)]
    pub enable_pmf_survey: bool,
    pub ux_survey_questions: Option<Vec<SurveyQuestion>>,
    pub pmf_survey_questions: Option<Vec<SurveyQuestion>>,
}

/// Query parameters for `GET /api/v1/projects`.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub owner_id: Option<DbId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
