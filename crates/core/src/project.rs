//! The `Project` entity as seen by the pipeline.

use serde::{Deserialize, Serialize};

use crate::app_target::{AppType, DeploymentOption};
use crate::palette::BrandPalette;
use crate::status::ProjectStatus;
use crate::survey::SurveyQuestion;
use crate::types::{DbId, ProjectId, Timestamp};

/// One requested mobile-app build and everything generated for it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: DbId,
    pub name: String,
    pub source_url: String,
    pub app_type: AppType,
    pub deployment_option: DeploymentOption,
    pub enable_ux_survey: bool,
    pub enable_pmf_survey: bool,
    pub ux_survey_questions: Option<Vec<SurveyQuestion>>,
    pub pmf_survey_questions: Option<Vec<SurveyQuestion>>,
    pub status: ProjectStatus,
    pub status_message: Option<String>,
    pub user_persona_document: Option<String>,
    pub brand_palette: Option<BrandPalette>,
    pub generated_code_path: Option<String>,
    pub qa_report: Option<String>,
    pub deployment_report: Option<String>,
    pub deployment_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// A fresh `PENDING` project with nothing generated yet.
    pub fn new_pending(owner_id: DbId, name: &str, source_url: &str, app_type: AppType) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            owner_id,
            name: name.to_string(),
            source_url: source_url.to_string(),
            app_type,
            deployment_option: DeploymentOption::default(),
            enable_ux_survey: false,
            enable_pmf_survey: false,
            ux_survey_questions: None,
            pmf_survey_questions: None,
            status: ProjectStatus::Pending,
            status_message: None,
            user_persona_document: None,
            brand_palette: None,
            generated_code_path: None,
            qa_report: None,
            deployment_report: None,
            deployment_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_code_artifact(&self) -> bool {
        self.generated_code_path
            .as_deref()
            .is_some_and(|path| !path.is_empty())
    }

    pub fn any_survey_enabled(&self) -> bool {
        self.enable_ux_survey || self.enable_pmf_survey
    }
}

/// A set of field updates applied to a project under its row lock.
///
/// `None` leaves a field unchanged. Generated artifacts are write-once from the
/// pipeline's point of view, so there is no way to clear them here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectChange {
    pub status: Option<ProjectStatus>,
    pub status_message: Option<String>,
    pub deployment_option: Option<DeploymentOption>,
    pub ux_survey_questions: Option<Vec<SurveyQuestion>>,
    pub pmf_survey_questions: Option<Vec<SurveyQuestion>>,
    pub user_persona_document: Option<String>,
    pub brand_palette: Option<BrandPalette>,
    pub generated_code_path: Option<String>,
    pub qa_report: Option<String>,
    pub deployment_report: Option<String>,
    pub deployment_url: Option<String>,
}

impl ProjectChange {
    /// Move to `to`, with `message` or a default derived from the status.
    pub fn status(to: ProjectStatus, message: Option<&str>) -> Self {
        Self {
            status: Some(to),
            status_message: Some(
                message
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Status: {}", to.label())),
            ),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory project. Does not validate the transition.
    pub fn apply(&self, project: &mut Project) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        set(&mut project.status, &self.status);
        set_opt(&mut project.status_message, &self.status_message);
        set(&mut project.deployment_option, &self.deployment_option);
        set_opt(&mut project.ux_survey_questions, &self.ux_survey_questions);
        set_opt(&mut project.pmf_survey_questions, &self.pmf_survey_questions);
        set_opt(&mut project.user_persona_document, &self.user_persona_document);
        set_opt(&mut project.brand_palette, &self.brand_palette);
        set_opt(&mut project.generated_code_path, &self.generated_code_path);
        set_opt(&mut project.qa_report, &self.qa_report);
        set_opt(&mut project.deployment_report, &self.deployment_report);
        set_opt(&mut project.deployment_url, &self.deployment_url);
        project.updated_at = chrono::Utc::now();
    }
}
