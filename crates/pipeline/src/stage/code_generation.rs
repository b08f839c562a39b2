use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::Stage;
use applaude_core::survey::{resolve_questions, SurveyKind, SurveyQuestion};
use applaude_core::types::ProjectId;
use async_trait::async_trait;

use super::{begin, commit, Begin, StageDeps, StageError, StageHandler, StageOutcome};
use crate::artifacts::source_key;
use crate::prompts;

/// Generates the app source and stores it as an artifact.
///
/// Enabled surveys without questions get the default sets, which are
/// persisted with the artifact path so the project shows what the app asks.
pub struct CodeGenerationStage {
    deps: StageDeps,
}

impl CodeGenerationStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }
}

/// Questions to persist for one survey: only defaults that fill a gap.
fn filled_defaults(
    kind: SurveyKind,
    enabled: bool,
    stored: Option<&[SurveyQuestion]>,
) -> Option<Vec<SurveyQuestion>> {
    let stored_empty = stored.is_none_or(|q| q.is_empty());
    if enabled && stored_empty {
        resolve_questions(kind, enabled, stored)
    } else {
        None
    }
}

fn contains_survey_logic(source: &str) -> bool {
    source.to_ascii_lowercase().contains("survey")
}

#[async_trait]
impl StageHandler for CodeGenerationStage {
    fn stage(&self) -> Stage {
        Stage::CodeGeneration
    }

    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError> {
        let stage = self.stage();
        let project: Project = match begin(
            &self.deps,
            stage,
            project_id,
            "Generating production-ready code with advanced features...",
        )
        .await?
        {
            Begin::Run(project) => project,
            Begin::Skip(status) => return Ok(StageOutcome::Skipped { status }),
        };

        let ux = resolve_questions(
            SurveyKind::Ux,
            project.enable_ux_survey,
            project.ux_survey_questions.as_deref(),
        );
        let pmf = resolve_questions(
            SurveyKind::Pmf,
            project.enable_pmf_survey,
            project.pmf_survey_questions.as_deref(),
        );

        let prompt = prompts::code_generation(&project, ux.as_deref(), pmf.as_deref());
        let source = self.deps.generate(&prompt).await?;

        if project.any_survey_enabled() && !contains_survey_logic(&source) {
            return Err(StageError::MalformedOutput(
                "generated code does not include the requested survey logic".to_string(),
            ));
        }

        let location = self.deps.artifacts.put(&source_key(project_id), &source).await?;

        let change = ProjectChange {
            generated_code_path: Some(location),
            ux_survey_questions: filled_defaults(
                SurveyKind::Ux,
                project.enable_ux_survey,
                project.ux_survey_questions.as_deref(),
            ),
            pmf_survey_questions: filled_defaults(
                SurveyKind::Pmf,
                project.enable_pmf_survey,
                project.pmf_survey_questions.as_deref(),
            ),
            ..ProjectChange::status(
                stage.completion(),
                Some("Code generation complete. Preparing for QA..."),
            )
        };
        commit(&self.deps, stage, project_id, &change).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applaude_core::survey::default_pmf_questions;

    #[test]
    fn defaults_only_fill_enabled_empty_surveys() {
        assert!(filled_defaults(SurveyKind::Ux, false, None).is_none());
        assert_eq!(
            filled_defaults(SurveyKind::Pmf, true, Some(&[])),
            Some(default_pmf_questions())
        );

        let own = default_pmf_questions();
        assert!(filled_defaults(SurveyKind::Pmf, true, Some(&own[..1])).is_none());
    }

    #[test]
    fn survey_logic_detection_ignores_case() {
        assert!(contains_survey_logic("class UxSurveyScreen {}"));
        assert!(!contains_survey_logic("fn main() {}"));
    }
}
