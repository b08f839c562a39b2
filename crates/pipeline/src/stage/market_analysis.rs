use applaude_core::project::ProjectChange;
use applaude_core::stage::Stage;
use applaude_core::types::ProjectId;
use async_trait::async_trait;

use super::{begin, commit, Begin, StageDeps, StageError, StageHandler, StageOutcome};
use crate::prompts;

/// Produces the user persona document.
pub struct MarketAnalysisStage {
    deps: StageDeps,
}

impl MarketAnalysisStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageHandler for MarketAnalysisStage {
    fn stage(&self) -> Stage {
        Stage::MarketAnalysis
    }

    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError> {
        let stage = self.stage();
        let project = match begin(
            &self.deps,
            stage,
            project_id,
            "Analyzing market and target user...",
        )
        .await?
        {
            Begin::Run(project) => project,
            Begin::Skip(status) => return Ok(StageOutcome::Skipped { status }),
        };

        let persona = self.deps.generate(&prompts::market_analysis(&project)).await?;

        let change = ProjectChange {
            user_persona_document: Some(persona.trim().to_string()),
            ..ProjectChange::status(
                stage.completion(),
                Some("Market analysis complete. Comprehensive user persona generated."),
            )
        };
        commit(&self.deps, stage, project_id, &change).await
    }
}
