use applaude_core::palette::parse_palette;
use applaude_core::project::ProjectChange;
use applaude_core::stage::Stage;
use applaude_core::types::ProjectId;
use async_trait::async_trait;

use super::{begin, commit, Begin, StageDeps, StageError, StageHandler, StageOutcome};
use crate::prompts;

/// Derives the five-role brand palette.
pub struct DesignStage {
    deps: StageDeps,
}

impl DesignStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageHandler for DesignStage {
    fn stage(&self) -> Stage {
        Stage::Design
    }

    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError> {
        let stage = self.stage();
        let project = match begin(
            &self.deps,
            stage,
            project_id,
            "Analyzing website for design elements and brand palette...",
        )
        .await?
        {
            Begin::Run(project) => project,
            Begin::Skip(status) => return Ok(StageOutcome::Skipped { status }),
        };

        let output = self.deps.generate(&prompts::design(&project)).await?;
        let parsed =
            parse_palette(&output).map_err(|e| StageError::MalformedOutput(e.to_string()))?;

        if !parsed.defaulted.is_empty() {
            let roles: Vec<&str> = parsed.defaulted.iter().map(|r| r.key()).collect();
            tracing::warn!(
                project_id = %project_id,
                roles = ?roles,
                "Palette roles missing or invalid, using defaults",
            );
        }

        let change = ProjectChange {
            brand_palette: Some(parsed.palette),
            ..ProjectChange::status(
                stage.completion(),
                Some("Design analysis complete. Brand palette generated."),
            )
        };
        commit(&self.deps, stage, project_id, &change).await
    }
}
