//! Stage handlers.
//!
//! Every handler follows the same shape:
//!
//! 1. Lock the project and decide entry ([`Stage::entry`]). A fresh entry
//!    moves to the stage's in-progress status and notifies; a resumed entry
//!    carries on from the in-progress status a failed attempt left behind;
//!    anything else is a silent skip.
//! 2. Generate through the gateway and parse the result.
//! 3. Commit the generated fields and the completion status, guarded by the
//!    in-progress status so a racing duplicate can only commit once.

mod code_generation;
mod deployment;
mod design;
mod market_analysis;
mod qa;

use std::collections::HashMap;
use std::sync::Arc;

use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::{Stage, StageEntry};
use applaude_core::status::ProjectStatus;
use applaude_core::types::ProjectId;
use applaude_events::ProjectStatusEvent;
use async_trait::async_trait;

use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::gateway::{generate_with_retry, GatewayError, LlmGateway, RetryPolicy};
use crate::notify::StatusNotifier;
use crate::store::{LockedUpdate, ProjectStore, StoreError};

pub use code_generation::CodeGenerationStage;
pub use deployment::{default_deployment_url, DeploymentStage};
pub use design::DesignStage;
pub use market_analysis::MarketAnalysisStage;
pub use qa::{parse_verdict, QaStage, QaVerdict, SIMULATED_QA_REPORT};

// ---------------------------------------------------------------------------
// Outcome and errors
// ---------------------------------------------------------------------------

/// What a stage run did to its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage committed and the project now rests in `status`.
    Advanced { status: ProjectStatus },
    /// The project was not eligible; nothing was written.
    Skipped { status: ProjectStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Project not found: {0}")]
    NotFound(ProjectId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Generated text could not be used. Regenerating from the same prompt
    /// is not expected to help.
    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),

    #[error("QA rejected the generated code: {0}")]
    QaRejected(String),

    #[error("Exceeded hard time limit of {0}s")]
    TimedOut(u64),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl From<StoreError> for StageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl StageError {
    /// Whether the queue should run the task again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(_) | Self::TimedOut(_) => true,
            Self::Store(StoreError::Database(_)) => true,
            Self::Artifact(ArtifactError::Io(_)) => true,
            Self::NotFound(_)
            | Self::MalformedOutput(_)
            | Self::QaRejected(_)
            | Self::Store(_)
            | Self::Artifact(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Handler trait and dependencies
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;

    /// Run the stage for `project_id`, re-reading the project under lock.
    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError>;
}

/// Collaborators shared by every stage.
#[derive(Clone)]
pub struct StageDeps {
    pub store: Arc<dyn ProjectStore>,
    pub gateway: Arc<dyn LlmGateway>,
    pub notifier: Arc<dyn StatusNotifier>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub retry: RetryPolicy,
}

impl StageDeps {
    pub(crate) async fn generate(&self, prompt: &str) -> Result<String, StageError> {
        Ok(generate_with_retry(self.gateway.as_ref(), prompt, &self.retry).await?)
    }

    pub(crate) async fn notify(&self, project: &Project) {
        self.notifier
            .publish(ProjectStatusEvent::from_project(project))
            .await;
    }
}

/// Whether a stage should do its work.
pub(crate) enum Begin {
    Run(Project),
    Skip(ProjectStatus),
}

/// Enter `stage`: move a fresh project to the in-progress status with
/// `message`, or pick up one a previous attempt left in progress.
pub(crate) async fn begin(
    deps: &StageDeps,
    stage: Stage,
    project_id: ProjectId,
    message: &str,
) -> Result<Begin, StageError> {
    let change = ProjectChange::status(stage.in_progress(), Some(message));
    let update = deps
        .store
        .update_locked(
            project_id,
            &|p: &Project| stage.entry(p) == StageEntry::Fresh,
            &change,
        )
        .await?;

    match update {
        LockedUpdate::Applied { project, .. } => {
            tracing::info!(project_id = %project_id, stage = %stage, "Stage started");
            deps.notify(&project).await;
            Ok(Begin::Run(project))
        }
        LockedUpdate::Rejected(project) => match stage.entry(&project) {
            StageEntry::Resume => {
                tracing::info!(project_id = %project_id, stage = %stage, "Stage resumed");
                Ok(Begin::Run(project))
            }
            _ => {
                tracing::info!(
                    project_id = %project_id,
                    stage = %stage,
                    status = %project.status,
                    "Stage skipped, project not eligible",
                );
                Ok(Begin::Skip(project.status))
            }
        },
    }
}

/// Commit `change` if the project is still in `stage`'s in-progress state.
pub(crate) async fn commit(
    deps: &StageDeps,
    stage: Stage,
    project_id: ProjectId,
    change: &ProjectChange,
) -> Result<StageOutcome, StageError> {
    let update = deps
        .store
        .update_locked(
            project_id,
            &|p: &Project| stage.entry(p) == StageEntry::Resume,
            change,
        )
        .await?;

    match update {
        LockedUpdate::Applied { project, .. } => {
            tracing::info!(
                project_id = %project_id,
                stage = %stage,
                status = %project.status,
                "Stage committed",
            );
            deps.notify(&project).await;
            Ok(StageOutcome::Advanced {
                status: project.status,
            })
        }
        LockedUpdate::Rejected(project) => {
            tracing::info!(
                project_id = %project_id,
                stage = %stage,
                status = %project.status,
                "Stage result discarded, project moved on",
            );
            Ok(StageOutcome::Skipped {
                status: project.status,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Handler per stage.
#[derive(Clone)]
pub struct StageRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl StageRegistry {
    /// The five standard handlers over `deps`.
    pub fn new(deps: StageDeps) -> Self {
        let handlers: [Arc<dyn StageHandler>; 5] = [
            Arc::new(MarketAnalysisStage::new(deps.clone())),
            Arc::new(DesignStage::new(deps.clone())),
            Arc::new(CodeGenerationStage::new(deps.clone())),
            Arc::new(QaStage::new(deps.clone())),
            Arc::new(DeploymentStage::new(deps)),
        ];
        Self {
            handlers: handlers.into_iter().map(|h| (h.stage(), h)).collect(),
        }
    }

    /// Replace the handler for its stage.
    pub fn with_handler(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(handler.stage(), handler);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }
}
