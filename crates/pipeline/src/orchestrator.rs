//! Task execution and settlement.
//!
//! The orchestrator runs one claimed stage task under its time limits and
//! settles it against the queue: success dispatches the next stage,
//! retryable failures go back to the queue, and anything else (or a retry
//! budget that ran out) fails the project.

use std::sync::Arc;
use std::time::Duration;

use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::{Stage, StageEntry};
use applaude_core::status::ProjectStatus;
use applaude_core::types::ProjectId;
use applaude_events::ProjectStatusEvent;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::notify::StatusNotifier;
use crate::queue::{QueueError, QueueRetryPolicy, QueuedTask, TaskQueue};
use crate::stage::{StageDeps, StageError, StageHandler, StageOutcome, StageRegistry};
use crate::store::{LockedUpdate, ProjectStore, StoreError};

/// Extra lease time beyond the hard limit, so a task is only redelivered
/// after its first run has certainly been aborted.
const LEASE_MARGIN: Duration = Duration::from_secs(30);

/// Projects examined per idle sweep.
const IDLE_SWEEP_LIMIT: usize = 100;

/// Longest failure text written to `status_message`. Status notifications
/// carry it through `pg_notify`, whose payload must stay under 8000 bytes.
const MAX_FAILURE_MESSAGE_CHARS: usize = 1000;

/// Cut `text` to at most `max` characters, marking the cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Per-task execution limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimits {
    /// Logged as a warning when exceeded; the run continues.
    pub soft: Duration,
    /// The run is aborted and treated as a retryable failure.
    pub hard: Duration,
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            soft: Duration::from_secs(240),
            hard: Duration::from_secs(300),
        }
    }
}

impl TimeLimits {
    /// Queue lease for a claimed task.
    pub fn lease(&self) -> Duration {
        self.hard + LEASE_MARGIN
    }
}

/// How a processed task was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The stage committed; `next` is the stage dispatched after it.
    Advanced {
        stage: Stage,
        status: ProjectStatus,
        next: Option<Stage>,
    },
    /// The project was ineligible or gone. The task is complete.
    Skipped { stage: Stage },
    /// Rescheduled after `delay`.
    Retrying {
        stage: Stage,
        attempts: u32,
        delay: Duration,
    },
    /// The project was moved to `FAILED` and the task buried.
    Failed { stage: Stage, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub struct Orchestrator {
    store: Arc<dyn ProjectStore>,
    queue: Arc<dyn TaskQueue>,
    notifier: Arc<dyn StatusNotifier>,
    dispatcher: Dispatcher,
    registry: StageRegistry,
    limits: TimeLimits,
    retry: QueueRetryPolicy,
}

impl Orchestrator {
    /// Orchestrator with the standard stage handlers over `deps`.
    pub fn new(deps: StageDeps, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store: deps.store.clone(),
            notifier: deps.notifier.clone(),
            dispatcher: Dispatcher::new(deps.store.clone(), queue.clone()),
            queue,
            registry: StageRegistry::new(deps),
            limits: TimeLimits::default(),
            retry: QueueRetryPolicy::default(),
        }
    }

    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_time_limits(mut self, limits: TimeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry_policy(mut self, retry: QueueRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn time_limits(&self) -> TimeLimits {
        self.limits
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Start the pipeline for a newly created project.
    pub async fn start(&self, project_id: ProjectId) -> Result<Option<Stage>, OrchestratorError> {
        Ok(self.dispatcher.dispatch_next(project_id).await?)
    }

    /// Claim and process one task. `None` when nothing is due.
    pub async fn claim_and_process(&self) -> Result<Option<TaskOutcome>, OrchestratorError> {
        let Some(task) = self.queue.claim(self.limits.lease()).await? else {
            return Ok(None);
        };
        self.process(&task).await.map(Some)
    }

    /// Run a claimed task and settle it.
    pub async fn process(&self, task: &QueuedTask) -> Result<TaskOutcome, OrchestratorError> {
        let stage = task.stage;
        let Some(handler) = self.registry.get(stage) else {
            tracing::error!(task_id = task.id, stage = %stage, "No handler registered");
            self.queue.bury(task.id, "no handler registered").await?;
            return Ok(TaskOutcome::Skipped { stage });
        };

        tracing::debug!(
            task_id = task.id,
            project_id = %task.project_id,
            stage = %stage,
            attempt = task.attempts,
            "Processing stage task",
        );

        match self.run_limited(handler.as_ref(), task.project_id).await {
            Ok(StageOutcome::Advanced { status }) => {
                self.queue.complete(task.id).await?;
                let next = match self.dispatcher.dispatch_next(task.project_id).await {
                    Ok(next) => next,
                    Err(e) => {
                        // The idle sweep re-dispatches it later.
                        tracing::error!(
                            project_id = %task.project_id,
                            error = %e,
                            "Failed to dispatch next stage",
                        );
                        None
                    }
                };
                Ok(TaskOutcome::Advanced {
                    stage,
                    status,
                    next,
                })
            }
            Ok(StageOutcome::Skipped { .. }) => {
                self.queue.complete(task.id).await?;
                Ok(TaskOutcome::Skipped { stage })
            }
            Err(StageError::NotFound(id)) => {
                tracing::warn!(project_id = %id, stage = %stage, "Project not found, dropping task");
                self.queue.complete(task.id).await?;
                Ok(TaskOutcome::Skipped { stage })
            }
            Err(e) if e.is_retryable() && self.retry.should_retry(task.attempts) => {
                let delay = self.retry.delay_for(task.attempts);
                tracing::warn!(
                    project_id = %task.project_id,
                    stage = %stage,
                    attempt = task.attempts,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "Stage failed, will retry",
                );
                self.queue.retry_later(task.id, delay, &e.to_string()).await?;
                Ok(TaskOutcome::Retrying {
                    stage,
                    attempts: task.attempts,
                    delay,
                })
            }
            Err(e) => {
                let message = truncate_chars(
                    &format!("{} failed: {e}", stage.label()),
                    MAX_FAILURE_MESSAGE_CHARS,
                );
                if !self.fail_project(stage, task.project_id, &message).await? {
                    tracing::info!(
                        project_id = %task.project_id,
                        stage = %stage,
                        error = %e,
                        "Stage failed after the project moved on, dropping task",
                    );
                    self.queue.complete(task.id).await?;
                    return Ok(TaskOutcome::Skipped { stage });
                }
                tracing::error!(
                    project_id = %task.project_id,
                    stage = %stage,
                    attempt = task.attempts,
                    error = %e,
                    "Stage failed permanently",
                );
                self.queue.bury(task.id, &message).await?;
                Ok(TaskOutcome::Failed { stage, message })
            }
        }
    }

    /// Re-dispatch projects that have rested in a non-terminal status for
    /// longer than `grace`. Returns how many were dispatched.
    pub async fn redispatch_idle(&self, grace: Duration) -> Result<usize, OrchestratorError> {
        let statuses: Vec<ProjectStatus> = ProjectStatus::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        let idle = self
            .store
            .list_idle(&statuses, grace, IDLE_SWEEP_LIMIT)
            .await?;

        let mut dispatched = 0;
        for project in idle {
            match self.dispatcher.dispatch_next(project.id).await {
                Ok(Some(_)) => dispatched += 1,
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    project_id = %project.id,
                    error = %e,
                    "Idle re-dispatch failed",
                ),
            }
        }
        if dispatched > 0 {
            tracing::info!(dispatched, "Re-dispatched idle projects");
        }
        Ok(dispatched)
    }

    async fn run_limited(
        &self,
        handler: &dyn StageHandler,
        project_id: ProjectId,
    ) -> Result<StageOutcome, StageError> {
        let run = handler.execute(project_id);
        tokio::pin!(run);
        let soft = tokio::time::sleep(self.limits.soft);
        tokio::pin!(soft);
        let hard = tokio::time::sleep(self.limits.hard);
        tokio::pin!(hard);
        let mut warned = false;

        loop {
            tokio::select! {
                result = &mut run => return result,
                _ = &mut soft, if !warned => {
                    warned = true;
                    tracing::warn!(
                        project_id = %project_id,
                        stage = %handler.stage(),
                        soft_limit_secs = self.limits.soft.as_secs(),
                        "Stage exceeded soft time limit",
                    );
                }
                _ = &mut hard => {
                    tracing::error!(
                        project_id = %project_id,
                        stage = %handler.stage(),
                        hard_limit_secs = self.limits.hard.as_secs(),
                        "Stage exceeded hard time limit, aborting",
                    );
                    return Err(StageError::TimedOut(self.limits.hard.as_secs()));
                }
            }
        }
    }

    /// Move the project to `FAILED` if it is still in `stage`. Returns
    /// `false` when another delivery already took it past the stage, or it
    /// is gone.
    async fn fail_project(
        &self,
        stage: Stage,
        project_id: ProjectId,
        message: &str,
    ) -> Result<bool, StoreError> {
        let change = ProjectChange::status(ProjectStatus::Failed, Some(message));
        let still_in_stage = |p: &Project| stage.entry(p) != StageEntry::Skip;
        let update = self
            .store
            .update_locked(project_id, &still_in_stage, &change)
            .await;

        match update {
            Ok(LockedUpdate::Applied { project, .. }) => {
                self.notifier
                    .publish(ProjectStatusEvent::from_project(&project))
                    .await;
                Ok(true)
            }
            Ok(LockedUpdate::Rejected(project)) => {
                tracing::info!(
                    project_id = %project_id,
                    stage = %stage,
                    status = %project.status,
                    "Project no longer in this stage, not marking failed",
                );
                Ok(false)
            }
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
