//! Next-stage dispatch.
//!
//! The project row is the pipeline state. The dispatcher reads it fresh and
//! enqueues whatever [`Stage::next_for`] says comes next, so no stage needs
//! to know its successor.

use std::sync::Arc;

use applaude_core::stage::Stage;
use applaude_core::types::ProjectId;

use crate::queue::{QueueError, TaskQueue};
use crate::store::{ProjectStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn ProjectStore>,
    queue: Arc<dyn TaskQueue>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ProjectStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Enqueue the next stage for `project_id`.
    ///
    /// Returns the stage that is now queued, or `None` for a missing or
    /// terminal project. A stage already queued or running counts as queued.
    pub async fn dispatch_next(&self, project_id: ProjectId) -> Result<Option<Stage>, DispatchError> {
        let Some(project) = self.store.find(project_id).await? else {
            tracing::warn!(project_id = %project_id, "Dispatch skipped, project not found");
            return Ok(None);
        };

        let Some(stage) = Stage::next_for(&project) else {
            tracing::debug!(
                project_id = %project_id,
                status = %project.status,
                "Nothing to dispatch",
            );
            return Ok(None);
        };

        let created = self.queue.enqueue(stage, project_id).await?;
        tracing::info!(
            project_id = %project_id,
            stage = %stage,
            created,
            "Stage dispatched",
        );
        Ok(Some(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryProjectStore, MemoryTaskQueue};
    use applaude_core::app_target::AppType;
    use applaude_core::project::Project;
    use applaude_core::status::ProjectStatus;

    async fn setup(status: ProjectStatus) -> (Dispatcher, Arc<MemoryTaskQueue>, ProjectId) {
        let store = Arc::new(MemoryProjectStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let mut project = Project::new_pending(1, "Demo", "https://example.com", AppType::Android);
        project.status = status;
        let id = project.id;
        store.insert(project).await;
        (Dispatcher::new(store, queue.clone()), queue, id)
    }

    #[tokio::test]
    async fn dispatches_stage_for_status() {
        let (dispatcher, queue, id) = setup(ProjectStatus::AnalysisComplete).await;
        assert_eq!(dispatcher.dispatch_next(id).await.unwrap(), Some(Stage::Design));

        let live = queue.live_tasks().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].stage, Stage::Design);
    }

    #[tokio::test]
    async fn repeated_dispatch_enqueues_once() {
        let (dispatcher, queue, id) = setup(ProjectStatus::Pending).await;
        dispatcher.dispatch_next(id).await.unwrap();
        dispatcher.dispatch_next(id).await.unwrap();
        assert_eq!(queue.live_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_and_missing_projects_dispatch_nothing() {
        let (dispatcher, queue, id) = setup(ProjectStatus::Completed).await;
        assert_eq!(dispatcher.dispatch_next(id).await.unwrap(), None);
        assert_eq!(
            dispatcher.dispatch_next(uuid::Uuid::now_v7()).await.unwrap(),
            None
        );
        assert!(queue.tasks().await.is_empty());
    }
}
