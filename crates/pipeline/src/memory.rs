//! In-memory collaborators for tests and local runs without Postgres.
//!
//! Each mirrors the contract of its Postgres counterpart: the project store
//! serializes guarded updates behind one lock, and the queue dedupes live
//! tasks and redelivers expired leases.

use std::collections::HashMap;
use std::time::Duration;

use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::Stage;
use applaude_core::status::ProjectStatus;
use applaude_core::types::{DbId, ProjectId};
use applaude_events::ProjectStatusEvent;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::notify::StatusNotifier;
use crate::queue::{QueueError, QueuedTask, TaskQueue};
use crate::store::{validate_change, LockedUpdate, ProjectCheck, ProjectStore, StoreError};

// ---------------------------------------------------------------------------
// MemoryProjectStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ProjectTable {
    projects: HashMap<ProjectId, Project>,
    /// Every status each project has held, in commit order.
    history: HashMap<ProjectId, Vec<ProjectStatus>>,
}

#[derive(Default)]
pub struct MemoryProjectStore {
    table: Mutex<ProjectTable>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, project: Project) {
        let mut table = self.table.lock().await;
        table.history.insert(project.id, vec![project.status]);
        table.projects.insert(project.id, project);
    }

    pub async fn get(&self, id: ProjectId) -> Option<Project> {
        self.table.lock().await.projects.get(&id).cloned()
    }

    pub async fn remove(&self, id: ProjectId) -> Option<Project> {
        self.table.lock().await.projects.remove(&id)
    }

    /// Statuses `id` has held, starting with the inserted one.
    pub async fn status_history(&self, id: ProjectId) -> Vec<ProjectStatus> {
        self.table
            .lock()
            .await
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn find(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.table.lock().await.projects.get(&id).cloned())
    }

    async fn update_locked(
        &self,
        id: ProjectId,
        check: ProjectCheck<'_>,
        change: &ProjectChange,
    ) -> Result<LockedUpdate, StoreError> {
        let mut table = self.table.lock().await;
        let project = table.projects.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let previous = project.clone();
        if !check(&previous) {
            return Ok(LockedUpdate::Rejected(previous));
        }
        validate_change(&previous, change)?;
        change.apply(project);
        let project = project.clone();

        if project.status != previous.status {
            table.history.entry(id).or_default().push(project.status);
        }
        Ok(LockedUpdate::Applied { previous, project })
    }

    async fn list_idle(
        &self,
        statuses: &[ProjectStatus],
        idle_for: Duration,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError> {
        let idle_for = chrono::Duration::from_std(idle_for).unwrap_or(chrono::Duration::zero());
        let idle_since = chrono::Utc::now() - idle_for;
        let mut idle: Vec<Project> = self
            .table
            .lock()
            .await
            .projects
            .values()
            .filter(|p| statuses.contains(&p.status) && p.updated_at < idle_since)
            .cloned()
            .collect();
        idle.sort_by_key(|p| p.updated_at);
        idle.truncate(limit);
        Ok(idle)
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskQueue
// ---------------------------------------------------------------------------

/// Lifecycle of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTaskState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Inspectable copy of a task.
#[derive(Debug, Clone)]
pub struct MemoryTask {
    pub id: DbId,
    pub project_id: ProjectId,
    pub stage: Stage,
    pub state: MemoryTaskState,
    pub attempts: u32,
    pub run_after: Instant,
    pub lease_expires_at: Option<Instant>,
    pub last_error: Option<String>,
}

impl MemoryTask {
    fn is_live(&self) -> bool {
        matches!(self.state, MemoryTaskState::Queued | MemoryTaskState::Running)
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.state {
            MemoryTaskState::Queued => self.run_after <= now,
            MemoryTaskState::Running => self.lease_expires_at.is_some_and(|l| l < now),
            _ => false,
        }
    }
}

#[derive(Default)]
struct QueueState {
    next_id: DbId,
    tasks: Vec<MemoryTask>,
}

#[derive(Default)]
pub struct MemoryTaskQueue {
    state: Mutex<QueueState>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task ever enqueued, in insertion order.
    pub async fn tasks(&self) -> Vec<MemoryTask> {
        self.state.lock().await.tasks.clone()
    }

    /// Queued or running tasks.
    pub async fn live_tasks(&self) -> Vec<MemoryTask> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.is_live())
            .cloned()
            .collect()
    }

    /// Make every queued task due now, skipping retry delays.
    pub async fn make_all_due(&self) {
        let now = Instant::now();
        for task in self.state.lock().await.tasks.iter_mut() {
            if task.state == MemoryTaskState::Queued {
                task.run_after = now;
            }
        }
    }

    async fn with_task<F>(&self, task_id: DbId, f: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut MemoryTask) + Send,
    {
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| QueueError::InvalidTask {
                id: task_id,
                reason: "unknown task".to_string(),
            })?;
        f(task);
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, stage: Stage, project_id: ProjectId) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        let duplicate = state
            .tasks
            .iter()
            .any(|t| t.is_live() && t.project_id == project_id && t.stage == stage);
        if duplicate {
            return Ok(false);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.tasks.push(MemoryTask {
            id,
            project_id,
            stage,
            state: MemoryTaskState::Queued,
            attempts: 0,
            run_after: Instant::now(),
            lease_expires_at: None,
            last_error: None,
        });
        Ok(true)
    }

    async fn claim(&self, lease: Duration) -> Result<Option<QueuedTask>, QueueError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let Some(task) = state
            .tasks
            .iter_mut()
            .filter(|t| t.is_due(now))
            .min_by_key(|t| (t.run_after, t.id))
        else {
            return Ok(None);
        };

        task.state = MemoryTaskState::Running;
        task.attempts += 1;
        task.lease_expires_at = Some(now + lease);
        Ok(Some(QueuedTask {
            id: task.id,
            project_id: task.project_id,
            stage: task.stage,
            attempts: task.attempts,
        }))
    }

    async fn complete(&self, task_id: DbId) -> Result<(), QueueError> {
        self.with_task(task_id, |t| {
            t.state = MemoryTaskState::Completed;
            t.lease_expires_at = None;
        })
        .await
    }

    async fn retry_later(
        &self,
        task_id: DbId,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        let error = error.to_string();
        self.with_task(task_id, move |t| {
            t.state = MemoryTaskState::Queued;
            t.run_after = Instant::now() + delay;
            t.lease_expires_at = None;
            t.last_error = Some(error);
        })
        .await
    }

    async fn bury(&self, task_id: DbId, error: &str) -> Result<(), QueueError> {
        let error = error.to_string();
        self.with_task(task_id, move |t| {
            t.state = MemoryTaskState::Failed;
            t.lease_expires_at = None;
            t.last_error = Some(error);
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryArtifactStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &str, contents: &str) -> Result<String, ArtifactError> {
        self.files
            .lock()
            .await
            .insert(key.to_string(), contents.to_string());
        Ok(key.to_string())
    }

    async fn get(&self, location: &str) -> Result<String, ArtifactError> {
        self.files
            .lock()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(location.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Keeps every published event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProjectStatusEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProjectStatusEvent> {
        self.events.lock().await.clone()
    }

    /// Statuses published for one project, in order.
    pub async fn statuses_for(&self, project_id: ProjectId) -> Vec<ProjectStatus> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.project_id == project_id)
            .map(|e| e.status)
            .collect()
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn publish(&self, event: ProjectStatusEvent) {
        self.events.lock().await.push(event);
    }
}
