use std::sync::Arc;
use std::time::Duration;

use applaude_core::app_target::AppType;
use applaude_core::project::Project;
use applaude_core::status::ProjectStatus;
use applaude_pipeline::gateway::{GatewayError, LlmGateway, RetryPolicy};
use applaude_pipeline::memory::{
    MemoryArtifactStore, MemoryProjectStore, MemoryTaskQueue, RecordingNotifier,
};
use applaude_pipeline::{Orchestrator, StageDeps};
use applaude_worker::{WorkerConfig, WorkerPool};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Answers each stage with a minimal valid response.
struct StageAwareGateway;

#[async_trait]
impl LlmGateway for StageAwareGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let text = if prompt.starts_with("**Persona:** You are a brand designer") {
            r##"{"primary": "#112233", "secondary": "#445566", "text_light": "#FFFFFF", "text_dark": "#000000", "background": "#EEEEEE"}"##
        } else if prompt.starts_with("**Persona:** You are a meticulous QA") {
            "No issues.\nVERDICT: PASS"
        } else {
            "generated output"
        };
        Ok(text.to_string())
    }
}

fn test_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        poll_interval: Duration::from_millis(10),
        sweep_interval: Duration::from_secs(3600),
        ..WorkerConfig::from_lookup(|_| None)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_runs_project_to_completion_and_stops_on_cancel() {
    let store = Arc::new(MemoryProjectStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());
    let deps = StageDeps {
        store: store.clone(),
        gateway: Arc::new(StageAwareGateway),
        notifier: Arc::new(RecordingNotifier::new()),
        artifacts: Arc::new(MemoryArtifactStore::new()),
        retry: RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        },
    };
    let orchestrator = Arc::new(Orchestrator::new(deps, queue.clone()));

    let project = Project::new_pending(1, "Pool Test", "https://example.com", AppType::Both);
    let id = project.id;
    store.insert(project).await;
    orchestrator.start(id).await.unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(WorkerPool::new(orchestrator, &test_config()).run(cancel.clone()));

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if store.get(id).await.is_some_and(|p| p.status.is_terminal()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(finished.is_ok(), "pipeline did not finish");
    assert_eq!(store.get(id).await.unwrap().status, ProjectStatus::Completed);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pool stops after cancel")
        .unwrap();
    assert!(queue.live_tasks().await.is_empty());
}

#[tokio::test]
async fn idle_pool_stops_immediately() {
    let deps = StageDeps {
        store: Arc::new(MemoryProjectStore::new()),
        gateway: Arc::new(StageAwareGateway),
        notifier: Arc::new(RecordingNotifier::new()),
        artifacts: Arc::new(MemoryArtifactStore::new()),
        retry: RetryPolicy::default(),
    };
    let orchestrator = Arc::new(Orchestrator::new(deps, Arc::new(MemoryTaskQueue::new())));

    let cancel = CancellationToken::new();
    cancel.cancel();
    tokio::time::timeout(
        Duration::from_secs(5),
        WorkerPool::new(orchestrator, &test_config()).run(cancel),
    )
    .await
    .expect("pool exits when already cancelled");
}
