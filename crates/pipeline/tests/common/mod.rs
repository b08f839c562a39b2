#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use applaude_core::app_target::{AppType, DeploymentOption};
use applaude_core::project::Project;
use applaude_core::stage::Stage;
use applaude_core::types::ProjectId;
use applaude_pipeline::gateway::{GatewayError, LlmGateway, RetryPolicy};
use applaude_pipeline::memory::{
    MemoryArtifactStore, MemoryProjectStore, MemoryTaskQueue, RecordingNotifier,
};
use applaude_pipeline::orchestrator::{Orchestrator, TaskOutcome};
use applaude_pipeline::stage::StageDeps;
use async_trait::async_trait;

pub const PALETTE_JSON: &str = r##"{"primary": "#4A90E2", "secondary": "#F5A623", "text_light": "#FFFFFF", "text_dark": "#333333", "background": "#F8F9FA"}"##;

pub const PALETTE_WITHOUT_SECONDARY: &str = r##"Here is the palette:
```json
{"primary": "#4A90E2", "text_light": "#FFFFFF", "text_dark": "#333333", "background": "#F8F9FA"}
```"##;

pub const SOURCE_WITH_SURVEY: &str =
    "// app/src/main/java/ai/applaude/MainActivity.kt\nclass MainActivity {}\nclass SurveyScreen {}";

// ---------------------------------------------------------------------------
// Fake gateways
// ---------------------------------------------------------------------------

/// The stage a prompt was built for, read from its persona line.
pub fn stage_of(prompt: &str) -> Option<Stage> {
    let persona = prompt.lines().find(|l| l.starts_with("**Persona:**"))?;
    [
        (Stage::MarketAnalysis, "market research analyst"),
        (Stage::Design, "brand designer"),
        (Stage::CodeGeneration, "principal mobile engineer"),
        (Stage::Qa, "QA and security engineer"),
        (Stage::Deployment, "release engineer"),
    ]
    .into_iter()
    .find(|(_, role)| persona.contains(role))
    .map(|(stage, _)| stage)
}

/// Answers each prompt with the scripted text for its stage.
pub struct ScriptedGateway {
    responses: Mutex<HashMap<Stage, String>>,
    configured: bool,
    calls: AtomicU32,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let responses = HashMap::from([
            (
                Stage::MarketAnalysis,
                "# Persona\nBusy parent who orders groceries on the go.".to_string(),
            ),
            (Stage::Design, PALETTE_JSON.to_string()),
            (Stage::CodeGeneration, SOURCE_WITH_SURVEY.to_string()),
            (
                Stage::Qa,
                "## Findings\nNo blocking issues.\nVERDICT: PASS".to_string(),
            ),
            (
                Stage::Deployment,
                "Deployed.\nDownload: https://cdn.applaude.ai/apps/demo/app.apk".to_string(),
            ),
        ]);
        Self {
            responses: Mutex::new(responses),
            configured: true,
            calls: AtomicU32::new(0),
        }
    }

    /// A gateway with no model behind it.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn respond(self, stage: Stage, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(stage, text.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().unwrap();
        stage_of(prompt)
            .and_then(|stage| responses.get(&stage).cloned())
            .ok_or(GatewayError::EmptyResponse)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

/// Fails every call with a 503.
#[derive(Default)]
pub struct FailingGateway {
    calls: AtomicU32,
    body: Option<String>,
}

impl FailingGateway {
    pub fn with_body(body: String) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for FailingGateway {
    async fn generate(&self, _prompt: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::Api {
            status: 503,
            body: self
                .body
                .clone()
                .unwrap_or_else(|| "model overloaded".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// In-memory pipeline with direct access to every collaborator.
pub struct Harness {
    pub store: Arc<MemoryProjectStore>,
    pub queue: Arc<MemoryTaskQueue>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub deps: StageDeps,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        let store = Arc::new(MemoryProjectStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let deps = StageDeps {
            store: store.clone(),
            gateway,
            notifier: notifier.clone(),
            artifacts: artifacts.clone(),
            retry: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        };
        let orchestrator = Orchestrator::new(deps.clone(), queue.clone());

        Self {
            store,
            queue,
            artifacts,
            notifier,
            deps,
            orchestrator,
        }
    }

    pub fn with_orchestrator(mut self, f: impl FnOnce(Orchestrator) -> Orchestrator) -> Self {
        let orchestrator = Orchestrator::new(self.deps.clone(), self.queue.clone());
        self.orchestrator = f(orchestrator);
        self
    }

    pub async fn insert(&self, project: Project) -> ProjectId {
        let id = project.id;
        self.store.insert(project).await;
        id
    }

    pub async fn project(&self, id: ProjectId) -> Project {
        self.store.get(id).await.expect("project exists")
    }

    /// Process tasks until the queue has nothing live, skipping retry
    /// delays.
    pub async fn drain(&self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..100 {
            match self.orchestrator.claim_and_process().await.unwrap() {
                Some(outcome) => outcomes.push(outcome),
                None if self.queue.live_tasks().await.is_empty() => return outcomes,
                None => self.queue.make_all_due().await,
            }
        }
        panic!("queue did not drain: {outcomes:?}");
    }
}

pub fn project() -> Project {
    Project::new_pending(7, "Green Grocer", "https://greengrocer.example.com", AppType::Android)
}

pub fn project_deploying_to(option: DeploymentOption) -> Project {
    let mut p = project();
    p.deployment_option = option;
    p
}
