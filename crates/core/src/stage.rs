//! Pipeline stages and the statuses that gate them.
//!
//! Each stage owns three statuses: the precondition it starts from, the
//! in-progress status it holds while working, and the status it commits on
//! success. Code generation is the exception: it has no `_COMPLETE` status,
//! so a stored artifact path is what marks it done.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::project::Project;
use crate::status::ProjectStatus;

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MarketAnalysis,
    Design,
    CodeGeneration,
    Qa,
    Deployment,
}

/// How a stage should treat a project it was asked to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEntry {
    /// Precondition met; move to the in-progress status and start.
    Fresh,
    /// Already in this stage's in-progress status; a previous attempt died.
    Resume,
    /// Out of order, already done, or terminal. Do nothing.
    Skip,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::MarketAnalysis,
        Self::Design,
        Self::CodeGeneration,
        Self::Qa,
        Self::Deployment,
    ];

    /// Queue name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarketAnalysis => "market_analysis",
            Self::Design => "design",
            Self::CodeGeneration => "code_generation",
            Self::Qa => "qa",
            Self::Deployment => "deployment",
        }
    }

    /// Label used in status messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::MarketAnalysis => "Market analysis",
            Self::Design => "Design",
            Self::CodeGeneration => "Code generation",
            Self::Qa => "QA",
            Self::Deployment => "Deployment",
        }
    }

    pub fn precondition(self) -> ProjectStatus {
        match self {
            Self::MarketAnalysis => ProjectStatus::Pending,
            Self::Design => ProjectStatus::AnalysisComplete,
            Self::CodeGeneration => ProjectStatus::DesignComplete,
            Self::Qa => ProjectStatus::CodeGeneration,
            Self::Deployment => ProjectStatus::QaComplete,
        }
    }

    pub fn in_progress(self) -> ProjectStatus {
        match self {
            Self::MarketAnalysis => ProjectStatus::AnalysisPending,
            Self::Design => ProjectStatus::DesignPending,
            Self::CodeGeneration => ProjectStatus::CodeGeneration,
            Self::Qa => ProjectStatus::QaPending,
            Self::Deployment => ProjectStatus::DeploymentPending,
        }
    }

    pub fn completion(self) -> ProjectStatus {
        match self {
            Self::MarketAnalysis => ProjectStatus::AnalysisComplete,
            Self::Design => ProjectStatus::DesignComplete,
            Self::CodeGeneration => ProjectStatus::CodeGeneration,
            Self::Qa => ProjectStatus::QaComplete,
            Self::Deployment => ProjectStatus::Completed,
        }
    }

    /// Decide whether this stage may act on `project` in its current state.
    pub fn entry(self, project: &Project) -> StageEntry {
        let status = project.status;
        if status.is_terminal() {
            return StageEntry::Skip;
        }
        match self {
            // Precondition and in-progress status coincide; the artifact
            // tells a fresh run from a finished one.
            Self::CodeGeneration => match status {
                ProjectStatus::DesignComplete => StageEntry::Fresh,
                ProjectStatus::CodeGeneration if !project.has_code_artifact() => {
                    StageEntry::Resume
                }
                _ => StageEntry::Skip,
            },
            Self::Qa => match status {
                ProjectStatus::CodeGeneration if project.has_code_artifact() => StageEntry::Fresh,
                ProjectStatus::QaPending => StageEntry::Resume,
                _ => StageEntry::Skip,
            },
            _ if status == self.precondition() => StageEntry::Fresh,
            _ if status == self.in_progress() => StageEntry::Resume,
            _ => StageEntry::Skip,
        }
    }

    /// The stage that should run next for `project`, if any.
    ///
    /// In-progress statuses map to their own stage so an interrupted run can
    /// be re-dispatched.
    pub fn next_for(project: &Project) -> Option<Stage> {
        match project.status {
            ProjectStatus::Pending | ProjectStatus::AnalysisPending => Some(Self::MarketAnalysis),
            ProjectStatus::AnalysisComplete | ProjectStatus::DesignPending => Some(Self::Design),
            ProjectStatus::DesignComplete => Some(Self::CodeGeneration),
            ProjectStatus::CodeGeneration if project.has_code_artifact() => Some(Self::Qa),
            ProjectStatus::CodeGeneration => Some(Self::CodeGeneration),
            ProjectStatus::QaPending => Some(Self::Qa),
            ProjectStatus::QaComplete | ProjectStatus::DeploymentPending => {
                Some(Self::Deployment)
            }
            ProjectStatus::Completed | ProjectStatus::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown stage: '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
