//! Project status enumeration and its state machine.
//!
//! The string forms are the exact values stored in `projects.status` and
//! exchanged with clients, so they must never change.
//!
//! Transitions follow the pipeline order one step at a time. `FAILED` can be
//! reached from any non-terminal status, and a project whose owner chose no
//! deployment target may go straight from `QA_COMPLETE` to `COMPLETED`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Pending,
    AnalysisPending,
    AnalysisComplete,
    DesignPending,
    DesignComplete,
    CodeGeneration,
    QaPending,
    QaComplete,
    DeploymentPending,
    Completed,
    Failed,
}

/// The non-failure statuses in pipeline order.
pub const PIPELINE_ORDER: [ProjectStatus; 10] = [
    ProjectStatus::Pending,
    ProjectStatus::AnalysisPending,
    ProjectStatus::AnalysisComplete,
    ProjectStatus::DesignPending,
    ProjectStatus::DesignComplete,
    ProjectStatus::CodeGeneration,
    ProjectStatus::QaPending,
    ProjectStatus::QaComplete,
    ProjectStatus::DeploymentPending,
    ProjectStatus::Completed,
];

impl ProjectStatus {
    /// Every status, including `FAILED`.
    pub const ALL: [ProjectStatus; 11] = [
        Self::Pending,
        Self::AnalysisPending,
        Self::AnalysisComplete,
        Self::DesignPending,
        Self::DesignComplete,
        Self::CodeGeneration,
        Self::QaPending,
        Self::QaComplete,
        Self::DeploymentPending,
        Self::Completed,
        Self::Failed,
    ];

    /// Return the wire-format string for this variant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::AnalysisPending => "ANALYSIS_PENDING",
            Self::AnalysisComplete => "ANALYSIS_COMPLETE",
            Self::DesignPending => "DESIGN_PENDING",
            Self::DesignComplete => "DESIGN_COMPLETE",
            Self::CodeGeneration => "CODE_GENERATION",
            Self::QaPending => "QA_PENDING",
            Self::QaComplete => "QA_COMPLETE",
            Self::DeploymentPending => "DEPLOYMENT_PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Human readable label, used in default status messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::AnalysisPending => "Analysis Pending",
            Self::AnalysisComplete => "Analysis Complete",
            Self::DesignPending => "Design Pending",
            Self::DesignComplete => "Design Complete",
            Self::CodeGeneration => "Code Generation",
            Self::QaPending => "QA Pending",
            Self::QaComplete => "QA Complete",
            Self::DeploymentPending => "Deployment Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// `COMPLETED` and `FAILED` end the pipeline.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in [`PIPELINE_ORDER`]. `FAILED` has no position.
    pub fn ordinal(self) -> Option<usize> {
        PIPELINE_ORDER.iter().position(|s| *s == self)
    }

    /// The immediate successor in pipeline order, if any.
    pub fn successor(self) -> Option<ProjectStatus> {
        self.ordinal()
            .and_then(|i| PIPELINE_ORDER.get(i + 1))
            .copied()
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: ProjectStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == Self::Failed {
            return true;
        }
        if self == Self::QaComplete && to == Self::Completed {
            return true;
        }
        self.successor() == Some(to)
    }

    /// Validate a transition, returning [`CoreError::InvalidTransition`] for
    /// anything other than the immediate successor or the allowed shortcuts.
    pub fn validate_transition(self, to: ProjectStatus) -> Result<(), CoreError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Invalid project status: '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
