//! The status-change payload published for every project transition.

use applaude_core::project::Project;
use applaude_core::status::ProjectStatus;
use applaude_core::status_events::MSG_TYPE_PROJECT_STATUS;
use applaude_core::types::{ProjectId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Snapshot of a project's progress at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatusEvent {
    pub project_id: ProjectId,
    pub status: ProjectStatus,
    pub status_message: Option<String>,
    pub deployment_url: Option<String>,
    pub timestamp: Timestamp,
}

impl ProjectStatusEvent {
    pub fn new(project_id: ProjectId, status: ProjectStatus, message: Option<&str>) -> Self {
        Self {
            project_id,
            status,
            status_message: message.map(str::to_string),
            deployment_url: None,
            timestamp: Utc::now(),
        }
    }

    pub fn from_project(project: &Project) -> Self {
        Self {
            project_id: project.id,
            status: project.status,
            status_message: project.status_message.clone(),
            deployment_url: project.deployment_url.clone(),
            timestamp: Utc::now(),
        }
    }

    /// WebSocket message body sent to subscribed clients.
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::json!({
            "type": MSG_TYPE_PROJECT_STATUS,
            "project_id": self.project_id,
            "status": self.status,
            "message": self.status_message,
            "deployment_url": self.deployment_url,
            "timestamp": self.timestamp,
        })
    }
}
