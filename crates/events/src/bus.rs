//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use applaude_core::status_events::EVENT_PROJECT_STATUS_CHANGED;
use applaude_core::types::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::status::ProjectStatusEvent;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on the platform.
///
/// Constructed via [`PlatformEvent::new`] and enriched with
/// [`with_project`](PlatformEvent::with_project) and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"project.status_changed"`.
    pub event_type: String,

    /// Project the event is about. Per-project subscriptions filter on it.
    pub project_id: Option<ProjectId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the project the event is about.
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Wrap a status change.
    pub fn status_changed(event: &ProjectStatusEvent) -> Self {
        Self::new(EVENT_PROJECT_STATUS_CHANGED)
            .with_project(event.project_id)
            .with_payload(serde_json::to_value(event).unwrap_or_default())
    }

    /// Recover the status change carried by this event, if it is one.
    pub fn as_status_event(&self) -> Option<ProjectStatusEvent> {
        if self.event_type != EVENT_PROJECT_STATUS_CHANGED {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PlatformEvent`].
///
/// # Usage
///
/// ```rust
/// use applaude_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("project.created"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of a single project.
    pub fn subscribe_project(&self, project_id: ProjectId) -> ProjectSubscription {
        ProjectSubscription {
            project_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// ProjectSubscription
// ---------------------------------------------------------------------------

/// A receiver that yields only one project's events.
pub struct ProjectSubscription {
    project_id: ProjectId,
    receiver: broadcast::Receiver<PlatformEvent>,
}

impl ProjectSubscription {
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Wait for the next event of this project.
    ///
    /// Returns `None` once the bus is dropped. Lagging skips the lost events
    /// (delivery is best-effort) and keeps going.
    pub async fn recv(&mut self) -> Option<PlatformEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.project_id == Some(self.project_id) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        project_id = %self.project_id,
                        skipped = n,
                        "Project subscription lagged, some updates were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
