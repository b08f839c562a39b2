//! Bus-to-socket fan-out.
//!
//! [`StatusForwarder`] consumes the in-process event bus and pushes every
//! project status change to the WebSocket connections following that project.

use std::sync::Arc;

use applaude_events::PlatformEvent;
use axum::extract::ws::Message;
use tokio::sync::broadcast;

use crate::ws::WsManager;

pub struct StatusForwarder {
    ws_manager: Arc<WsManager>,
}

impl StatusForwarder {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the [`EventBus`](applaude_events::EventBus) is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.forward(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Status forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, status forwarder shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event. Returns the number of connections reached.
    pub async fn forward(&self, event: &PlatformEvent) -> usize {
        let Some(status) = event.as_status_event() else {
            return 0;
        };
        let text = status.to_message().to_string();
        let sent = self
            .ws_manager
            .send_to_project(status.project_id, Message::Text(text.into()))
            .await;
        tracing::debug!(
            project_id = %status.project_id,
            status = %status.status,
            sent,
            "Status update forwarded",
        );
        sent
    }
}
