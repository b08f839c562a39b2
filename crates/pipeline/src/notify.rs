//! Status notification seam.
//!
//! Publishing is fire-and-forget: failures are logged and never surface to
//! the stage that triggered them.

use std::sync::Arc;

use applaude_db::DbPool;
use applaude_events::{EventBus, PgRelay, PlatformEvent, ProjectStatusEvent};
use async_trait::async_trait;

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn publish(&self, event: ProjectStatusEvent);
}

/// Publishes onto an in-process [`EventBus`].
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl StatusNotifier for BusNotifier {
    async fn publish(&self, event: ProjectStatusEvent) {
        self.bus.publish(PlatformEvent::status_changed(&event));
    }
}

/// Publishes through Postgres `NOTIFY` for other processes to relay.
pub struct PgNotifier {
    pool: DbPool,
}

impl PgNotifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusNotifier for PgNotifier {
    async fn publish(&self, event: ProjectStatusEvent) {
        if let Err(e) = PgRelay::notify(&self.pool, &event).await {
            tracing::warn!(
                project_id = %event.project_id,
                status = %event.status,
                error = %e,
                "Failed to publish status notification",
            );
        }
    }
}
