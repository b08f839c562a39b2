//! Cross-process status delivery over Postgres `LISTEN`/`NOTIFY`.
//!
//! Workers publish with [`PgRelay::notify`]; the API process runs
//! [`PgRelay::run`], which listens on the status channel and republishes
//! every payload onto its local [`EventBus`]. Notifications are not queued
//! for absent listeners, which matches the best-effort delivery contract.

use std::sync::Arc;
use std::time::Duration;

use applaude_core::status_events::PG_CHANNEL_PROJECT_STATUS;
use applaude_db::DbPool;
use sqlx::postgres::PgListener;
use tokio_util::sync::CancellationToken;

use crate::bus::{EventBus, PlatformEvent};
use crate::status::ProjectStatusEvent;

/// Pause before re-listening after the listener connection fails.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid status payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Postgres-backed relay between processes.
pub struct PgRelay;

impl PgRelay {
    /// Send a status event to every listening process.
    pub async fn notify(pool: &DbPool, event: &ProjectStatusEvent) -> Result<(), RelayError> {
        let payload = serde_json::to_string(event)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(PG_CHANNEL_PROJECT_STATUS)
            .bind(payload)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Decode a notification payload.
    pub fn decode(payload: &str) -> Result<ProjectStatusEvent, RelayError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Listen until `cancel` fires, forwarding every status event to `bus`.
    ///
    /// Connection failures are logged and retried; malformed payloads are
    /// logged and skipped.
    pub async fn run(pool: DbPool, bus: Arc<EventBus>, cancel: CancellationToken) {
        tracing::info!(channel = PG_CHANNEL_PROJECT_STATUS, "Status relay started");

        'outer: loop {
            let mut listener = match Self::listen(&pool).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, "Status relay failed to listen");
                    tokio::select! {
                        _ = cancel.cancelled() => break 'outer,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue 'outer,
                    }
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'outer,
                    received = listener.recv() => match received {
                        Ok(notification) => match Self::decode(notification.payload()) {
                            Ok(event) => {
                                tracing::debug!(
                                    project_id = %event.project_id,
                                    status = %event.status,
                                    "Relaying status event"
                                );
                                bus.publish(PlatformEvent::status_changed(&event));
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping malformed status notification");
                            }
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "Status relay connection lost, reconnecting");
                            break;
                        }
                    },
                }
            }
        }

        tracing::info!("Status relay stopped");
    }

    async fn listen(pool: &DbPool) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(PG_CHANNEL_PROJECT_STATUS).await?;
        Ok(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applaude_core::status::ProjectStatus;

    #[test]
    fn decode_round_trips_notify_payload() {
        let event = ProjectStatusEvent::new(
            uuid::Uuid::now_v7(),
            ProjectStatus::DesignComplete,
            Some("Palette ready"),
        );
        let payload = serde_json::to_string(&event).unwrap();
        assert_eq!(PgRelay::decode(&payload).unwrap(), event);
    }

    #[test]
    fn decode_rejects_unknown_status() {
        let payload = r#"{"project_id":"0190a5a4-0000-7000-8000-000000000000","status":"DONE",
            "status_message":null,"deployment_url":null,"timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(PgRelay::decode(payload), Err(RelayError::Payload(_))));
    }
}
