use applaude_core::project::Project;
use applaude_core::status_events::MSG_TYPE_PROJECT_NOT_FOUND;
use applaude_core::types::ProjectId;
use applaude_events::ProjectStatusEvent;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;

/// First message on a new connection: the project's current state, or a
/// not-found notice.
pub fn snapshot_message(project_id: ProjectId, project: Option<&Project>) -> serde_json::Value {
    match project {
        Some(project) => ProjectStatusEvent::from_project(project).to_message(),
        None => serde_json::json!({
            "type": MSG_TYPE_PROJECT_NOT_FOUND,
            "project_id": project_id,
        }),
    }
}

/// GET /api/v1/ws/projects/{id}
///
/// Upgrades to a WebSocket that follows one project's status.
pub async fn project_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, project_id))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection so bus updates reach it.
///   2. Sends the snapshot read from the store.
///   3. Forwards queued messages on a sender task.
///   4. Drains inbound frames until the client leaves.
async fn handle_socket(socket: WebSocket, state: AppState, project_id: ProjectId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, project_id = %project_id, "WebSocket connected");

    // Registered before the snapshot read so no update falls in between.
    let mut rx = state.ws_manager.add(conn_id.clone(), project_id).await;
    let (mut sink, mut stream) = socket.split();

    let project = match state.store.find(project_id).await {
        Ok(project) => project,
        Err(e) => {
            tracing::error!(project_id = %project_id, error = %e, "Snapshot read failed");
            state.ws_manager.remove(&conn_id).await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let snapshot = snapshot_message(project_id, project.as_ref());
    let sent = sink.send(Message::Text(snapshot.to_string().into())).await;
    if project.is_none() || sent.is_err() {
        state.ws_manager.remove(&conn_id).await;
        let _ = sink.send(Message::Close(None)).await;
        tracing::info!(conn_id = %conn_id, "WebSocket closed after snapshot");
        return;
    }

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Clients only listen; inbound frames other than Close are ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use applaude_core::app_target::AppType;
    use applaude_core::status::ProjectStatus;

    #[test]
    fn snapshot_of_existing_project_is_a_status_message() {
        let mut project = Project::new_pending(1, "Demo", "https://example.com", AppType::Android);
        project.status = ProjectStatus::DesignPending;
        project.status_message = Some("Designing".into());

        let msg = snapshot_message(project.id, Some(&project));
        assert_eq!(msg["type"], "project_status");
        assert_eq!(msg["status"], "DESIGN_PENDING");
        assert_eq!(msg["message"], "Designing");
    }

    #[test]
    fn snapshot_of_missing_project_reports_not_found() {
        let id = uuid::Uuid::now_v7();
        let msg = snapshot_message(id, None);
        assert_eq!(msg["type"], "project_not_found");
        assert_eq!(msg["project_id"], id.to_string());
    }
}
