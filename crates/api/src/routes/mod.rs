pub mod health;
pub mod project;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws/projects/{id}                  per-project status stream (WebSocket)
///
/// /projects                          list, create
/// /projects/{id}                     get, delete
/// /projects/{id}/status              current status
/// /projects/{id}/deployment          choose deployment target (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/projects/{id}", get(ws::project_ws_handler))
        .nest("/projects", project::router())
}
