//! Message type and channel constants for project status notifications.
//!
//! Used by the notifiers in the pipeline crate, the Postgres relay in the
//! events crate, and the WebSocket handler in the API.

/// Snapshot or incremental status update for one project.
pub const MSG_TYPE_PROJECT_STATUS: &str = "project_status";

/// Sent when a WebSocket subscription targets a project that does not exist.
pub const MSG_TYPE_PROJECT_NOT_FOUND: &str = "project_not_found";

/// Event type published on the in-process bus for status changes.
pub const EVENT_PROJECT_STATUS_CHANGED: &str = "project.status_changed";

/// Postgres `LISTEN`/`NOTIFY` channel carrying status events across processes.
pub const PG_CHANNEL_PROJECT_STATUS: &str = "project_status";
