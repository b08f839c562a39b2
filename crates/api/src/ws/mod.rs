//! WebSocket infrastructure for real-time project status.
//!
//! Provides connection management, heartbeat monitoring, bus fan-out, and
//! the per-project upgrade handler used by Axum routes.

mod forwarder;
mod handler;
mod heartbeat;
pub mod manager;

pub use forwarder::StatusForwarder;
pub use handler::{project_ws_handler, snapshot_message};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
