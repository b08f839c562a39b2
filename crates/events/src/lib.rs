//! Applaude project status notification infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, with per-project subscriptions.
//! - [`PlatformEvent`]: the event envelope carried on the bus.
//! - [`ProjectStatusEvent`]: the status-change payload clients receive.
//! - [`PgRelay`]: carries status events between processes over Postgres
//!   `LISTEN`/`NOTIFY`.
//!
//! Delivery is best-effort. Nothing is persisted; a client that missed
//! updates reconciles by reading the project.

pub mod bus;
pub mod relay;
pub mod status;

pub use bus::{EventBus, PlatformEvent, ProjectSubscription};
pub use relay::{PgRelay, RelayError};
pub use status::ProjectStatusEvent;
