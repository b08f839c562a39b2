//! Applaude domain core.
//!
//! Pure types and rules shared by the database layer, the pipeline, the
//! worker, and the API. This crate has no internal dependencies.

pub mod app_target;
pub mod error;
pub mod palette;
pub mod project;
pub mod stage;
pub mod status;
pub mod status_events;
pub mod survey;
pub mod types;
