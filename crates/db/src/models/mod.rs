//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` struct matching the database row
//! - Conversion into the typed domain entity where one exists
//! - `Deserialize` DTOs for inserts and list queries

pub mod project;
pub mod stage_task;
pub mod status;
