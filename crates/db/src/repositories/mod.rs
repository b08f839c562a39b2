//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or a `&mut PgConnection` inside a caller-owned
//! transaction) as the first argument.

pub mod project_repo;
pub mod stage_task_repo;

pub use project_repo::ProjectRepo;
pub use stage_task_repo::StageTaskRepo;
