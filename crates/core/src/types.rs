/// Surrogate keys for internal tables (task queue, owners) are BIGSERIAL.
pub type DbId = i64;

/// Projects are addressed by an opaque UUID.
pub type ProjectId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
