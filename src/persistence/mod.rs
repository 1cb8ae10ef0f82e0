//! Persistence layer modules.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

pub mod assignment_repo;
pub mod client_repo;
pub mod db;
pub mod import_repo;
pub mod location_repo;
pub mod schema;
pub mod user_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Render a timestamp as fixed-width RFC 3339 so text ordering matches
/// chronological ordering.
pub(crate) fn encode_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn decode_ts(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

/// Parse an optional stored RFC 3339 timestamp.
pub(crate) fn decode_opt_ts(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_ts(s, field)).transpose()
}

/// Whether a `sqlx` error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
