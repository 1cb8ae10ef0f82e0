//! Location log repository for `SQLite` persistence.
//!
//! Location history is append-only; nothing here updates or deletes it.

use std::sync::Arc;

use sqlx::SqliteExecutor;

use crate::models::location::LocationLog;
use crate::Result;

use super::db::Database;
use super::{decode_ts, encode_ts};

/// Repository wrapper around `SQLite` for location history.
#[derive(Clone)]
pub struct LocationRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: String,
    agent_id: String,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    timestamp: String,
}

impl LocationRow {
    fn into_log(self) -> Result<LocationLog> {
        Ok(LocationLog {
            id: self.id,
            agent_id: self.agent_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            timestamp: decode_ts(&self.timestamp, "timestamp")?,
        })
    }
}

/// Append a location report.
///
/// # Errors
///
/// Returns `AppError::Db` if the insert fails.
pub async fn append<'e, E: SqliteExecutor<'e>>(exec: E, log: &LocationLog) -> Result<()> {
    sqlx::query(
        "INSERT INTO location_log (id, agent_id, latitude, longitude, accuracy, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&log.id)
    .bind(&log.agent_id)
    .bind(log.latitude)
    .bind(log.longitude)
    .bind(log.accuracy)
    .bind(encode_ts(log.timestamp))
    .execute(exec)
    .await?;
    Ok(())
}

impl LocationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The agent's most recent reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_agent(&self, agent_id: &str, limit: u32) -> Result<Vec<LocationLog>> {
        let rows: Vec<LocationRow> = sqlx::query_as(
            "SELECT * FROM location_log WHERE agent_id = ?1
             ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
        )
        .bind(agent_id)
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(LocationRow::into_log).collect()
    }
}
