//! Assignment repository for `SQLite` persistence.

use std::sync::Arc;

use sqlx::SqliteExecutor;

use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, is_unique_violation};

/// Repository wrapper around `SQLite` for assignment records.
#[derive(Clone)]
pub struct AssignmentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    agent_id: String,
    client_id: String,
    status: String,
    assigned_at: String,
    accepted_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    cancelled_at: Option<String>,
    notes: Option<String>,
    estimated_duration: Option<i64>,
}

impl AssignmentRow {
    fn into_assignment(self) -> Result<Assignment> {
        let status = AssignmentStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid assignment status: {}", self.status)))?;
        Ok(Assignment {
            id: self.id,
            agent_id: self.agent_id,
            client_id: self.client_id,
            status,
            assigned_at: decode_ts(&self.assigned_at, "assigned_at")?,
            accepted_at: decode_opt_ts(self.accepted_at.as_deref(), "accepted_at")?,
            started_at: decode_opt_ts(self.started_at.as_deref(), "started_at")?,
            completed_at: decode_opt_ts(self.completed_at.as_deref(), "completed_at")?,
            cancelled_at: decode_opt_ts(self.cancelled_at.as_deref(), "cancelled_at")?,
            notes: self.notes,
            estimated_duration: self.estimated_duration,
        })
    }
}

/// Insert a new assignment.
///
/// # Errors
///
/// Returns `AppError::AgentUnavailable` when the store already holds an
/// active assignment for the agent (or the client), and `AppError::Db` for
/// other failures.
pub async fn insert<'e, E: SqliteExecutor<'e>>(exec: E, assignment: &Assignment) -> Result<()> {
    sqlx::query(
        "INSERT INTO assignment (id, agent_id, client_id, status, assigned_at, accepted_at,
         started_at, completed_at, cancelled_at, notes, estimated_duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&assignment.id)
    .bind(&assignment.agent_id)
    .bind(&assignment.client_id)
    .bind(assignment.status.as_str())
    .bind(encode_ts(assignment.assigned_at))
    .bind(assignment.accepted_at.map(encode_ts))
    .bind(assignment.started_at.map(encode_ts))
    .bind(assignment.completed_at.map(encode_ts))
    .bind(assignment.cancelled_at.map(encode_ts))
    .bind(&assignment.notes)
    .bind(assignment.estimated_duration)
    .execute(exec)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::AgentUnavailable(format!(
                "agent {} already holds an active assignment",
                assignment.agent_id
            ))
        } else {
            AppError::from(err)
        }
    })?;
    Ok(())
}

/// Load an assignment by identifier.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<Option<Assignment>> {
    let row: Option<AssignmentRow> = sqlx::query_as("SELECT * FROM assignment WHERE id = ?1")
        .bind(id)
        .fetch_optional(exec)
        .await?;
    row.map(AssignmentRow::into_assignment).transpose()
}

/// Load an assignment only if it belongs to `agent_id`.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn get_owned<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
    agent_id: &str,
) -> Result<Option<Assignment>> {
    let row: Option<AssignmentRow> =
        sqlx::query_as("SELECT * FROM assignment WHERE id = ?1 AND agent_id = ?2")
            .bind(id)
            .bind(agent_id)
            .fetch_optional(exec)
            .await?;
    row.map(AssignmentRow::into_assignment).transpose()
}

/// Whether the agent holds an assignment in an active status.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn has_active_for_agent<'e, E: SqliteExecutor<'e>>(
    exec: E,
    agent_id: &str,
) -> Result<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM assignment
         WHERE agent_id = ?1 AND status IN ('assigned','accepted','in_progress')",
    )
    .bind(agent_id)
    .fetch_one(exec)
    .await?;
    Ok(row.0 > 0)
}

/// Whether the client is held by an assignment in an active status.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn has_active_for_client<'e, E: SqliteExecutor<'e>>(
    exec: E,
    client_id: &str,
) -> Result<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM assignment
         WHERE client_id = ?1 AND status IN ('assigned','accepted','in_progress')",
    )
    .bind(client_id)
    .fetch_one(exec)
    .await?;
    Ok(row.0 > 0)
}

/// Persist the lifecycle fields of `assignment`, provided the stored status
/// is still `expected`. Returns `false` if another writer got there first.
///
/// # Errors
///
/// Returns `AppError::Db` if the update fails.
pub async fn save_progress<'e, E: SqliteExecutor<'e>>(
    exec: E,
    assignment: &Assignment,
    expected: AssignmentStatus,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE assignment SET status = ?1, accepted_at = ?2, started_at = ?3,
         completed_at = ?4, cancelled_at = ?5, notes = ?6
         WHERE id = ?7 AND status = ?8",
    )
    .bind(assignment.status.as_str())
    .bind(assignment.accepted_at.map(encode_ts))
    .bind(assignment.started_at.map(encode_ts))
    .bind(assignment.completed_at.map(encode_ts))
    .bind(assignment.cancelled_at.map(encode_ts))
    .bind(&assignment.notes)
    .bind(&assignment.id)
    .bind(expected.as_str())
    .execute(exec)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Delete an assignment; `false` if it did not exist.
///
/// # Errors
///
/// Returns `AppError::Db` if the delete fails.
pub async fn delete<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM assignment WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() == 1)
}

impl AssignmentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Retrieve an assignment by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Assignment>> {
        get(self.db.as_ref(), id).await
    }

    /// The agent's active assignment, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn current_for_agent(&self, agent_id: &str) -> Result<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT * FROM assignment
             WHERE agent_id = ?1 AND status IN ('assigned','accepted','in_progress')
             LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(AssignmentRow::into_assignment).transpose()
    }

    /// The agent's most recent assignments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_agent(&self, agent_id: &str, limit: u32) -> Result<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT * FROM assignment WHERE agent_id = ?1
             ORDER BY assigned_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(agent_id)
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    /// The most recent assignments across all agents, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT * FROM assignment ORDER BY assigned_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    /// Count assignments in an active status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM assignment WHERE status IN ('assigned','accepted','in_progress')",
        )
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }
}
