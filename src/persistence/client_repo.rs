//! Client repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::client::{Client, ClientStatus, Priority};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_ts, encode_ts};

/// Repository wrapper around `SQLite` for client records.
#[derive(Clone)]
pub struct ClientRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ClientRow {
    id: String,
    name: String,
    phone: String,
    email: Option<String>,
    address: String,
    latitude: f64,
    longitude: f64,
    priority: i64,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ClientRow {
    fn into_client(self) -> Result<Client> {
        let priority = Priority::from_level(self.priority)
            .ok_or_else(|| AppError::Db(format!("invalid priority: {}", self.priority)))?;
        let status = ClientStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid client status: {}", self.status)))?;
        Ok(Client {
            id: self.id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            priority,
            status,
            notes: self.notes,
            created_at: decode_ts(&self.created_at, "created_at")?,
            updated_at: decode_ts(&self.updated_at, "updated_at")?,
        })
    }
}

/// Insert a new client record.
///
/// # Errors
///
/// Returns `AppError::Db` if the insert fails.
pub async fn insert<'e, E: SqliteExecutor<'e>>(exec: E, client: &Client) -> Result<()> {
    sqlx::query(
        "INSERT INTO client (id, name, phone, email, address, latitude, longitude,
         priority, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&client.id)
    .bind(&client.name)
    .bind(&client.phone)
    .bind(&client.email)
    .bind(&client.address)
    .bind(client.latitude)
    .bind(client.longitude)
    .bind(client.priority.level())
    .bind(client.status.as_str())
    .bind(&client.notes)
    .bind(encode_ts(client.created_at))
    .bind(encode_ts(client.updated_at))
    .execute(exec)
    .await?;
    Ok(())
}

/// Load a client by identifier.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<Option<Client>> {
    let row: Option<ClientRow> = sqlx::query_as("SELECT * FROM client WHERE id = ?1")
        .bind(id)
        .fetch_optional(exec)
        .await?;
    row.map(ClientRow::into_client).transpose()
}

/// Pending clients in matching order: most urgent first, then oldest.
///
/// Insertion order breaks ties between clients created in the same
/// nanosecond.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn list_pending<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Vec<Client>> {
    let rows: Vec<ClientRow> = sqlx::query_as(
        "SELECT * FROM client WHERE status = 'pending'
         ORDER BY priority DESC, created_at ASC, rowid ASC",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(ClientRow::into_client).collect()
}

/// Set a client's status unconditionally.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the client does not exist.
pub async fn set_status<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
    status: ClientStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query("UPDATE client SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status.as_str())
        .bind(encode_ts(now))
        .bind(id)
        .execute(exec)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("client {id} not found")));
    }
    Ok(())
}

/// Move a client from `expected` to `next`; `false` if it was not in
/// `expected` (or does not exist).
///
/// # Errors
///
/// Returns `AppError::Db` if the update fails.
pub async fn compare_and_set_status<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
    expected: ClientStatus,
    next: ClientStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE client SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
    )
    .bind(next.as_str())
    .bind(encode_ts(now))
    .bind(id)
    .bind(expected.as_str())
    .execute(exec)
    .await?;
    Ok(result.rows_affected() == 1)
}

impl ClientRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new client record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, client: &Client) -> Result<Client> {
        insert(self.db.as_ref(), client).await?;
        Ok(client.clone())
    }

    /// Retrieve a client by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Client>> {
        get(self.db.as_ref(), id).await
    }

    /// Pending clients in matching order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<Client>> {
        list_pending(self.db.as_ref()).await
    }

    /// Count all clients.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_all(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM client")
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(row.0)
    }

    /// Count clients in one status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_by_status(&self, status: ClientStatus) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM client WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(row.0)
    }
}
