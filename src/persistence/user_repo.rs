//! User repository for `SQLite` persistence.
//!
//! Functions taking a generic executor run either on the pool or inside a
//! caller's transaction; the [`UserRepo`] methods are pool-bound shortcuts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::user::{User, UserRole};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, is_unique_violation};

/// Repository wrapper around `SQLite` for user records.
#[derive(Clone)]
pub struct UserRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    role: String,
    phone: Option<String>,
    email: Option<String>,
    is_active_agent: bool,
    current_latitude: Option<f64>,
    current_longitude: Option<f64>,
    last_location_update: Option<String>,
    created_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| AppError::Db(format!("invalid role: {}", self.role)))?;
        Ok(User {
            id: self.id,
            username: self.username,
            role,
            phone: self.phone,
            email: self.email,
            is_active_agent: self.is_active_agent,
            current_latitude: self.current_latitude,
            current_longitude: self.current_longitude,
            last_location_update: decode_opt_ts(
                self.last_location_update.as_deref(),
                "last_location_update",
            )?,
            created_at: decode_ts(&self.created_at, "created_at")?,
        })
    }
}

/// Load a user by identifier.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn get<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM app_user WHERE id = ?1")
        .bind(id)
        .fetch_optional(exec)
        .await?;
    row.map(UserRow::into_user).transpose()
}

/// Active agents without an active assignment, in ascending id order.
///
/// The id order is the tie-break order used by the matcher.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn list_available_agents<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.* FROM app_user u
         WHERE u.role = 'agent' AND u.is_active_agent = 1
           AND NOT EXISTS (
               SELECT 1 FROM assignment a
               WHERE a.agent_id = u.id
                 AND a.status IN ('assigned','accepted','in_progress'))
         ORDER BY u.id ASC",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(UserRow::into_user).collect()
}

/// Overwrite an agent's last known position.
///
/// # Errors
///
/// Returns `AppError::NotFound` if no agent has this id.
pub async fn update_location<'e, E: SqliteExecutor<'e>>(
    exec: E,
    agent_id: &str,
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE app_user SET current_latitude = ?1, current_longitude = ?2,
         last_location_update = ?3 WHERE id = ?4 AND role = 'agent'",
    )
    .bind(latitude)
    .bind(longitude)
    .bind(encode_ts(at))
    .bind(agent_id)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("agent {agent_id} not found")));
    }
    Ok(())
}

impl UserRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new user record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedInput` if the username is taken, or
    /// `AppError::Db` if the insert fails.
    pub async fn create(&self, user: &User) -> Result<User> {
        sqlx::query(
            "INSERT INTO app_user (id, username, role, phone, email, is_active_agent,
             current_latitude, current_longitude, last_location_update, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.is_active_agent)
        .bind(user.current_latitude)
        .bind(user.current_longitude)
        .bind(user.last_location_update.map(encode_ts))
        .bind(encode_ts(user.created_at))
        .execute(self.db.as_ref())
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::MalformedInput(format!("username {} already exists", user.username))
            } else {
                AppError::from(err)
            }
        })?;

        Ok(user.clone())
    }

    /// Retrieve a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        get(self.db.as_ref(), id).await
    }

    /// List every agent ordered by username.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_agents(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM app_user WHERE role = 'agent' ORDER BY username")
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Count agents flagged as taking work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active_agents(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM app_user WHERE role = 'agent' AND is_active_agent = 1",
        )
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }

    /// Toggle whether an agent takes work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has this id.
    pub async fn set_active(&self, agent_id: &str, active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE app_user SET is_active_agent = ?1 WHERE id = ?2 AND role = 'agent'",
        )
        .bind(active)
        .bind(agent_id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agent {agent_id} not found")));
        }
        Ok(())
    }
}
