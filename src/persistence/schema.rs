//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions to the connected database.
///
/// The partial unique indexes on `assignment` make the store itself refuse
/// a second active assignment for the same agent or the same client.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS app_user (
    id                   TEXT PRIMARY KEY NOT NULL,
    username             TEXT NOT NULL UNIQUE,
    role                 TEXT NOT NULL CHECK(role IN ('manager','agent')),
    phone                TEXT,
    email                TEXT,
    is_active_agent      INTEGER NOT NULL DEFAULT 1,
    current_latitude     REAL,
    current_longitude    REAL,
    last_location_update TEXT,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS client (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL,
    email       TEXT,
    address     TEXT NOT NULL,
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    priority    INTEGER NOT NULL DEFAULT 2 CHECK(priority BETWEEN 1 AND 4),
    status      TEXT NOT NULL CHECK(status IN ('pending','assigned','in_progress','completed','cancelled')),
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignment (
    id                 TEXT PRIMARY KEY NOT NULL,
    agent_id           TEXT NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
    client_id          TEXT NOT NULL REFERENCES client(id) ON DELETE CASCADE,
    status             TEXT NOT NULL CHECK(status IN ('assigned','accepted','in_progress','completed','cancelled')),
    assigned_at        TEXT NOT NULL,
    accepted_at        TEXT,
    started_at         TEXT,
    completed_at       TEXT,
    cancelled_at       TEXT,
    notes              TEXT,
    estimated_duration INTEGER
);

CREATE TABLE IF NOT EXISTS location_log (
    id         TEXT PRIMARY KEY NOT NULL,
    agent_id   TEXT NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
    latitude   REAL NOT NULL,
    longitude  REAL NOT NULL,
    accuracy   REAL,
    timestamp  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_log (
    id                 TEXT PRIMARY KEY NOT NULL,
    uploaded_by        TEXT NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
    file_name          TEXT NOT NULL,
    upload_time        TEXT NOT NULL,
    total_rows         INTEGER NOT NULL DEFAULT 0,
    successful_imports INTEGER NOT NULL DEFAULT 0,
    failed_imports     INTEGER NOT NULL DEFAULT 0,
    error_details      TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_active_agent
    ON assignment(agent_id) WHERE status IN ('assigned','accepted','in_progress');
CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_active_client
    ON assignment(client_id) WHERE status IN ('assigned','accepted','in_progress');
CREATE INDEX IF NOT EXISTS idx_client_queue ON client(status, priority DESC, created_at);
CREATE INDEX IF NOT EXISTS idx_assignment_agent ON assignment(agent_id, assigned_at);
CREATE INDEX IF NOT EXISTS idx_location_agent ON location_log(agent_id, timestamp);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
