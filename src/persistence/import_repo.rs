//! Import log repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::import::ImportLog;
use crate::Result;

use super::db::Database;
use super::{decode_ts, encode_ts};

/// Repository wrapper around `SQLite` for bulk-import audit records.
#[derive(Clone)]
pub struct ImportRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct ImportLogRow {
    id: String,
    uploaded_by: String,
    file_name: String,
    upload_time: String,
    total_rows: i64,
    successful_imports: i64,
    failed_imports: i64,
    error_details: Option<String>,
}

impl ImportLogRow {
    fn into_log(self) -> Result<ImportLog> {
        Ok(ImportLog {
            id: self.id,
            uploaded_by: self.uploaded_by,
            file_name: self.file_name,
            upload_time: decode_ts(&self.upload_time, "upload_time")?,
            total_rows: self.total_rows,
            successful_imports: self.successful_imports,
            failed_imports: self.failed_imports,
            error_details: self.error_details,
        })
    }
}

impl ImportRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an import outcome.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, log: &ImportLog) -> Result<ImportLog> {
        sqlx::query(
            "INSERT INTO import_log (id, uploaded_by, file_name, upload_time, total_rows,
             successful_imports, failed_imports, error_details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&log.id)
        .bind(&log.uploaded_by)
        .bind(&log.file_name)
        .bind(encode_ts(log.upload_time))
        .bind(log.total_rows)
        .bind(log.successful_imports)
        .bind(log.failed_imports)
        .bind(&log.error_details)
        .execute(self.db.as_ref())
        .await?;
        Ok(log.clone())
    }

    /// Most recent imports, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ImportLog>> {
        let rows: Vec<ImportLogRow> =
            sqlx::query_as("SELECT * FROM import_log ORDER BY upload_time DESC LIMIT ?1")
                .bind(i64::from(limit))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(ImportLogRow::into_log).collect()
    }
}
