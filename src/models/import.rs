//! Bulk client import rows and their audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::client::{NewClient, Priority};

/// One row of a bulk import, before validation.
///
/// Cells are kept as raw JSON so that a badly typed cell is reported for
/// its row instead of rejecting the whole batch. Text cells accept
/// numbers; numeric cells accept numeric strings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ImportRow {
    /// Contact name.
    #[serde(default)]
    pub name: Option<Value>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<Value>,
    /// Street address.
    #[serde(default)]
    pub address: Option<Value>,
    /// Site latitude.
    #[serde(default)]
    pub latitude: Option<Value>,
    /// Site longitude.
    #[serde(default)]
    pub longitude: Option<Value>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<Value>,
    /// Urgency level; anything outside 1..=4 falls back to medium.
    #[serde(default)]
    pub priority: Option<Value>,
}

impl ImportRow {
    /// Validate the row and convert it to creation fields.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason naming the first missing or
    /// unreadable column.
    pub fn into_new_client(self) -> std::result::Result<NewClient, String> {
        let name = required_text(self.name.as_ref(), "name")?;
        let phone = required_text(self.phone.as_ref(), "phone")?;
        let address = required_text(self.address.as_ref(), "address")?;
        let latitude = required_number(self.latitude.as_ref(), "latitude")?;
        let longitude = required_number(self.longitude.as_ref(), "longitude")?;
        let priority = match present(self.priority.as_ref()) {
            None => Priority::default(),
            Some(cell) => {
                let level = level(cell).ok_or("invalid priority")?;
                Priority::from_level(level).unwrap_or_default()
            }
        };
        let email = present(self.email.as_ref())
            .and_then(text)
            .filter(|e| !e.is_empty());

        Ok(NewClient {
            name,
            phone,
            email,
            address,
            latitude,
            longitude,
            priority,
            notes: None,
        })
    }
}

/// The cell, unless it is absent, null or blank text.
fn present(cell: Option<&Value>) -> Option<&Value> {
    cell.filter(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn text(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(cell: &Value) -> Option<f64> {
    let number = match cell {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Whole-number level; spreadsheets often hand integers over as `3.0`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn level(cell: &Value) -> Option<i64> {
    if let Some(level) = cell.as_i64() {
        return Some(level);
    }
    let value = number(cell)?;
    (value.fract() == 0.0 && value.abs() < 1e15).then_some(value as i64)
}

fn required_text(cell: Option<&Value>, column: &str) -> std::result::Result<String, String> {
    let cell = present(cell).ok_or_else(|| format!("missing {column}"))?;
    text(cell).ok_or_else(|| format!("invalid {column}"))
}

fn required_number(cell: Option<&Value>, column: &str) -> std::result::Result<f64, String> {
    let cell = present(cell).ok_or_else(|| format!("missing {column}"))?;
    number(cell).ok_or_else(|| format!("invalid {column}"))
}

/// Audit record of a bulk import outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ImportLog {
    /// Unique record identifier.
    pub id: String,
    /// Manager who uploaded the batch.
    pub uploaded_by: String,
    /// Source file name as reported by the uploader.
    pub file_name: String,
    /// Upload timestamp.
    pub upload_time: DateTime<Utc>,
    /// Rows in the batch.
    pub total_rows: i64,
    /// Rows turned into clients.
    pub successful_imports: i64,
    /// Rows rejected.
    pub failed_imports: i64,
    /// Newline-joined `Row N: reason` lines.
    pub error_details: Option<String>,
}

impl ImportLog {
    /// Build a log from collected row failures.
    #[must_use]
    pub fn new(
        uploaded_by: String,
        file_name: String,
        total_rows: usize,
        successful_imports: usize,
        errors: &[String],
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            uploaded_by,
            file_name,
            upload_time: Utc::now(),
            total_rows: i64::try_from(total_rows).unwrap_or(i64::MAX),
            successful_imports: i64::try_from(successful_imports).unwrap_or(i64::MAX),
            failed_imports: i64::try_from(errors.len()).unwrap_or(i64::MAX),
            error_details: if errors.is_empty() {
                None
            } else {
                Some(errors.join("\n"))
            },
        }
    }
}
