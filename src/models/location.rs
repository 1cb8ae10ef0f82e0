//! Location history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A position reported by an agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LocationFix {
    /// Reported latitude in degrees.
    pub latitude: f64,
    /// Reported longitude in degrees.
    pub longitude: f64,
    /// GPS accuracy in metres.
    pub accuracy: Option<f64>,
}

/// Append-only record of an agent's reported position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LocationLog {
    /// Unique record identifier.
    pub id: String,
    /// Reporting agent.
    pub agent_id: String,
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// GPS accuracy in metres.
    pub accuracy: Option<f64>,
    /// Time the report was stored.
    pub timestamp: DateTime<Utc>,
}

impl LocationLog {
    /// Construct a log entry stamped with the current time.
    #[must_use]
    pub fn new(agent_id: String, fix: LocationFix) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id,
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            timestamp: Utc::now(),
        }
    }
}
