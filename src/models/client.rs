//! Client (service request) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo;

/// Urgency of a client request; higher is more urgent.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    /// Level 1.
    Low = 1,
    /// Level 2, the default.
    #[default]
    Medium = 2,
    /// Level 3.
    High = 3,
    /// Level 4.
    Urgent = 4,
}

impl Priority {
    /// Map an ordinal level to a priority.
    #[must_use]
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Ordinal level 1..=4.
    #[must_use]
    pub fn level(self) -> i64 {
        self as i64
    }

    /// Human-readable label shown to agents.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }
}

impl TryFrom<i64> for Priority {
    type Error = String;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("priority must be 1..=4, got {level}"))
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

/// Lifecycle status of a client request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// Waiting for an agent.
    Pending,
    /// An agent has been assigned.
    Assigned,
    /// The assigned agent has started work.
    InProgress,
    /// Work finished.
    Completed,
    /// Request withdrawn.
    Cancelled,
}

impl ClientStatus {
    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A service request at a fixed location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Client {
    /// Unique record identifier.
    pub id: String,
    /// Contact name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Contact email.
    pub email: Option<String>,
    /// Street address.
    pub address: String,
    /// Site latitude.
    pub latitude: f64,
    /// Site longitude.
    pub longitude: f64,
    /// Urgency.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: ClientStatus,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewClient {
    /// Contact name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Street address.
    pub address: String,
    /// Site latitude.
    pub latitude: f64,
    /// Site longitude.
    pub longitude: f64,
    /// Urgency; defaults to medium.
    #[serde(default)]
    pub priority: Priority,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Client {
    /// Build a pending client from creation fields.
    #[must_use]
    pub fn new(fields: NewClient) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            phone: fields.phone,
            email: fields.email.filter(|e| !e.is_empty()),
            address: fields.address,
            latitude: fields.latitude,
            longitude: fields.longitude,
            priority: fields.priority,
            status: ClientStatus::Pending,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Straight-line distance in kilometres to an optional position.
    ///
    /// Infinite when the position is unknown.
    #[must_use]
    pub fn distance_from(&self, latitude: Option<f64>, longitude: Option<f64>) -> f64 {
        geo::distance_opt(
            Some(self.latitude),
            Some(self.longitude),
            latitude,
            longitude,
        )
    }
}
