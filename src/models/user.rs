//! User model covering managers and field agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a user plays in the dispatch operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Office staff observing the live picture and assigning work.
    Manager,
    /// Field worker who receives client requests.
    Agent,
}

impl UserRole {
    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Agent => "agent",
        }
    }

    /// Parse the stored lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manager" => Some(Self::Manager),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// A manager or field agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct User {
    /// Unique record identifier.
    pub id: String,
    /// Unique login name, also shown to managers.
    pub username: String,
    /// Manager or agent.
    pub role: UserRole,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Whether the agent currently takes work.
    pub is_active_agent: bool,
    /// Last reported latitude.
    pub current_latitude: Option<f64>,
    /// Last reported longitude.
    pub current_longitude: Option<f64>,
    /// Time of the last location report.
    pub last_location_update: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Construct a new user with a generated identifier and no position.
    #[must_use]
    pub fn new(username: String, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            role,
            phone: None,
            email: None,
            is_active_agent: true,
            current_latitude: None,
            current_longitude: None,
            last_location_update: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this user is a field agent.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.role == UserRole::Agent
    }
}
