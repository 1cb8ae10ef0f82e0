//! Outbound event records delivered to realtime sessions.
//!
//! Field names are part of the wire contract with existing browser
//! clients and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every message the server writes to a realtime connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Greeting sent once a session is subscribed.
    ConnectionEstablished {
        /// `Connected as <username>`.
        message: String,
    },
    /// Reply to an inbound `ping`, echoing its timestamp.
    Pong {
        /// Client-supplied timestamp, passed through untouched.
        timestamp: Option<Value>,
    },
    /// Reply to an inbound message that could not be understood.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// A new assignment, addressed to the agent or to managers.
    AssignmentNotification {
        /// Audience-specific payload.
        data: AssignmentNotice,
    },
    /// An assignment status change applied through the API.
    StatusUpdate {
        /// Change summary.
        data: StatusChange,
    },
    /// An assignment status change reported over a realtime connection.
    StatusBroadcast {
        /// Report summary.
        data: StatusReport,
    },
    /// An agent's new position.
    LocationUpdate {
        /// Position report.
        data: LocationReport,
    },
}

impl OutboundEvent {
    /// Wire `type` tag, for logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
            Self::AssignmentNotification { .. } => "assignment_notification",
            Self::StatusUpdate { .. } => "status_update",
            Self::StatusBroadcast { .. } => "status_broadcast",
            Self::LocationUpdate { .. } => "location_update",
        }
    }

    /// Shorthand for an error reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Assignment-created payload; the agent and managers see different views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentNotice {
    /// Sent to the assigned agent's channel.
    NewAssignment {
        /// Assignment identifier.
        assignment_id: String,
        /// Client contact name.
        client_name: String,
        /// Client street address.
        client_address: String,
        /// Client phone number.
        client_phone: String,
        /// Client latitude.
        client_lat: f64,
        /// Client longitude.
        client_lng: f64,
        /// Priority label, e.g. `Urgent`.
        priority: String,
    },
    /// Sent to the managers channel.
    AssignmentCreated {
        /// Assigned agent's username.
        agent_name: String,
        /// Client contact name.
        client_name: String,
        /// Assignment identifier.
        assignment_id: String,
    },
}

/// Status change summary for managers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename = "status_changed")]
pub struct StatusChange {
    /// Assignment identifier.
    pub assignment_id: String,
    /// Agent's username.
    pub agent_name: String,
    /// Client contact name.
    pub client_name: String,
    /// Status after the change.
    pub new_status: String,
}

/// Realtime status report relayed to managers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    /// Assignment identifier.
    pub assignment_id: String,
    /// Agent's username.
    pub agent_name: String,
    /// Client contact name.
    pub client_name: String,
    /// Status after the change.
    pub status: String,
    /// Client-supplied timestamp.
    pub timestamp: Option<Value>,
}

/// Agent position relayed to managers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationReport {
    /// Agent identifier.
    pub agent_id: String,
    /// Agent's username.
    pub agent_name: String,
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// Client-supplied timestamp, or the server time for API reports.
    pub timestamp: Option<Value>,
}
