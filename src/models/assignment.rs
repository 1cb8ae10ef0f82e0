//! Assignment model and lifecycle rules.
//!
//! An assignment pairs one agent with one client and advances
//! `assigned → accepted → in_progress → completed`. `cancelled` is an
//! absorbing terminal reachable from any non-terminal state. The
//! transactional side of each transition lives in
//! [`crate::dispatch::lifecycle`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

use super::client::ClientStatus;

/// Lifecycle status for an assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Created, waiting for the agent to accept.
    Assigned,
    /// Agent accepted the job.
    Accepted,
    /// Agent is on site working.
    InProgress,
    /// Work finished.
    Completed,
    /// Withdrawn before completion.
    Cancelled,
}

impl AssignmentStatus {
    /// Statuses that make an agent unavailable.
    pub const ACTIVE: [Self; 3] = [Self::Assigned, Self::Accepted, Self::InProgress];

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(Self::Assigned),
            "accepted" => Some(Self::Accepted),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the assignment still occupies its agent.
    #[must_use]
    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A single forward step of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `assigned → accepted`.
    Accept,
    /// `accepted → in_progress`. Skipping `accepted` is rejected so the
    /// timestamp columns always fill in order.
    Start,
    /// `in_progress → completed`; completes the client too.
    Complete,
    /// Any non-terminal status `→ cancelled`; returns the client to pending.
    Cancel,
}

impl Transition {
    /// Transition an agent may request to reach `target`.
    ///
    /// Agents only move their work forward. Cancellation is a manager
    /// action and goes through [`Transition::Cancel`] directly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` for `assigned`, which no
    /// transition leads to, and for `cancelled`.
    pub fn for_agent(target: AssignmentStatus) -> Result<Self> {
        match target {
            AssignmentStatus::Accepted => Ok(Self::Accept),
            AssignmentStatus::InProgress => Ok(Self::Start),
            AssignmentStatus::Completed => Ok(Self::Complete),
            AssignmentStatus::Cancelled => Err(AppError::InvalidTransition(
                "agents cannot cancel assignments".into(),
            )),
            AssignmentStatus::Assigned => Err(AppError::InvalidTransition(
                "assignments cannot return to assigned".into(),
            )),
        }
    }

    /// Status reached after the transition.
    #[must_use]
    pub fn target(self) -> AssignmentStatus {
        match self {
            Self::Accept => AssignmentStatus::Accepted,
            Self::Start => AssignmentStatus::InProgress,
            Self::Complete => AssignmentStatus::Completed,
            Self::Cancel => AssignmentStatus::Cancelled,
        }
    }

    /// Client status written in the same transaction, if any.
    #[must_use]
    pub fn client_status(self) -> Option<ClientStatus> {
        match self {
            Self::Accept => None,
            Self::Start => Some(ClientStatus::InProgress),
            Self::Complete => Some(ClientStatus::Completed),
            Self::Cancel => Some(ClientStatus::Pending),
        }
    }

    fn allowed_from(self, current: AssignmentStatus) -> bool {
        matches!(
            (self, current),
            (Self::Accept, AssignmentStatus::Assigned)
                | (Self::Start, AssignmentStatus::Accepted)
                | (Self::Complete, AssignmentStatus::InProgress)
                | (
                    Self::Cancel,
                    AssignmentStatus::Assigned
                        | AssignmentStatus::Accepted
                        | AssignmentStatus::InProgress
                )
        )
    }
}

/// Pairing of one agent with one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Assignment {
    /// Unique record identifier.
    pub id: String,
    /// Assigned agent.
    pub agent_id: String,
    /// Served client.
    pub client_id: String,
    /// Current lifecycle status.
    pub status: AssignmentStatus,
    /// Creation timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Set once when accepted.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Set once when work starts.
    pub started_at: Option<DateTime<Utc>>,
    /// Set once when work completes.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once when cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Free-text notes, typically written on completion.
    pub notes: Option<String>,
    /// Estimated duration in minutes.
    pub estimated_duration: Option<i64>,
}

impl Assignment {
    /// Construct a freshly assigned pairing.
    #[must_use]
    pub fn new(agent_id: String, client_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id,
            client_id,
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            notes: None,
            estimated_duration: None,
        }
    }

    /// Determine whether a transition is permitted from the current status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::TerminalState` when the assignment is completed or
    /// cancelled, and `AppError::InvalidTransition` for any other illegal
    /// step.
    pub fn check(&self, transition: Transition) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AppError::TerminalState(format!(
                "assignment {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        if !transition.allowed_from(self.status) {
            return Err(AppError::InvalidTransition(format!(
                "cannot move assignment {} from {} to {}",
                self.id,
                self.status.as_str(),
                transition.target().as_str()
            )));
        }
        Ok(())
    }

    /// Apply a transition in memory, stamping the matching timestamp.
    ///
    /// # Errors
    ///
    /// Propagates the failure from [`Assignment::check`]; the record is left
    /// untouched in that case.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<()> {
        self.check(transition)?;
        match transition {
            Transition::Accept => self.accepted_at = Some(now),
            Transition::Start => self.started_at = Some(now),
            Transition::Complete => self.completed_at = Some(now),
            Transition::Cancel => self.cancelled_at = Some(now),
        }
        self.status = transition.target();
        Ok(())
    }

    /// Time spent on site, once both start and completion are known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}
