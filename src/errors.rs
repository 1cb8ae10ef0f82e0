//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Requested entity does not exist or is not owned by the requester.
    NotFound(String),
    /// Caller identity is missing or could not be verified.
    Unauthorized(String),
    /// Caller is known but its role does not permit the action.
    Forbidden(String),
    /// Assignment lifecycle rule violated.
    InvalidTransition(String),
    /// Mutation attempted on a completed or cancelled assignment.
    TerminalState(String),
    /// Agent already holds an active assignment.
    AgentUnavailable(String),
    /// Client is not in the `pending` status.
    ClientNotPending(String),
    /// Payload could not be parsed or failed validation.
    MalformedInput(String),
    /// Event hub or server is shutting down.
    Closed(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::TerminalState(msg) => write!(f, "terminal state: {msg}"),
            Self::AgentUnavailable(msg) => write!(f, "agent unavailable: {msg}"),
            Self::ClientNotPending(msg) => write!(f, "client not pending: {msg}"),
            Self::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
            Self::Closed(msg) => write!(f, "closed: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}
