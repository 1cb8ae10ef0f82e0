//! Inbound realtime message parsing.

use serde::Deserialize;
use serde_json::Value;

use crate::models::assignment::AssignmentStatus;
use crate::models::location::LocationFix;
use crate::{AppError, Result};

/// A message an agent or manager sends over the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Agent position report.
    LocationUpdate(LocationPayload),
    /// Agent assignment status report.
    StatusUpdate(StatusPayload),
    /// Keep-alive; answered with `pong`.
    Ping {
        /// Echoed back untouched.
        timestamp: Option<Value>,
    },
}

/// Body of a `location_update` message.
///
/// Coordinates stay raw JSON so that bad values can be dropped silently
/// instead of failing the whole message.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LocationPayload {
    /// Latitude; `lat` is accepted too.
    #[serde(default, alias = "lat")]
    pub latitude: Option<Value>,
    /// Longitude; `lon` and `lng` are accepted too.
    #[serde(default, alias = "lon", alias = "lng")]
    pub longitude: Option<Value>,
    /// GPS accuracy in metres.
    #[serde(default)]
    pub accuracy: Option<Value>,
    /// Client-side report time, relayed to managers.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl LocationPayload {
    /// The reported position, if both coordinates are usable numbers.
    #[must_use]
    pub fn fix(&self) -> Option<LocationFix> {
        let latitude = coordinate(self.latitude.as_ref()?)?;
        let longitude = coordinate(self.longitude.as_ref()?)?;
        let accuracy = self.accuracy.as_ref().and_then(coordinate);
        Some(LocationFix {
            latitude,
            longitude,
            accuracy,
        })
    }
}

/// Body of a `status_update` message.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StatusPayload {
    /// Target assignment; a string or a number.
    #[serde(default)]
    pub assignment_id: Option<Value>,
    /// Requested status name.
    #[serde(default)]
    pub status: Option<String>,
    /// Client-side report time, relayed to managers.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl StatusPayload {
    /// Assignment id as text.
    #[must_use]
    pub fn assignment_id(&self) -> Option<String> {
        match self.assignment_id.as_ref()? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Requested status, if it names a known one.
    #[must_use]
    pub fn status(&self) -> Option<AssignmentStatus> {
        self.status.as_deref().and_then(AssignmentStatus::parse)
    }
}

/// Accept JSON numbers and numeric strings; reject everything else.
fn coordinate(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Parse one text frame.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` carrying the message to send back:
/// `Invalid JSON format` for unparseable text, otherwise a description of
/// the missing or unknown `type`.
pub fn parse_inbound(text: &str) -> Result<InboundMessage> {
    let value: Value = serde_json::from_str(text)
        .map_err(|_| AppError::MalformedInput("Invalid JSON format".into()))?;

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(AppError::MalformedInput("Missing message type".into()));
    };

    match kind {
        "location_update" => Ok(InboundMessage::LocationUpdate(body(value)?)),
        "status_update" => Ok(InboundMessage::StatusUpdate(body(value)?)),
        "ping" => Ok(InboundMessage::Ping {
            timestamp: value.get("timestamp").cloned(),
        }),
        other => Err(AppError::MalformedInput(format!(
            "Unknown message type: {other}"
        ))),
    }
}

fn body<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| AppError::MalformedInput(format!("Invalid message body: {err}")))
}
