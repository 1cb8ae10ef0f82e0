//! Caller identity resolution.
//!
//! Identity comes from the `x-user-id` header or the `user_id` query
//! parameter; browsers cannot set headers on a WebSocket handshake, hence
//! the query fallback. When an API token is configured it must be supplied
//! the same way, as `x-api-token` or `token`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Uri;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::models::user::User;
use crate::AppError;

use super::AppState;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the shared API token.
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// A resolved, existing caller.
#[derive(Debug, Clone)]
pub struct Identity(pub User);

impl Identity {
    /// Fail unless the caller is a manager.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for agents.
    pub fn require_manager(&self) -> Result<&User, AppError> {
        if self.0.is_agent() {
            return Err(AppError::Forbidden("manager access required".into()));
        }
        Ok(&self.0)
    }

    /// Fail unless the caller is an agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for managers.
    pub fn require_agent(&self) -> Result<&User, AppError> {
        if !self.0.is_agent() {
            return Err(AppError::Forbidden("agent access required".into()));
        }
        Ok(&self.0)
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if let Some(expected) = state.config.api_token.as_deref() {
            let supplied = header_value(parts, API_TOKEN_HEADER)
                .or_else(|| query_param(&parts.uri, "token"));
            if !supplied.is_some_and(|token| token_matches(&token, expected)) {
                warn!(path = %parts.uri.path(), "rejected request with invalid api token");
                return Err(AppError::Unauthorized("invalid api token".into()));
            }
        }

        let user_id = header_value(parts, USER_ID_HEADER)
            .or_else(|| query_param(&parts.uri, "user_id"))
            .ok_or_else(|| AppError::Unauthorized("missing user identity".into()))?;

        let user = state
            .dispatch
            .find_user(&user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("unknown user {user_id}")))?;
        Ok(Self(user))
    }
}

/// Compare tokens through their SHA-256 digests so the comparison time
/// depends on neither the token length nor the first differing byte.
fn token_matches(supplied: &str, expected: &str) -> bool {
    let supplied = Sha256::digest(supplied.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    supplied
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Extract a query parameter from a URI.
///
/// Returns `None` when the parameter is absent or empty; the first
/// occurrence wins.
pub(crate) fn query_param(uri: &Uri, key: &str) -> Option<String> {
    uri.query().and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_owned())
            .filter(|v| !v.is_empty())
    })
}
