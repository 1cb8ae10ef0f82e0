//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name used for stored credentials.
const KEYRING_SERVICE: &str = "field-dispatch";

/// Realtime gateway limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RealtimeConfig {
    /// Largest inbound WebSocket message accepted, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// Parameters for the straight-line route approximation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RoutingConfig {
    /// Average travel speed used to estimate route duration.
    #[serde(default = "default_average_speed_kmh")]
    pub average_speed_kmh: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: default_average_speed_kmh(),
        }
    }
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

fn default_average_speed_kmh() -> f64 {
    30.0
}

fn default_http_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_http_port() -> u16 {
    8000
}

fn default_recent_assignments_limit() -> u32 {
    10
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file, or `:memory:` for an ephemeral store.
    pub db_path: PathBuf,
    /// Interface the HTTP server binds to.
    #[serde(default = "default_http_host")]
    pub http_host: IpAddr,
    /// HTTP port for the API and WebSocket gateway.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Number of assignments listed on dashboards.
    #[serde(default = "default_recent_assignments_limit")]
    pub recent_assignments_limit: u32,
    /// Realtime gateway limits.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Route estimation parameters.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Shared API token (populated at runtime, never read from TOML).
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the API token from the OS keychain with env-var fallback.
    ///
    /// A missing token is not an error: token checks are disabled and a
    /// warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.api_token = load_credential("api_token", "DISPATCH_API_TOKEN").await?;
        if self.api_token.is_none() {
            warn!("no api token configured; identity is accepted without a token");
        }
        Ok(())
    }

    /// Socket address for the HTTP listener.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http_host, self.http_port)
    }

    /// Whether the store lives only in memory.
    #[must_use]
    pub fn uses_memory_db(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("db_path must not be empty".into()));
        }

        if self.recent_assignments_limit == 0 {
            return Err(AppError::Config(
                "recent_assignments_limit must be greater than zero".into(),
            ));
        }

        if self.realtime.max_message_bytes < 256 {
            return Err(AppError::Config(
                "realtime.max_message_bytes must be at least 256".into(),
            ));
        }

        if !(self.routing.average_speed_kmh.is_finite() && self.routing.average_speed_kmh > 0.0) {
            return Err(AppError::Config(
                "routing.average_speed_kmh must be a positive number".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            tracing::debug!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
