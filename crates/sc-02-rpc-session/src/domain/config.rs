//! Session and authentication configuration with validation.

use sc_01_signer::Allowance;
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default maximum inbound frame size (1MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid coordinator URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid auth configuration: {0}")]
    InvalidAuth(String),
}

/// Connection-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Coordinator WebSocket URL.
    pub url: String,
    /// Interval between liveness pings.
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// How long a ping may wait for its pong before the session is torn down.
    #[serde(with = "humantime_serde")]
    pub keepalive_timeout: Duration,
    /// Surface unmatched inbound messages through `Session::events`.
    pub print_events: bool,
    /// Frames larger than this are skipped.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_timeout: DEFAULT_KEEPALIVE_INTERVAL,
            print_events: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Configuration for a given coordinator URL with defaults elsewhere.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SC_COORDINATOR_URL`: WebSocket URL (default: ws://localhost:8000/ws)
    /// - `SC_KEEPALIVE_SECS`: ping interval (default: 5)
    /// - `SC_KEEPALIVE_TIMEOUT_SECS`: pong deadline (default: 5)
    /// - `SC_PRINT_EVENTS`: surface server-push events (default: false)
    /// - `SC_MAX_MESSAGE_SIZE`: inbound frame limit in bytes (default: 1MB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("SC_COORDINATOR_URL").unwrap_or(defaults.url),
            keepalive_interval: env::var("SC_KEEPALIVE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.keepalive_interval),
            keepalive_timeout: env::var("SC_KEEPALIVE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.keepalive_timeout),
            print_events: env::var("SC_PRINT_EVENTS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.print_events),
            max_message_size: env::var("SC_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_message_size),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }

        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "keepalive_interval cannot be 0".into(),
            ));
        }

        if self.keepalive_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "keepalive_timeout cannot be 0".into(),
            ));
        }

        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Application metadata and policy for the authentication handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Application name; also the EIP-712 domain name.
    pub app_name: String,
    /// Application address bound into the policy.
    pub application: Address,
    /// Requested permission scope.
    pub scope: String,
    /// Session key lifetime.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
    /// Spending allowances granted to the session key.
    pub allowances: Vec<Allowance>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_name: "channel-client".to_string(),
            application: Address::zero(),
            scope: "console".to_string(),
            session_ttl: Duration::from_secs(3600),
            allowances: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::InvalidAuth("app_name cannot be empty".into()));
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidAuth("session_ttl cannot be 0".into()));
        }
        Ok(())
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
