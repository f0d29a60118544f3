//! Realtime channel configuration.
//!
//! Provides configuration options for the realtime channel.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default server URL (same host as the REST API).
pub const DEFAULT_SERVER_URL: &str = "https://api.lexmarket.example";

/// Default path of the realtime endpoints.
pub const DEFAULT_PATH: &str = "/realtime";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// Default reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 1;

/// Maximum reconnect delay in seconds.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Transport used to carry channel frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Persistent WebSocket connection.
    WebSocket,
    /// HTTP long-polling.
    Polling,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "websocket"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

/// Realtime channel configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Server URL (`http://` or `https://`).
    pub server_url: String,

    /// Path prefix of the realtime endpoints.
    pub path: String,

    /// Transports to try, in order of preference.
    pub transports: Vec<Transport>,

    /// Heartbeat interval for WebSocket links.
    pub heartbeat_interval: Duration,

    /// Timeout for a single connection attempt, handshake included.
    pub connect_timeout: Duration,

    /// Whether dropped links are re-established.
    pub reconnection: bool,

    /// Initial reconnect delay.
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum consecutive reconnection attempts (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            path: DEFAULT_PATH.to_string(),
            transports: vec![Transport::WebSocket, Transport::Polling],
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            reconnection: true,
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_delay: Duration::from_secs(MAX_RECONNECT_DELAY_SECS),
            max_reconnect_attempts: None,
        }
    }
}

impl RealtimeConfig {
    /// Creates a new configuration with the given server URL.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Sets the endpoint path prefix.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the transport preference order.
    #[must_use]
    pub fn with_transports(mut self, transports: Vec<Transport>) -> Self {
        self.transports = transports;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables reconnection.
    #[must_use]
    pub fn with_reconnection(mut self, enabled: bool) -> Self {
        self.reconnection = enabled;
        self
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    fn base(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.path.trim_matches('/')
        )
    }

    /// Returns the WebSocket endpoint URL.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let base = self.base();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base
        };
        format!("{}/ws", base)
    }

    /// Returns the URL of a polling endpoint (`handshake`, `poll`, `send`).
    #[must_use]
    pub fn polling_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base(), endpoint)
    }

    /// Returns the delay before reconnection attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.max_reconnect_delay)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), super::error::RealtimeError> {
        if self.server_url.is_empty() {
            return Err(super::error::RealtimeError::InvalidConfig(
                "server_url cannot be empty".to_string(),
            ));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(super::error::RealtimeError::InvalidConfig(
                "server_url must start with http:// or https://".to_string(),
            ));
        }

        if self.transports.is_empty() {
            return Err(super::error::RealtimeError::InvalidConfig(
                "at least one transport is required".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(super::error::RealtimeError::InvalidConfig(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
