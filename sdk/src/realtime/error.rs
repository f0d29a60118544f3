//! Realtime channel error types.

use std::fmt;

/// Realtime channel errors.
#[derive(Debug)]
pub enum RealtimeError {
    /// Connection failed.
    Connection(String),

    /// Transport protocol error.
    Protocol(String),

    /// Failed to serialize a frame or payload.
    Serialization(String),

    /// Failed to deserialize a frame.
    Deserialization(String),

    /// The server rejected the credentials.
    AuthRejected(String),

    /// No channel is available.
    NotConnected,

    /// The channel is closed.
    Closed,

    /// Connection attempt timed out.
    Timeout,

    /// Invalid configuration.
    InvalidConfig(String),

    /// Send failed.
    SendFailed(String),
}

impl RealtimeError {
    /// Returns true if the error is an authentication rejection.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }
}

impl fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::AuthRejected(msg) => write!(f, "authentication rejected: {}", msg),
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "channel closed"),
            Self::Timeout => write!(f, "connection timeout"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::SendFailed(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for RealtimeError {}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for RealtimeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_error_display() {
        let err = RealtimeError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "connection failed: refused");
    }

    #[test]
    fn test_realtime_error_auth() {
        let err = RealtimeError::AuthRejected("invalid token".to_string());
        assert_eq!(err.to_string(), "authentication rejected: invalid token");
        assert!(err.is_auth_rejection());
        assert!(!RealtimeError::Closed.is_auth_rejection());
    }

    #[test]
    fn test_realtime_error_not_connected() {
        assert_eq!(RealtimeError::NotConnected.to_string(), "not connected");
        assert_eq!(RealtimeError::Closed.to_string(), "channel closed");
    }
}
