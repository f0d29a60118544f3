//! Realtime frame types.
//!
//! Frames are JSON objects tagged by `type`, carried unchanged by both the
//! WebSocket and the long-polling transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credentials presented when a channel connects.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// Bearer token.
    pub token: String,
    /// User identity, absent for channels opened without a session user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AuthPayload {
    /// Creates an auth payload. Blank user IDs are treated as absent.
    #[must_use]
    pub fn new(token: impl Into<String>, user_id: Option<&str>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPayload")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Client-to-server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authenticate the channel.
    Auth(AuthPayload),
    /// Named application event.
    Event {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default)]
        data: Value,
    },
    /// Heartbeat.
    Ping {
        /// Timestamp in milliseconds.
        timestamp: u64,
    },
    /// Graceful close of a polling session.
    Disconnect,
}

/// Server-to-client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Authentication accepted.
    Connected {
        /// Session ID assigned by the server.
        #[serde(default)]
        sid: Option<String>,
    },
    /// Authentication rejected.
    ConnectError {
        /// Rejection reason.
        message: String,
    },
    /// Named application event.
    Event {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default)]
        data: Value,
    },
    /// Heartbeat response.
    Pong {
        /// Timestamp in milliseconds.
        timestamp: u64,
    },
    /// The server ended the session.
    Disconnect {
        /// Reason given by the server.
        #[serde(default)]
        reason: Option<String>,
    },
}
