//! Errors returned by [`LexClient`](super::LexClient) calls.

use std::fmt;

/// Failure of a REST call.
#[derive(Debug)]
pub enum ClientError {
    /// The request never produced a response.
    Request(reqwest::Error),

    /// The response body did not have the expected shape.
    Deserialization(String),

    /// Non-success status with the server's message.
    Api {
        /// Code from the body, or the HTTP status.
        code: String,
        /// Message from the body.
        message: String,
    },

    /// Rate limited (429).
    RateLimited {
        /// `Retry-After` header in seconds.
        retry_after: Option<u64>,
    },

    /// 404 for the given path.
    NotFound(String),

    /// Unauthorized (401).
    Unauthorized,

    /// Forbidden (403).
    Forbidden,

    /// The call needs a bearer token and none is configured.
    MissingToken,

    /// The [`ClientConfig`](super::ClientConfig) failed validation.
    InvalidConfig(String),

    /// The request timed out.
    Timeout,
}

impl ClientError {
    /// Returns true if the error means the session is no longer valid.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingToken)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "HTTP request failed: {}", e),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::Api { code, message } => write!(f, "API error [{}]: {}", code, message),
            Self::RateLimited { retry_after } => {
                if let Some(secs) = retry_after {
                    write!(f, "rate limited, retry after {} seconds", secs)
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::NotFound(resource) => write!(f, "not found: {}", resource),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::MissingToken => write!(f, "not logged in: no auth token"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Timeout => write!(f, "request timeout"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}
