//! SDK error types.
//!
//! Provides validation errors for request payloads built on the client side.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// A required text field was empty.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Rating score outside the accepted range.
    #[error("invalid rating score: {0} (expected 1-5)")]
    InvalidScore(u8),
}
