//! Rating types.
//!
//! Clients and lawyers rate each other after a case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SdkError;

/// Lowest accepted score.
pub const MIN_SCORE: u8 = 1;

/// Highest accepted score.
pub const MAX_SCORE: u8 = 5;

/// A rating left by one party for another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Rating ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Rated lawyer.
    #[serde(default)]
    pub lawyer_id: String,

    /// Author of the rating.
    #[serde(default)]
    pub client_id: String,

    /// Score from 1 to 5.
    #[serde(default)]
    pub score: u8,

    /// Free-text comment.
    #[serde(default, alias = "review")]
    pub comment: String,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Rating {
    /// Returns the score as filled and empty stars, e.g. `***--`.
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::from(self.score.min(MAX_SCORE));
        let empty = usize::from(MAX_SCORE) - filled;
        format!("{}{}", "*".repeat(filled), "-".repeat(empty))
    }
}

/// Payload for submitting a rating.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    /// Rated lawyer.
    pub lawyer_id: String,
    /// Case the rating refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    /// Score from 1 to 5.
    pub score: u8,
    /// Free-text comment.
    pub comment: String,
}

impl NewRating {
    /// Creates a rating payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the lawyer ID is blank or the score is out of range.
    pub fn new(
        lawyer_id: impl Into<String>,
        score: u8,
        comment: impl Into<String>,
    ) -> Result<Self, SdkError> {
        let lawyer_id = lawyer_id.into();
        if lawyer_id.trim().is_empty() {
            return Err(SdkError::EmptyField("lawyer_id"));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(SdkError::InvalidScore(score));
        }
        Ok(Self {
            lawyer_id,
            case_id: None,
            score,
            comment: comment.into(),
        })
    }

    /// Links the rating to a case.
    #[must_use]
    pub fn for_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }
}
