//! Case and bid types.
//!
//! Clients post cases; lawyers respond with bids.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SdkError;

/// A legal case posted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// Case ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Short title.
    #[serde(default)]
    pub title: String,

    /// Full description.
    #[serde(default)]
    pub description: String,

    /// Workflow status label (e.g. "open", "in_progress").
    #[serde(default)]
    pub status: String,

    /// Practice area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Budget offered by the client, in USD.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<Decimal>,

    /// Deadline for the work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Remaining backend fields, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Case {
    /// Returns true if the deadline has passed.
    #[must_use]
    pub fn is_overdue(&self) -> bool {
        crate::format::is_overdue(self.deadline)
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Case({}, {})", self.id, self.title)
    }
}

/// Payload for posting a new case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCase {
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Practice area.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Budget in USD.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<Decimal>,
    /// Deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl NewCase {
    /// Creates a new case payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the title or description is blank.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Result<Self, SdkError> {
        let title = title.into();
        let description = description.into();

        if title.trim().is_empty() {
            return Err(SdkError::EmptyField("title"));
        }
        if description.trim().is_empty() {
            return Err(SdkError::EmptyField("description"));
        }

        Ok(Self {
            title,
            description,
            category: None,
            budget: None,
            deadline: None,
        })
    }

    /// Sets the practice area.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the budget is negative.
    pub fn with_budget(mut self, budget: Decimal) -> Result<Self, SdkError> {
        if budget.is_sign_negative() {
            return Err(SdkError::InvalidAmount(budget.to_string()));
        }
        self.budget = Some(budget);
        Ok(self)
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A lawyer's bid on a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    /// Bid ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Case the bid is for.
    #[serde(default)]
    pub case_id: String,

    /// Bidding lawyer.
    #[serde(default)]
    pub lawyer_id: String,

    /// Offered fee in USD.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Decimal>,

    /// Cover message.
    #[serde(default)]
    pub message: String,

    /// Bid status (e.g. "pending", "accepted").
    #[serde(default)]
    pub status: String,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for placing a bid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBid {
    /// Offered fee in USD.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Cover message.
    pub message: String,
}

impl NewBid {
    /// Creates a new bid payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive.
    pub fn new(amount: Decimal, message: impl Into<String>) -> Result<Self, SdkError> {
        if amount <= Decimal::ZERO {
            return Err(SdkError::InvalidAmount(amount.to_string()));
        }
        Ok(Self {
            amount,
            message: message.into(),
        })
    }
}
