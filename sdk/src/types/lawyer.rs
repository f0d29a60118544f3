//! Lawyer profile types.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A lawyer's public profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lawyer {
    /// Lawyer ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Main practice area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,

    /// Hourly rate in USD.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub hourly_rate: Option<Decimal>,

    /// Mean rating score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,

    /// Number of ratings received.
    #[serde(default)]
    pub rating_count: u32,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lawyer {
    /// Returns the average rating rendered with one decimal, or "unrated".
    #[must_use]
    pub fn rating_label(&self) -> String {
        match self.average_rating {
            Some(avg) if self.rating_count > 0 => {
                format!("{:.1}/5 ({} ratings)", avg, self.rating_count)
            }
            _ => "unrated".to_string(),
        }
    }
}

impl fmt::Display for Lawyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.specialization {
            Some(spec) => write!(f, "{} ({})", self.name, spec),
            None => write!(f, "{}", self.name),
        }
    }
}
