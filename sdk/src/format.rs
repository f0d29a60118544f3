//! Display formatting helpers.
//!
//! Pure functions used when rendering resources. Missing values render as
//! [`NOT_AVAILABLE`].

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Placeholder for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Formats a timestamp as a medium en-US date, e.g. `Jan 15, 2024`.
#[must_use]
pub fn format_date(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.format("%b %-d, %Y").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Formats a timestamp with time of day, e.g. `Jan 15, 2024, 3:04 PM`.
#[must_use]
pub fn format_date_time(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.format("%b %-d, %Y, %-I:%M %p").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Formats an amount as US dollars, e.g. `$1,234.50`.
#[must_use]
pub fn format_currency(amount: Option<Decimal>) -> String {
    let Some(amount) = amount else {
        return NOT_AVAILABLE.to_string();
    };

    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);

    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!(
        "{}${}.{}",
        if negative { "-" } else { "" },
        group_thousands(whole),
        cents
    )
}

/// Formats a floating-point amount as US dollars.
///
/// Non-finite values render as [`NOT_AVAILABLE`].
#[must_use]
pub fn format_currency_f64(amount: Option<f64>) -> String {
    format_currency(amount.and_then(|v| Decimal::try_from(v).ok()))
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Returns true if the timestamp is strictly before the current time.
#[must_use]
pub fn is_overdue(timestamp: Option<DateTime<Utc>>) -> bool {
    is_overdue_at(timestamp, Utc::now())
}

/// Returns true if the timestamp is strictly before `now`.
#[must_use]
pub fn is_overdue_at(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    timestamp.is_some_and(|ts| ts < now)
}

/// Truncates text to `max_len` characters, appending [`ELLIPSIS`] when cut.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Display color category for a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusColor {
    /// Finished successfully.
    Green,
    /// Waiting on someone.
    Yellow,
    /// Open or upcoming.
    Blue,
    /// Rejected, cancelled or late.
    Red,
    /// Anything else.
    #[default]
    Gray,
}

impl StatusColor {
    /// Returns the color name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Gray => "gray",
        }
    }

    /// Returns the ANSI SGR foreground code for terminals.
    #[must_use]
    pub const fn ansi_code(&self) -> u8 {
        match self {
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Red => 31,
            Self::Gray => 90,
        }
    }

    /// Wraps `text` in this color's ANSI escape sequence.
    #[must_use]
    pub fn paint(&self, text: &str) -> String {
        format!("\x1b[{}m{}\x1b[0m", self.ansi_code(), text)
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const STATUS_COLORS: &[(&str, StatusColor)] = &[
    ("open", StatusColor::Blue),
    ("active", StatusColor::Blue),
    ("scheduled", StatusColor::Blue),
    ("pending", StatusColor::Yellow),
    ("in_progress", StatusColor::Yellow),
    ("in progress", StatusColor::Yellow),
    ("in-progress", StatusColor::Yellow),
    ("accepted", StatusColor::Green),
    ("completed", StatusColor::Green),
    ("resolved", StatusColor::Green),
    ("rejected", StatusColor::Red),
    ("declined", StatusColor::Red),
    ("cancelled", StatusColor::Red),
    ("canceled", StatusColor::Red),
    ("overdue", StatusColor::Red),
    ("closed", StatusColor::Gray),
];

/// Maps a status label to its display color, ignoring case.
///
/// Unknown labels map to [`StatusColor::Gray`].
#[must_use]
pub fn status_color(status: &str) -> StatusColor {
    let status = status.trim().to_lowercase();
    STATUS_COLORS
        .iter()
        .find(|(label, _)| *label == status)
        .map(|(_, color)| *color)
        .unwrap_or_default()
}
