//! One-line renderings of each resource.

use crate::format::{
    format_currency, format_date, format_date_time, status_color, truncate_text, NOT_AVAILABLE,
};
use crate::types::{Appointment, Case, Conversation, Lawyer, Message, Rating};

const TITLE_WIDTH: usize = 40;
const TEXT_WIDTH: usize = 60;

/// How status tags are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowStyle {
    /// Plain text.
    #[default]
    Plain,
    /// Status tags wrapped in ANSI colors.
    Ansi,
}

impl RowStyle {
    fn tag(self, status: &str) -> String {
        let tag = format!("[{}]", status);
        match self {
            Self::Plain => tag,
            Self::Ansi => status_color(status).paint(&tag),
        }
    }
}

/// A resource that renders as one row of a list view.
pub trait ListItem {
    /// Noun used in the count header for one item.
    const SINGULAR: &'static str;
    /// Noun used in the count header otherwise.
    const PLURAL: &'static str;

    /// Renders the item as one line.
    fn row(&self, style: RowStyle) -> String;
}

/// Renders the count header, e.g. `3 cases`.
pub(crate) fn count_header<T: ListItem>(count: usize) -> String {
    let noun = if count == 1 { T::SINGULAR } else { T::PLURAL };
    format!("{} {}", count, noun)
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}

impl ListItem for Case {
    const SINGULAR: &'static str = "case";
    const PLURAL: &'static str = "cases";

    fn row(&self, style: RowStyle) -> String {
        let mut row = format!(
            "{}  {}  {}  budget {}  due {}",
            self.id,
            truncate_text(&self.title, TITLE_WIDTH),
            style.tag(&self.status),
            format_currency(self.budget),
            format_date(self.deadline)
        );
        if self.is_overdue() {
            row.push_str("  overdue");
        }
        row
    }
}

impl ListItem for Lawyer {
    const SINGULAR: &'static str = "lawyer";
    const PLURAL: &'static str = "lawyers";

    fn row(&self, _style: RowStyle) -> String {
        format!(
            "{}  {}  {}  {}/hr  {}",
            self.id,
            self.name,
            or_na(self.specialization.as_deref()),
            format_currency(self.hourly_rate),
            self.rating_label()
        )
    }
}

impl ListItem for Rating {
    const SINGULAR: &'static str = "rating";
    const PLURAL: &'static str = "ratings";

    fn row(&self, _style: RowStyle) -> String {
        format!(
            "{}  {}  {}",
            self.stars(),
            format_date(self.created_at),
            truncate_text(&self.comment, TEXT_WIDTH)
        )
    }
}

impl ListItem for Conversation {
    const SINGULAR: &'static str = "conversation";
    const PLURAL: &'static str = "conversations";

    fn row(&self, _style: RowStyle) -> String {
        let title = match self.subject.as_deref() {
            Some(subject) if !subject.is_empty() => subject.to_string(),
            _ => self.participants.join(", "),
        };
        let mut row = format!(
            "{}  {}  {}  {}",
            self.id,
            truncate_text(&title, TITLE_WIDTH),
            format_date_time(self.updated_at),
            truncate_text(or_na(self.last_message.as_deref()), TEXT_WIDTH)
        );
        if self.has_unread() {
            row.push_str(&format!("  ({} unread)", self.unread_count));
        }
        row
    }
}

impl ListItem for Message {
    const SINGULAR: &'static str = "message";
    const PLURAL: &'static str = "messages";

    fn row(&self, _style: RowStyle) -> String {
        format!(
            "[{}] {}: {}",
            format_date_time(self.created_at),
            or_na(Some(self.sender_id.as_str())),
            self.body
        )
    }
}

impl ListItem for Appointment {
    const SINGULAR: &'static str = "appointment";
    const PLURAL: &'static str = "appointments";

    fn row(&self, style: RowStyle) -> String {
        format!(
            "{}  {}  {}  {}  {}",
            self.id,
            truncate_text(&self.title, TITLE_WIDTH),
            style.tag(&self.status),
            format_date_time(self.starts_at),
            or_na(self.location.as_deref())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_header() {
        assert_eq!(count_header::<Case>(3), "3 cases");
        assert_eq!(count_header::<Case>(1), "1 case");
        assert_eq!(count_header::<Lawyer>(0), "0 lawyers");
    }

    #[test]
    fn test_case_row() {
        let case: Case = serde_json::from_str(
            r#"{"_id":"c1","title":"Lease dispute","status":"open","budget":1200,"deadline":"2099-03-01T00:00:00Z"}"#,
        )
        .expect("case");
        assert_eq!(
            case.row(RowStyle::Plain),
            "c1  Lease dispute  [open]  budget $1,200.00  due Mar 1, 2099"
        );
        assert_eq!(
            case.row(RowStyle::Ansi),
            "c1  Lease dispute  \x1b[34m[open]\x1b[0m  budget $1,200.00  due Mar 1, 2099"
        );
    }

    #[test]
    fn test_overdue_case_row() {
        let case: Case =
            serde_json::from_str(r#"{"id":"c2","deadline":"2001-01-01T00:00:00Z"}"#).expect("case");
        assert!(case.row(RowStyle::Plain).ends_with("  overdue"));
    }

    #[test]
    fn test_lawyer_row_missing_fields() {
        let lawyer: Lawyer = serde_json::from_str(r#"{"id":"l1","name":"Ada Park"}"#).expect("lawyer");
        assert_eq!(lawyer.row(RowStyle::Plain), "l1  Ada Park  N/A  N/A/hr  unrated");
    }

    #[test]
    fn test_conversation_row_unread() {
        let conversation: Conversation = serde_json::from_str(
            r#"{"id":"v1","participants":["u1","l1"],"unreadCount":2}"#,
        )
        .expect("conversation");
        assert_eq!(
            conversation.row(RowStyle::Plain),
            "v1  u1, l1  N/A  N/A  (2 unread)"
        );
    }
}
