//! Appointment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scheduled meeting between a client and a lawyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Appointment ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Title shown in calendars.
    #[serde(default)]
    pub title: String,

    /// Status label (e.g. "scheduled", "cancelled").
    #[serde(default)]
    pub status: String,

    /// Start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,

    /// End time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,

    /// Meeting place or video link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Related case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Appointment {
    /// Returns true if the appointment has already started.
    #[must_use]
    pub fn is_past(&self) -> bool {
        crate::format::is_overdue(self.starts_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_deserialize() {
        let json = r#"{"_id":"a1","title":"Intake call","status":"scheduled","startsAt":"2099-05-01T15:00:00Z","location":"video"}"#;
        let appt: Appointment = serde_json::from_str(json).expect("deserialize");
        assert_eq!(appt.id, "a1");
        assert!(!appt.is_past());
        assert_eq!(appt.location.as_deref(), Some("video"));
    }
}
