//! Conversation and message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A conversation thread between a client and a lawyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Participant user IDs.
    #[serde(default)]
    pub participants: Vec<String>,

    /// Thread subject, usually the case title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Preview of the latest message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,

    /// Number of unread messages for the current user.
    #[serde(default)]
    pub unread_count: u32,

    /// Last activity time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    /// Returns true if the thread has unread messages.
    #[must_use]
    pub const fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    #[serde(alias = "_id")]
    pub id: String,

    /// Owning conversation.
    #[serde(default)]
    pub conversation_id: String,

    /// Author user ID.
    #[serde(default)]
    pub sender_id: String,

    /// Message text.
    #[serde(default, alias = "content")]
    pub body: String,

    /// Whether the recipient has read it.
    #[serde(default)]
    pub read: bool,

    /// Send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for sending a message.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewMessage<'a> {
    pub(crate) body: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_deserialize() {
        let json = r#"{"_id":"v1","participants":["u1","l1"],"subject":"Lease","unreadCount":2}"#;
        let conv: Conversation = serde_json::from_str(json).expect("deserialize");
        assert_eq!(conv.participants.len(), 2);
        assert!(conv.has_unread());
    }

    #[test]
    fn test_message_content_alias() {
        let json = r#"{"id":"m1","conversationId":"v1","senderId":"u1","content":"hello"}"#;
        let msg: Message = serde_json::from_str(json).expect("deserialize");
        assert_eq!(msg.body, "hello");
        assert!(!msg.read);
    }
}
