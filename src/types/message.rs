use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque identifier of a message within a conversation.
///
/// Identifiers are handed out in increasing order and never reused, so an id
/// stays valid (and unambiguous) for as long as the conversation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Text typed by the person using the client.
    User,
    /// Text produced by the chat service.
    Assistant,
}

/// Lifecycle of a message.
///
/// Only a `Streaming` message accepts protocol events; the other states are
/// final as far as the decoder is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Created but not yet receiving output.
    Pending,
    /// The active target for decoder output.
    Streaming,
    /// Finished normally.
    Complete,
    /// Finished with an error; `text` holds the rendered error.
    Failed,
}

impl MessageStatus {
    /// Returns true once no further events may change the message.
    pub fn is_final(self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Failed)
    }
}

/// A single entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier.
    pub id: MessageId,
    /// Author of the message.
    pub role: MessageRole,
    /// Accumulated text.
    pub text: String,
    /// Creation time, set once.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
    /// Current lifecycle state.
    pub status: MessageStatus,
}

impl Message {
    pub(crate) fn user(id: MessageId, text: String) -> Self {
        Self {
            id,
            role: MessageRole::User,
            text,
            created_at: OffsetDateTime::now_utc(),
            status: MessageStatus::Complete,
        }
    }

    pub(crate) fn pending_assistant(id: MessageId) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            text: String::new(),
            created_at: OffsetDateTime::now_utc(),
            status: MessageStatus::Streaming,
        }
    }

    /// Returns true if this message is the active streaming target.
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn user_messages_start_complete() {
        let msg = Message::user(MessageId::new(7), "hi".to_string());
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.status, MessageStatus::Complete);
        assert!(!msg.is_streaming());
    }

    #[test]
    fn message_serialization() {
        let mut msg = Message::pending_assistant(MessageId::new(3));
        msg.created_at = time::macros::datetime!(2024-05-01 12:30:00 UTC);
        let json = to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "id": 3,
                "role": "assistant",
                "text": "",
                "created_at": "2024-05-01T12:30:00Z",
                "status": "streaming"
            })
        );
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn final_states() {
        assert!(MessageStatus::Complete.is_final());
        assert!(MessageStatus::Failed.is_final());
        assert!(!MessageStatus::Streaming.is_final());
        assert!(!MessageStatus::Pending.is_final());
    }

    #[test]
    fn id_display() {
        assert_eq!(MessageId::new(12).to_string(), "msg-12");
    }
}
