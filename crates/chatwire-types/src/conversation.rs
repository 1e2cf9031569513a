//! Conversation and message types.
//!
//! These types model the local view of a chat: the list of conversations a
//! user has started and the messages of the one currently open. They are
//! persisted as JSON with camelCase field names so a cache written by the
//! web client stays readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Title given to a conversation before its first user message arrives.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Prefix of identifiers generated locally for conversations the server has
/// not assigned an identifier to yet.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// A single chat message.
///
/// Assistant messages are mutated in place while a reply streams in. The id
/// is an opaque string: locally created messages use a UUID v7, histories
/// written by the web client carry ids like `msg_<ts>_<rand>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }
}

/// An entry in the conversation list.
///
/// A conversation starts out `pending` with a locally generated identifier;
/// once the backend assigns a durable one the identifier is overwritten and
/// `pending` is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a pending conversation with a fresh local identifier and the
    /// placeholder title.
    pub fn pending() -> Self {
        let now = Utc::now();
        Self {
            id: format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7()),
            title: DEFAULT_TITLE.to_string(),
            pending: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The server-assigned identifier, or `None` while pending.
    pub fn server_id(&self) -> Option<&str> {
        if self.pending { None } else { Some(&self.id) }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_roundtrip() {
        for sender in [Sender::User, Sender::Assistant] {
            let parsed: Sender = sender.to_string().parse().unwrap();
            assert_eq!(sender, parsed);
        }
        assert!("system".parse::<Sender>().is_err());
    }

    #[test]
    fn test_sender_serde_lowercase() {
        let json = serde_json::to_string(&Sender::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_pending_conversation_has_no_server_id() {
        let conv = Conversation::pending();
        assert!(conv.pending);
        assert!(conv.id.starts_with(LOCAL_ID_PREFIX));
        assert_eq!(conv.server_id(), None);
        assert!(conv.has_default_title());
    }

    #[test]
    fn test_conversation_serializes_camel_case() {
        let mut conv = Conversation::pending();
        conv.id = "abc".to_string();
        conv.pending = false;
        let json = serde_json::to_string(&conv).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\""));
        assert_eq!(conv.server_id(), Some("abc"));
    }

    #[test]
    fn test_conversation_without_pending_field_parses() {
        let json = r#"{"id":"conv_1","title":"hi","createdAt":"2024-05-01T10:00:00Z","updatedAt":"2024-05-01T10:00:00Z"}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert!(!conv.pending);
        assert_eq!(conv.server_id(), Some("conv_1"));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::new(Sender::User, "a");
        let b = Message::new(Sender::User, "a");
        assert_ne!(a.id, b.id);
        assert!(!a.is_assistant());
    }

    #[test]
    fn test_web_client_messages_parse() {
        let json = r#"[
            {"id":"msg_1714557600000_abc123xyz","sender":"user","content":"hello","timestamp":"2024-05-01T10:00:00.000Z"},
            {"id":"msg_1714557601000_def456uvw","sender":"assistant","content":"Hi there","timestamp":"2024-05-01T10:00:01.000Z"}
        ]"#;
        let messages: Vec<Message> = serde_json::from_str(json).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg_1714557600000_abc123xyz");
        assert_eq!(messages[0].sender, Sender::User);
        assert!(messages[1].is_assistant());
        assert_eq!(messages[1].content, "Hi there");

        let reencoded = serde_json::to_string(&messages).unwrap();
        assert!(reencoded.contains("\"id\":\"msg_1714557600000_abc123xyz\""));
    }
}
