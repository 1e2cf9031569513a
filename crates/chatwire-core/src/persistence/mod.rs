//! Persistence port for the conversation store.
//!
//! The store writes through a [`PersistenceGateway`]; it never touches a
//! backing store directly. [`KvGateway`] maps the gateway operations onto
//! logical keys of any [`KvBackend`], JSON-encoding the values. Backends
//! live in `chatwire-infra` (files) and in [`memory`] (tests, ephemeral use).
//!
//! All operations are synchronous and last-write-wins per key; write
//! frequency is the store's concern.

pub mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use chatwire_types::conversation::{Conversation, Message};
use chatwire_types::error::PersistenceError;

pub use memory::MemoryKv;

/// Key holding the conversation list.
pub const CONVERSATIONS_KEY: &str = "chat_conversations";

/// Key holding the identifier of the last active conversation.
pub const ACTIVE_CONVERSATION_KEY: &str = "chat_current_conversation_id";

/// Key holding the messages of one conversation.
pub fn messages_key(conversation_id: &str) -> String {
    format!("chat_messages_{conversation_id}")
}

/// Snapshot storage for conversations and their messages.
pub trait PersistenceGateway {
    fn read_conversations(&self) -> Result<Vec<Conversation>, PersistenceError>;

    fn write_conversations(&self, conversations: &[Conversation]) -> Result<(), PersistenceError>;

    /// Messages of a conversation; empty when nothing is stored.
    fn read_messages(&self, conversation_id: &str) -> Result<Vec<Message>, PersistenceError>;

    fn write_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), PersistenceError>;

    /// No-op when nothing is stored.
    fn delete_messages(&self, conversation_id: &str) -> Result<(), PersistenceError>;

    fn read_active_id(&self) -> Result<Option<String>, PersistenceError>;

    /// `None` clears the stored identifier.
    fn write_active_id(&self, conversation_id: Option<&str>) -> Result<(), PersistenceError>;
}

/// String key/value storage.
///
/// Mirrors the browser-storage contract the web client relied on: string
/// values, upsert on write, delete is a no-op for missing keys.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        (**self).delete(key)
    }
}

/// [`PersistenceGateway`] over a [`KvBackend`].
#[derive(Debug, Clone)]
pub struct KvGateway<B> {
    backend: B,
}

impl<B: KvBackend> KvGateway<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.backend.get(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value).map_err(|e| PersistenceError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.backend.set(key, &raw)
    }
}

impl<B: KvBackend> PersistenceGateway for KvGateway<B> {
    fn read_conversations(&self) -> Result<Vec<Conversation>, PersistenceError> {
        Ok(self.read_json(CONVERSATIONS_KEY)?.unwrap_or_default())
    }

    fn write_conversations(&self, conversations: &[Conversation]) -> Result<(), PersistenceError> {
        self.write_json(CONVERSATIONS_KEY, conversations)
    }

    fn read_messages(&self, conversation_id: &str) -> Result<Vec<Message>, PersistenceError> {
        Ok(self
            .read_json(&messages_key(conversation_id))?
            .unwrap_or_default())
    }

    fn write_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), PersistenceError> {
        self.write_json(&messages_key(conversation_id), messages)
    }

    fn delete_messages(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        self.backend.delete(&messages_key(conversation_id))
    }

    fn read_active_id(&self) -> Result<Option<String>, PersistenceError> {
        // Stored as a bare string, not JSON.
        Ok(self
            .backend
            .get(ACTIVE_CONVERSATION_KEY)?
            .filter(|id| !id.is_empty()))
    }

    fn write_active_id(&self, conversation_id: Option<&str>) -> Result<(), PersistenceError> {
        match conversation_id {
            Some(id) => self.backend.set(ACTIVE_CONVERSATION_KEY, id),
            None => self.backend.delete(ACTIVE_CONVERSATION_KEY),
        }
    }
}
