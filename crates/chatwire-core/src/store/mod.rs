//! Conversation store: the in-memory chat model.
//!
//! Owns the conversation list, the active conversation's messages and the
//! session flags. Streamed fragments are applied here and written through the
//! [`PersistenceGateway`] on a debounce; structural changes (new entries,
//! titles, identifier adoption, deletes) are written immediately.
//!
//! Persistence failures never surface to callers: reads recover as empty and
//! writes are logged.
//!
//! Every method takes `&mut self`, so operations never interleave. Replies
//! that outlive the conversation they were addressed to are recognised by the
//! store epoch, which moves whenever the active conversation changes.

pub mod clock;
pub mod debounce;
pub mod title;

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use chatwire_types::conversation::{Conversation, DEFAULT_TITLE, Message, Sender};

use crate::persistence::PersistenceGateway;

pub use clock::{Clock, ManualClock, TokioClock};
pub use debounce::Debouncer;
pub use title::derive_title;

/// Default quiet period before streamed content is written.
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Where the fragments of one reply belong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub(crate) epoch: u64,
    pub(crate) message_id: String,
    pub(crate) conversation_id: Option<String>,
}

impl ReplyTarget {
    /// Id of the assistant message the reply is written into.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Conversation the reply was started in, updated when the server assigns
    /// its identifier.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }
}

pub struct ConversationStore<G, C = TokioClock> {
    gateway: G,
    clock: C,
    conversations: Vec<Conversation>,
    current_id: Option<String>,
    messages: Vec<Message>,
    is_new: bool,
    is_streaming: bool,
    epoch: u64,
    debounce: Debouncer,
}

impl<G: PersistenceGateway, C: Clock> ConversationStore<G, C> {
    /// An empty store in the new-conversation state. Call
    /// [`restore`](Self::restore) to load persisted state.
    pub fn new(gateway: G, clock: C, debounce: Duration) -> Self {
        Self {
            gateway,
            clock,
            conversations: Vec::new(),
            current_id: None,
            messages: Vec::new(),
            is_new: true,
            is_streaming: false,
            epoch: 0,
            debounce: Debouncer::new(debounce),
        }
    }

    // -- accessors ---------------------------------------------------------

    /// The persistence gateway writes go through.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Conversation list, most recently created first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Look up a list entry by identifier.
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Messages of the active conversation.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Identifier of the active conversation; `None` before the first message.
    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    /// The list entry of the active conversation, if it has one.
    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current_id.as_deref().and_then(|id| self.conversation(id))
    }

    /// True in the new-conversation state, until a server identifier is
    /// adopted or an existing conversation is opened.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether a reply is currently streaming in.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Mark a reply as started or finished.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.is_streaming = streaming;
    }

    // -- lifecycle ---------------------------------------------------------

    /// Load the conversation list and the last active conversation.
    pub fn restore(&mut self) {
        self.debounce.cancel();
        self.conversations = match self.gateway.read_conversations() {
            Ok(conversations) => conversations,
            Err(err) => {
                warn!(error = %err, "failed to read conversation list, starting empty");
                Vec::new()
            }
        };

        let active = match self.gateway.read_active_id() {
            Ok(active) => active,
            Err(err) => {
                warn!(error = %err, "failed to read active conversation");
                None
            }
        };

        self.epoch += 1;
        match active.filter(|id| self.conversation(id).is_some()) {
            Some(id) => {
                self.messages = self.load_messages(&id);
                self.current_id = Some(id);
                self.is_new = false;
            }
            None => {
                self.current_id = None;
                self.messages.clear();
                self.is_new = true;
            }
        }
        info!(
            conversations = self.conversations.len(),
            active = ?self.current_id,
            "conversation store restored"
        );
    }

    /// Enter the new-conversation state. No list entry is created until the
    /// first user message.
    pub fn start_new_conversation(&mut self) {
        self.flush();
        self.current_id = None;
        self.messages.clear();
        self.is_new = true;
        self.epoch += 1;
        debug!("started new conversation");
    }

    /// Make `id` the active conversation, loading its messages.
    ///
    /// Returns `false` for an unknown identifier.
    pub fn switch_to(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            warn!(conversation_id = id, "cannot switch to unknown conversation");
            return false;
        };
        if self.current_id.as_deref() == Some(id) {
            return true;
        }

        self.flush();
        self.conversations[index].touch();
        self.current_id = Some(id.to_string());
        self.messages = self.load_messages(id);
        self.is_new = false;
        self.epoch += 1;
        self.save_conversations();
        debug!(conversation_id = id, messages = self.messages.len(), "switched conversation");
        true
    }

    /// Remove a conversation and its stored messages.
    ///
    /// Deleting the active conversation activates the most recent remaining
    /// one, or returns to the new-conversation state.
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.conversations.remove(index);

        if self.current_id.as_deref() == Some(id) {
            self.debounce.cancel();
            match self.conversations.first().map(|c| c.id.clone()) {
                Some(next) => {
                    self.switch_to(&next);
                }
                None => {
                    self.current_id = None;
                    self.messages.clear();
                    self.is_new = true;
                    self.epoch += 1;
                    if let Err(err) = self.gateway.write_active_id(None) {
                        warn!(error = %err, "failed to clear active conversation");
                    }
                }
            }
        }

        if let Err(err) = self.gateway.delete_messages(id) {
            warn!(conversation_id = id, error = %err, "failed to delete messages");
        }
        self.save_conversations();
        info!(conversation_id = id, "conversation deleted");
        true
    }

    /// Rename a conversation. An empty title resets it to the placeholder.
    pub fn rename_conversation(&mut self, id: &str, title: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let title = title.trim();
        let conversation = &mut self.conversations[index];
        conversation.title = if title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title.to_string()
        };
        conversation.touch();
        self.save_conversations();
        true
    }

    /// Drop every message of the active conversation.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.flush();
    }

    // -- messages ----------------------------------------------------------

    /// Append a user message, materialising the list entry for a new
    /// conversation first.
    pub fn append_user_message(&mut self, text: &str) -> Message {
        if self.current_conversation().is_none() {
            let conversation = Conversation::pending();
            debug!(conversation_id = %conversation.id, "materialising conversation");
            self.current_id = Some(conversation.id.clone());
            self.conversations.insert(0, conversation);
        }

        let message = Message::new(Sender::User, text);
        self.messages.push(message.clone());

        let first_user_message =
            self.messages.iter().filter(|m| m.sender == Sender::User).count() == 1;
        if let Some(index) = self.current_id.as_deref().and_then(|id| self.position(id)) {
            let conversation = &mut self.conversations[index];
            if first_user_message && conversation.has_default_title() {
                conversation.title = derive_title(text);
            }
            conversation.touch();
        }

        self.save_conversations();
        self.flush();
        message
    }

    /// Open an empty assistant message for a reply.
    pub fn begin_assistant_message(&mut self) -> ReplyTarget {
        let message = Message::new(Sender::Assistant, "");
        let target = ReplyTarget {
            epoch: self.epoch,
            message_id: message.id.clone(),
            conversation_id: self.current_id.clone(),
        };
        self.messages.push(message);
        target
    }

    /// Append to the open assistant message, if the last message is one.
    pub fn append_fragment(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                last.content.push_str(text);
                self.debounce.schedule(self.clock.now());
            }
            _ => debug!("no open assistant message, fragment dropped"),
        }
    }

    /// Append to the message named by `target`.
    ///
    /// Returns `false` and drops the fragment when the target is no longer
    /// the open assistant message of the active conversation.
    pub fn append_fragment_to(&mut self, target: &ReplyTarget, text: &str) -> bool {
        if target.epoch != self.epoch {
            debug!("stale reply target, fragment dropped");
            return false;
        }
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() && last.id == target.message_id => {
                last.content.push_str(text);
                self.debounce.schedule(self.clock.now());
                true
            }
            _ => {
                debug!("reply target is not the open message, fragment dropped");
                false
            }
        }
    }

    // -- identifiers -------------------------------------------------------

    /// Replace the active conversation's local identifier with the one the
    /// server assigned.
    pub fn adopt_server_id(&mut self, server_id: &str) -> bool {
        match self.current_id.clone() {
            Some(current) => self.adopt_server_id_for(&current, server_id),
            None => {
                debug!(server_id, "no active conversation to adopt identifier");
                false
            }
        }
    }

    /// Replace the identifier of any listed conversation, moving its stored
    /// messages to the new key.
    pub fn adopt_server_id_for(&mut self, conversation_id: &str, server_id: &str) -> bool {
        let Some(index) = self.position(conversation_id) else {
            warn!(conversation_id, server_id, "cannot adopt identifier for unknown conversation");
            return false;
        };
        if conversation_id == server_id {
            self.conversations[index].pending = false;
            if self.current_id.as_deref() == Some(conversation_id) {
                self.is_new = false;
            }
            return true;
        }

        let conversation = &mut self.conversations[index];
        conversation.id = server_id.to_string();
        conversation.pending = false;
        conversation.touch();

        if self.current_id.as_deref() == Some(conversation_id) {
            self.current_id = Some(server_id.to_string());
            self.is_new = false;
            if let Err(err) = self.gateway.delete_messages(conversation_id) {
                warn!(conversation_id, error = %err, "failed to delete messages under old key");
            }
            self.save_conversations();
            self.flush();
        } else {
            self.rekey_messages(conversation_id, server_id);
            self.save_conversations();
        }

        info!(local_id = conversation_id, server_id, "server identifier adopted");
        true
    }

    // -- persistence -------------------------------------------------------

    /// Write the active conversation's messages now and cancel the pending
    /// debounced write.
    pub fn flush(&mut self) {
        self.debounce.cancel();
        let Some(id) = self.current_id.as_deref() else {
            return;
        };
        if self.conversation(id).is_none() {
            return;
        }
        if let Err(err) = self.gateway.write_messages(id, &self.messages) {
            warn!(conversation_id = id, error = %err, "failed to write messages");
        }
    }

    /// Perform the debounced write if its deadline has passed.
    pub fn poll_persistence(&mut self) -> bool {
        if self.debounce.take_due(self.clock.now()) {
            self.flush();
            true
        } else {
            false
        }
    }

    /// When the pending debounced write is due, if one is pending.
    pub fn persistence_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == id)
    }

    fn load_messages(&self, id: &str) -> Vec<Message> {
        match self.gateway.read_messages(id) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(conversation_id = id, error = %err, "failed to read messages, starting empty");
                Vec::new()
            }
        }
    }

    fn save_conversations(&self) {
        if let Err(err) = self.gateway.write_conversations(&self.conversations) {
            warn!(error = %err, "failed to write conversation list");
        }
        if let Some(id) = self.current_id.as_deref() {
            if let Err(err) = self.gateway.write_active_id(Some(id)) {
                warn!(error = %err, "failed to write active conversation");
            }
        }
    }

    fn rekey_messages(&self, from: &str, to: &str) {
        let messages = match self.gateway.read_messages(from) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(conversation_id = from, error = %err, "failed to read messages for re-keying");
                return;
            }
        };
        if !messages.is_empty() {
            if let Err(err) = self.gateway.write_messages(to, &messages) {
                warn!(conversation_id = to, error = %err, "failed to write re-keyed messages");
                return;
            }
        }
        if let Err(err) = self.gateway.delete_messages(from) {
            warn!(conversation_id = from, error = %err, "failed to delete messages under old key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{
        ACTIVE_CONVERSATION_KEY, CONVERSATIONS_KEY, KvBackend, KvGateway, MemoryKv, messages_key,
    };
    use chatwire_types::conversation::LOCAL_ID_PREFIX;
    use chatwire_types::error::PersistenceError;

    type TestStore = ConversationStore<KvGateway<MemoryKv>, ManualClock>;

    fn store() -> (TestStore, ManualClock) {
        let clock = ManualClock::new();
        let store = ConversationStore::new(
            KvGateway::new(MemoryKv::new()),
            clock.clone(),
            DEFAULT_PERSIST_DEBOUNCE,
        );
        (store, clock)
    }

    fn stored_content(store: &TestStore, id: &str) -> Vec<String> {
        store
            .gateway()
            .read_messages(id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    #[test]
    fn test_new_store_is_in_new_state() {
        let (store, _) = store();
        assert!(store.is_new());
        assert!(!store.is_streaming());
        assert_eq!(store.current_id(), None);
        assert!(store.current_conversation().is_none());
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_first_user_message_materialises_pending_entry() {
        let (mut store, _) = store();
        store.append_user_message("Hello");

        assert_eq!(store.conversations().len(), 1);
        let conv = store.current_conversation().unwrap();
        assert!(conv.pending);
        assert!(conv.id.starts_with(LOCAL_ID_PREFIX));
        assert_eq!(conv.server_id(), None);
        assert_eq!(conv.title, "Hello");

        // Written immediately.
        let id = conv.id.clone();
        assert_eq!(stored_content(&store, &id), vec!["Hello".to_string()]);
        assert_eq!(store.gateway().read_active_id().unwrap(), Some(id));
    }

    #[test]
    fn test_second_user_message_does_not_create_entry_or_retitle() {
        let (mut store, _) = store();
        store.append_user_message("first question");
        store.begin_assistant_message();
        store.append_user_message("second question");

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.current_conversation().unwrap().title, "first question");
        assert_eq!(store.messages().len(), 3);
    }

    #[test]
    fn test_long_first_message_title_is_truncated() {
        let (mut store, _) = store();
        let text = "x".repeat(45);
        store.append_user_message(&text);
        assert_eq!(
            store.current_conversation().unwrap().title,
            format!("{}...", "x".repeat(30))
        );
    }

    #[test]
    fn test_fragments_append_to_open_assistant_message() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        store.begin_assistant_message();
        store.append_fragment("Hel");
        store.append_fragment("lo");

        let last = store.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.content, "Hello");
    }

    #[test]
    fn test_fragment_without_open_assistant_message_is_noop() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        store.append_fragment("ignored");

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "hi");
        assert_eq!(store.persistence_deadline(), None);
    }

    #[test]
    fn test_debounced_write_after_quiet_period() {
        let (mut store, clock) = store();
        store.append_user_message("hi");
        let id = store.current_id().unwrap().to_string();
        store.begin_assistant_message();

        store.append_fragment("a");
        clock.advance(Duration::from_millis(600));
        store.append_fragment("b");

        // 1000ms after the first fragment but only 400ms after the last.
        clock.advance(Duration::from_millis(400));
        assert!(!store.poll_persistence());
        assert_eq!(stored_content(&store, &id), vec!["hi".to_string()]);

        clock.advance(Duration::from_millis(600));
        assert!(store.poll_persistence());
        assert_eq!(stored_content(&store, &id), vec!["hi".to_string(), "ab".to_string()]);
        assert_eq!(store.persistence_deadline(), None);
    }

    #[test]
    fn test_flush_writes_immediately_and_cancels_timer() {
        let (mut store, clock) = store();
        store.append_user_message("hi");
        let id = store.current_id().unwrap().to_string();
        store.begin_assistant_message();
        store.append_fragment("partial");
        assert!(store.persistence_deadline().is_some());

        store.flush();
        assert_eq!(store.persistence_deadline(), None);
        assert_eq!(stored_content(&store, &id)[1], "partial");

        clock.advance(Duration::from_secs(5));
        assert!(!store.poll_persistence());
    }

    #[test]
    fn test_adopt_server_id_moves_messages_to_new_key() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        let local = store.current_id().unwrap().to_string();
        store.begin_assistant_message();
        store.append_fragment("Hello");

        assert!(store.adopt_server_id("s-1"));

        assert_eq!(store.current_id(), Some("s-1"));
        assert!(!store.is_new());
        let conv = store.current_conversation().unwrap();
        assert_eq!(conv.server_id(), Some("s-1"));
        assert!(!conv.pending);

        let backend = store.gateway().backend();
        assert!(backend.get(&messages_key(&local)).unwrap().is_none());
        assert_eq!(
            stored_content(&store, "s-1"),
            vec!["hi".to_string(), "Hello".to_string()]
        );
        assert_eq!(
            backend.get(ACTIVE_CONVERSATION_KEY).unwrap().as_deref(),
            Some("s-1")
        );
        let listed = store.gateway().read_conversations().unwrap();
        assert_eq!(listed[0].id, "s-1");
    }

    #[test]
    fn test_adopting_same_id_keeps_messages() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        store.adopt_server_id("s-1");
        store.append_user_message("again");

        assert!(store.adopt_server_id("s-1"));
        assert_eq!(
            stored_content(&store, "s-1"),
            vec!["hi".to_string(), "again".to_string()]
        );
    }

    #[test]
    fn test_adopt_for_inactive_conversation_rekeys_storage() {
        let (mut store, _) = store();
        store.append_user_message("one");
        let local = store.current_id().unwrap().to_string();
        store.start_new_conversation();
        store.append_user_message("two");

        assert!(store.adopt_server_id_for(&local, "s-old"));

        assert_ne!(store.current_id(), Some("s-old"));
        assert!(store.conversation("s-old").is_some());
        assert_eq!(stored_content(&store, "s-old"), vec!["one".to_string()]);
        assert!(store.gateway().read_messages(&local).unwrap().is_empty());
    }

    #[test]
    fn test_adopt_for_unknown_conversation_fails() {
        let (mut store, _) = store();
        assert!(!store.adopt_server_id("s-1"));
        assert!(!store.adopt_server_id_for("nope", "s-1"));
    }

    #[test]
    fn test_stale_target_is_dropped_after_switch() {
        let (mut store, _) = store();
        store.append_user_message("first");
        store.adopt_server_id("a");
        store.start_new_conversation();
        store.append_user_message("second");
        store.adopt_server_id("b");

        let target = store.begin_assistant_message();
        assert!(store.append_fragment_to(&target, "x"));

        assert!(store.switch_to("a"));
        assert!(!store.append_fragment_to(&target, "late"));
        assert!(store.messages().iter().all(|m| m.content != "late"));

        // Switching back does not revive the old target either.
        assert!(store.switch_to("b"));
        assert!(!store.append_fragment_to(&target, "late"));
        assert_eq!(stored_content(&store, "b")[1], "x");
    }

    #[test]
    fn test_target_survives_identifier_adoption() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        let target = store.begin_assistant_message();
        store.adopt_server_id("s-1");
        assert!(store.append_fragment_to(&target, "ok"));
        assert_eq!(store.messages().last().unwrap().content, "ok");
    }

    #[test]
    fn test_target_is_dropped_once_another_message_follows() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        let target = store.begin_assistant_message();
        store.append_user_message("interrupt");
        assert!(!store.append_fragment_to(&target, "late"));
    }

    #[test]
    fn test_switch_flushes_and_loads_messages() {
        let (mut store, _) = store();
        store.append_user_message("in a");
        store.adopt_server_id("a");
        store.begin_assistant_message();
        store.append_fragment("pending reply");

        store.start_new_conversation();
        assert!(store.is_new());
        assert!(store.messages().is_empty());
        // The pending debounced write was flushed on the way out.
        assert_eq!(stored_content(&store, "a")[1], "pending reply");

        store.append_user_message("in b");
        store.adopt_server_id("b");

        assert!(store.switch_to("a"));
        assert_eq!(store.current_id(), Some("a"));
        assert!(!store.is_new());
        let contents: Vec<_> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["in a", "pending reply"]);

        assert!(!store.switch_to("missing"));
        assert_eq!(store.current_id(), Some("a"));
    }

    #[test]
    fn test_delete_active_switches_to_most_recent() {
        let (mut store, _) = store();
        store.append_user_message("a");
        store.adopt_server_id("a");
        store.start_new_conversation();
        store.append_user_message("b");
        store.adopt_server_id("b");

        assert!(store.delete_conversation("b"));
        assert_eq!(store.current_id(), Some("a"));
        assert_eq!(store.messages()[0].content, "a");
        assert!(store.gateway().read_messages("b").unwrap().is_empty());
        assert_eq!(store.gateway().read_conversations().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_last_returns_to_new_state() {
        let (mut store, _) = store();
        store.append_user_message("a");
        store.adopt_server_id("a");

        assert!(store.delete_conversation("a"));
        assert!(store.is_new());
        assert_eq!(store.current_id(), None);
        assert!(store.messages().is_empty());
        assert_eq!(store.gateway().read_active_id().unwrap(), None);
        assert!(!store.delete_conversation("a"));
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let (mut store, _) = store();
        store.append_user_message("a");
        store.adopt_server_id("a");
        store.start_new_conversation();
        store.append_user_message("b");
        store.adopt_server_id("b");

        assert!(store.delete_conversation("a"));
        assert_eq!(store.current_id(), Some("b"));
        assert_eq!(store.conversations().len(), 1);
    }

    #[test]
    fn test_rename_survives_title_derivation() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        store.adopt_server_id("a");
        store.clear_messages();

        assert!(store.rename_conversation("a", "Custom"));
        store.append_user_message("would be the title");
        assert_eq!(store.current_conversation().unwrap().title, "Custom");

        assert!(store.rename_conversation("a", "  "));
        assert_eq!(store.current_conversation().unwrap().title, DEFAULT_TITLE);
        assert!(!store.rename_conversation("missing", "x"));
    }

    #[test]
    fn test_clear_messages_persists_empty_list() {
        let (mut store, _) = store();
        store.append_user_message("hi");
        store.adopt_server_id("a");
        store.clear_messages();
        assert!(store.messages().is_empty());
        assert!(stored_content(&store, "a").is_empty());
        assert!(store.gateway().backend().get(&messages_key("a")).unwrap().is_some());
    }

    #[test]
    fn test_restore_loads_last_active_conversation() {
        let backend = std::sync::Arc::new(MemoryKv::new());
        {
            let mut store = ConversationStore::new(
                KvGateway::new(std::sync::Arc::clone(&backend)),
                ManualClock::new(),
                DEFAULT_PERSIST_DEBOUNCE,
            );
            store.append_user_message("remember me");
            store.adopt_server_id("s-1");
        }

        let mut store = ConversationStore::new(
            KvGateway::new(backend),
            ManualClock::new(),
            DEFAULT_PERSIST_DEBOUNCE,
        );
        store.restore();
        assert_eq!(store.current_id(), Some("s-1"));
        assert!(!store.is_new());
        assert_eq!(store.messages()[0].content, "remember me");
        assert_eq!(store.conversations().len(), 1);
    }

    #[test]
    fn test_restore_reads_web_client_history() {
        let (mut store, _) = store();
        let backend = store.gateway().backend();
        backend
            .set(
                CONVERSATIONS_KEY,
                r#"[{"id":"s-7","title":"hello","createdAt":"2024-05-01T10:00:00.000Z","updatedAt":"2024-05-01T10:00:01.000Z"}]"#,
            )
            .unwrap();
        backend
            .set(
                &messages_key("s-7"),
                r#"[{"id":"msg_1714557600000_abc123xyz","sender":"user","content":"hello","timestamp":"2024-05-01T10:00:00.000Z"},{"id":"msg_1714557601000_def456uvw","sender":"assistant","content":"Hi there","timestamp":"2024-05-01T10:00:01.000Z"}]"#,
            )
            .unwrap();
        backend.set(ACTIVE_CONVERSATION_KEY, "s-7").unwrap();

        store.restore();
        assert_eq!(store.current_id(), Some("s-7"));
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[0].id, "msg_1714557600000_abc123xyz");
        assert_eq!(store.messages()[1].content, "Hi there");
    }

    #[test]
    fn test_restore_ignores_dangling_active_id() {
        let (mut store, _) = store();
        store.gateway().write_active_id(Some("gone")).unwrap();
        store.restore();
        assert!(store.is_new());
        assert_eq!(store.current_id(), None);
    }

    #[test]
    fn test_corrupt_persisted_state_recovers_empty() {
        let (mut store, _) = store();
        let backend = store.gateway().backend();
        backend.set(CONVERSATIONS_KEY, "[{broken").unwrap();
        store.restore();
        assert!(store.conversations().is_empty());

        let conv = Conversation {
            id: "a".to_string(),
            ..Conversation::pending()
        };
        store.gateway().write_conversations(&[conv]).unwrap();
        store.gateway().backend().set(&messages_key("a"), "nope").unwrap();
        store.restore();
        assert!(store.switch_to("a"));
        assert!(store.messages().is_empty());
    }

    struct FailingGateway;

    impl PersistenceGateway for FailingGateway {
        fn read_conversations(&self) -> Result<Vec<Conversation>, PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn write_conversations(&self, _: &[Conversation]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn read_messages(&self, _: &str) -> Result<Vec<Message>, PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn write_messages(&self, _: &str, _: &[Message]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn delete_messages(&self, _: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn read_active_id(&self) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
        fn write_active_id(&self, _: Option<&str>) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io("disk gone".to_string()))
        }
    }

    #[test]
    fn test_gateway_failures_are_absorbed() {
        let clock = ManualClock::new();
        let mut store = ConversationStore::new(FailingGateway, clock.clone(), DEFAULT_PERSIST_DEBOUNCE);
        store.restore();
        store.append_user_message("still works");
        store.begin_assistant_message();
        store.append_fragment("reply");
        clock.advance(DEFAULT_PERSIST_DEBOUNCE);
        assert!(store.poll_persistence());
        assert!(store.adopt_server_id("s-1"));
        assert!(store.delete_conversation("s-1"));
        assert!(store.is_new());
    }
}
