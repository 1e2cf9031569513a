//! ChatController drives one chat turn at a time.
//!
//! A turn appends the user message, opens a [`StreamSession`] for it and
//! then applies session events to the [`ConversationStore`] from a single
//! `tokio::select!` loop that also services the debounced write and an
//! external cancellation token. The store is only ever touched from that
//! loop, so no locking is involved.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatwire_types::config::FramingConvention;
use chatwire_types::error::StreamError;

use crate::persistence::PersistenceGateway;
use crate::session::{CancelHandle, ChatRequest, ChatTransport, SessionEvent, StreamSession};
use crate::store::{Clock, ConversationStore, ReplyTarget, TokioClock};

/// How a turn ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
}

/// A turn whose request is in flight.
///
/// The store stays in the streaming state until the turn is handed to
/// [`ChatController::drive`] or [`ChatController::abandon`].
#[derive(Debug)]
#[must_use = "a turn keeps the store streaming until it is driven or abandoned"]
pub struct Turn {
    session: StreamSession,
    target: ReplyTarget,
}

impl Turn {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.session.cancel_handle()
    }

    pub fn target(&self) -> &ReplyTarget {
        &self.target
    }
}

/// Owns the store and the transport.
///
/// The clock must agree with tokio's timer: the loop sleeps until the
/// store's persistence deadline with `tokio::time::sleep_until`.
pub struct ChatController<T, G, C = TokioClock> {
    transport: Arc<T>,
    store: ConversationStore<G, C>,
    user_id: u64,
    convention: FramingConvention,
}

impl<T, G, C> ChatController<T, G, C>
where
    T: ChatTransport,
    G: PersistenceGateway,
    C: Clock,
{
    pub fn new(
        transport: Arc<T>,
        store: ConversationStore<G, C>,
        user_id: u64,
        convention: FramingConvention,
    ) -> Self {
        Self {
            transport,
            store,
            user_id,
            convention,
        }
    }

    pub fn store(&self) -> &ConversationStore<G, C> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore<G, C> {
        &mut self.store
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Append the user message and start the request.
    pub fn begin_turn(&mut self, text: &str) -> Turn {
        self.store.append_user_message(text);

        let session_id = self
            .store
            .current_conversation()
            .and_then(|c| c.server_id())
            .unwrap_or_default()
            .to_string();
        let request = ChatRequest {
            message: text.to_string(),
            session_id,
            user_id: self.user_id,
        };
        debug!(
            session_id = %request.session_id,
            user_id = request.user_id,
            "starting chat turn"
        );

        let target = self.store.begin_assistant_message();
        let session = StreamSession::open(Arc::clone(&self.transport), request, self.convention);
        self.store.set_streaming(true);
        Turn { session, target }
    }

    /// Apply the turn's events until it completes, fails or is cancelled.
    pub async fn drive(
        &mut self,
        turn: Turn,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, StreamError> {
        self.drive_with(turn, cancel, |_| {}).await
    }

    /// Like [`drive`](Self::drive), calling `on_fragment` with every fragment
    /// that was applied to the store.
    pub async fn drive_with<F>(
        &mut self,
        turn: Turn,
        cancel: &CancellationToken,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, StreamError>
    where
        F: FnMut(&str),
    {
        let Turn {
            mut session,
            mut target,
        } = turn;

        let outcome = loop {
            let deadline = self.store.persistence_deadline();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    session.cancel();
                    break Ok(TurnOutcome::Cancelled);
                }

                event = session.next_event() => match event {
                    Some(SessionEvent::SessionAssigned(server_id)) => {
                        self.adopt(&mut target, &server_id);
                    }
                    Some(SessionEvent::Fragment(text)) => {
                        if self.store.append_fragment_to(&target, &text) {
                            on_fragment(&text);
                        }
                    }
                    Some(SessionEvent::Complete) => break Ok(TurnOutcome::Completed),
                    Some(SessionEvent::Failed(err)) => break Err(err),
                    // The session was cancelled through its own handle.
                    None => break Ok(TurnOutcome::Cancelled),
                },

                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    self.store.poll_persistence();
                }
            }
        };

        self.store.flush();
        self.store.set_streaming(false);

        match &outcome {
            Ok(TurnOutcome::Completed) => info!("chat turn completed"),
            Ok(TurnOutcome::Cancelled) => info!("chat turn cancelled"),
            Err(err) => warn!(error = %err, "chat turn failed"),
        }
        outcome
    }

    /// Drop a turn without driving it: the request is cancelled, whatever
    /// was applied so far is written and the store leaves the streaming state.
    pub fn abandon(&mut self, turn: Turn) {
        let Turn { session, .. } = turn;
        session.cancel();
        self.store.flush();
        self.store.set_streaming(false);
        debug!("chat turn abandoned");
    }

    /// [`begin_turn`](Self::begin_turn) followed by [`drive`](Self::drive).
    pub async fn send(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, StreamError> {
        let turn = self.begin_turn(text);
        self.drive(turn, cancel).await
    }

    fn adopt(&mut self, target: &mut ReplyTarget, server_id: &str) {
        let Some(conversation_id) = target.conversation_id.clone() else {
            return;
        };
        if self.store.adopt_server_id_for(&conversation_id, server_id) {
            target.conversation_id = Some(server_id.to_string());
        }
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}
