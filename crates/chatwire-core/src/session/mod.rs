//! Stream session: one in-flight chat request.
//!
//! [`StreamSession::open`] spawns a reader task that opens the request,
//! feeds the body through a [`FrameDecoder`](crate::decoder::FrameDecoder)
//! and forwards decoded payloads as [`SessionEvent`]s over a bounded channel,
//! strictly in arrival order. The consumer pulls them with
//! [`StreamSession::next_event`].
//!
//! Cancellation is not an error. Once a session is cancelled the consumer
//! sees no further events of any kind; fragments already handed out are
//! untouched. Dropping the session cancels it.

pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chatwire_types::config::FramingConvention;
use chatwire_types::error::StreamError;

use crate::decoder::decode_stream;

pub use transport::{ByteStream, ChatRequest, ChatTransport};

/// Capacity of the event channel between the reader task and the consumer.
const EVENT_BUFFER: usize = 64;

const SESSION_MARKER_PREFIX: &str = "[SESSION_ID:";
const SESSION_MARKER_SUFFIX: &str = "]";

/// Something that happened on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend announced the durable conversation identifier.
    SessionAssigned(String),
    /// One decoded payload of assistant text.
    Fragment(String),
    /// End of stream; every payload has been delivered.
    Complete,
    /// The request or the body failed.
    Failed(StreamError),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Complete | SessionEvent::Failed(_))
    }
}

/// Cloneable handle that cancels a session from anywhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Consumer side of one streaming request.
#[derive(Debug)]
pub struct StreamSession {
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl StreamSession {
    /// Start the request on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: ChatTransport>(
        transport: Arc<T>,
        request: ChatRequest,
        convention: FramingConvention,
    ) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        tokio::spawn(pump(transport, request, convention, tx, cancel.clone()));
        Self {
            events: rx,
            cancel,
            finished: false,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next event in arrival order.
    ///
    /// Returns `None` after a terminal event or once cancelled.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.finished || self.cancel.is_cancelled() {
            return None;
        }

        let event = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        };

        match &event {
            Some(event) if !event.is_terminal() => {}
            _ => self.finished = true,
        }
        event
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Parse the backend's `[SESSION_ID:<id>]` marker.
pub fn parse_session_marker(payload: &str) -> Option<String> {
    payload
        .trim()
        .strip_prefix(SESSION_MARKER_PREFIX)?
        .strip_suffix(SESSION_MARKER_SUFFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Reader task: request, decode, forward.
#[tracing::instrument(skip_all, fields(session_id = %request.session_id))]
async fn pump<T: ChatTransport>(
    transport: Arc<T>,
    request: ChatRequest,
    convention: FramingConvention,
    tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("cancelled before response");
            return;
        }
        opened = transport.open(&request) => opened,
    };

    let body = match opened {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "chat request failed");
            forward(&tx, &cancel, SessionEvent::Failed(err)).await;
            return;
        }
    };

    let payloads = decode_stream(convention, body);
    tokio::pin!(payloads);

    let mut first = true;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("cancelled while streaming");
                return;
            }
            next = payloads.next() => next,
        };

        let event = match next {
            Some(Ok(payload)) => {
                let marker = if first {
                    parse_session_marker(&payload)
                } else {
                    None
                };
                first = false;
                match marker {
                    Some(id) => {
                        debug!(assigned = %id, "session marker received");
                        SessionEvent::SessionAssigned(id)
                    }
                    None => {
                        trace!(len = payload.len(), "fragment");
                        SessionEvent::Fragment(payload)
                    }
                }
            }
            Some(Err(err)) => {
                warn!(error = %err, "stream body failed");
                forward(&tx, &cancel, SessionEvent::Failed(err)).await;
                return;
            }
            None => break,
        };

        if !forward(&tx, &cancel, event).await {
            return;
        }
    }

    debug!("stream complete");
    forward(&tx, &cancel, SessionEvent::Complete).await;
}

/// Send an event unless the session was cancelled or the consumer is gone.
async fn forward(
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
