//! Scripted transports for session and controller tests.

use std::sync::Mutex;

use futures_util::stream;
use tokio::sync::mpsc;

use chatwire_types::error::StreamError;

use super::transport::{ByteStream, ChatRequest, ChatTransport};

/// Replays a fixed list of chunks, recording every request it receives.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    chunks: Vec<Result<Vec<u8>, StreamError>>,
    open_error: Option<StreamError>,
    pub(crate) requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| Ok(c.as_ref().to_vec())).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn results(chunks: Vec<Result<Vec<u8>, StreamError>>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    pub(crate) fn failing(error: StreamError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatTransport for ScriptedTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(Box::pin(stream::iter(self.chunks.clone())))
    }
}

/// Body fed chunk by chunk from the test through a channel.
///
/// Serves a single request; the body ends when the sender is dropped.
pub(crate) struct ChannelTransport {
    body: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl ChannelTransport {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            body: Mutex::new(Some(rx)),
        };
        (transport, tx)
    }
}

impl ChatTransport for ChannelTransport {
    async fn open(&self, _request: &ChatRequest) -> Result<ByteStream, StreamError> {
        let rx = self
            .body
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| StreamError::Transport("body already taken".to_string()))?;
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok(chunk), rx))
        })))
    }
}
