//! Transport seam between a stream session and the network.
//!
//! `ChatTransport` uses native async fn in traits (RPITIT, Rust 2024).
//! `chatwire-infra` provides the reqwest implementation; tests script
//! their own.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use chatwire_types::error::StreamError;

/// Body of one chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Server conversation identifier; empty for a conversation the server
    /// has not seen yet.
    pub session_id: String,
    pub user_id: u64,
}

/// Raw response body, chunked as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, StreamError>> + Send>>;

/// Opens a streaming chat request.
///
/// Resolves once the response headers are in: a non-success status is
/// reported here, body failures through the returned stream.
pub trait ChatTransport: Send + Sync + 'static {
    fn open(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ByteStream, StreamError>> + Send;
}
