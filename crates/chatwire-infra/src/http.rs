//! HttpTransport -- reqwest-backed [`ChatTransport`].
//!
//! POSTs the chat request as JSON and hands the response body back as a raw
//! byte stream; SSE framing is the decoder's job. The bearer token is wrapped
//! in [`SecretString`] and only exposed when building the request header.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};

use chatwire_core::session::{ByteStream, ChatRequest, ChatTransport};
use chatwire_types::config::ClientConfig;
use chatwire_types::error::StreamError;

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
    auth_status_codes: Vec<u16>,
}

impl HttpTransport {
    /// Build a transport for `config.endpoint`.
    ///
    /// A blank token is treated as no token: the request then carries no
    /// `Authorization` header at all.
    pub fn new(config: &ClientConfig, token: Option<SecretString>) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StreamError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: token.filter(|t| !t.expose_secret().trim().is_empty()),
            auth_status_codes: config.auth_status_codes.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Map a failed response to an error.
    ///
    /// The backend sometimes reports its own auth code (e.g. 40100) in a JSON
    /// body instead of the status line.
    fn classify(&self, status: u16, body: String) -> StreamError {
        let body_code = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_u64()))
            .and_then(|c| u16::try_from(c).ok());

        match body_code {
            Some(code) if self.auth_status_codes.contains(&code) => {
                StreamError::Unauthenticated { status: code }
            }
            _ => StreamError::from_status(status, body, &self.auth_status_codes),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StreamError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "chat request rejected");
            return Err(self.classify(status.as_u16(), body));
        }
        tracing::debug!(status = status.as_u16(), endpoint = %self.endpoint, "chat stream opened");

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| StreamError::Transport(format!("failed to read stream: {e}")))
        });
        Ok(Box::pin(body))
    }
}
