//! Client configuration types for chatwire.
//!
//! `ClientConfig` represents the `config.toml` in the data directory. Every
//! field has a default so an empty or partial file is valid.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// How the backend frames its event stream.
///
/// The wire format is fixed per deployment, so it is chosen by
/// configuration rather than detected per message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingConvention {
    /// `data:` segments accumulate until a blank line and are concatenated.
    #[default]
    Accumulating,
    /// Every `data:` line is trimmed and emitted as its own payload.
    PerLine,
    /// No SSE framing; each network chunk is one payload.
    Raw,
}

impl fmt::Display for FramingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingConvention::Accumulating => write!(f, "accumulating"),
            FramingConvention::PerLine => write!(f, "per-line"),
            FramingConvention::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for FramingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accumulating" => Ok(FramingConvention::Accumulating),
            "per-line" | "per_line" => Ok(FramingConvention::PerLine),
            "raw" => Ok(FramingConvention::Raw),
            other => Err(format!("invalid framing convention: '{other}'")),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Chat streaming endpoint (POST).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// User identifier sent with every request.
    #[serde(default = "default_user_id")]
    pub user_id: u64,

    #[serde(default)]
    pub framing: FramingConvention,

    /// Quiet period before streamed fragments are written to storage.
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,

    /// Status codes that mean the credential is missing or rejected.
    #[serde(default = "default_auth_status_codes")]
    pub auth_status_codes: Vec<u16>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8080/api/v1/ai/rag".to_string()
}

fn default_user_id() -> u64 {
    1
}

fn default_persist_debounce_ms() -> u64 {
    1000
}

fn default_auth_status_codes() -> Vec<u16> {
    vec![401, 40100, 40101]
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_id: default_user_id(),
            framing: FramingConvention::default(),
            persist_debounce_ms: default_persist_debounce_ms(),
            auth_status_codes: default_auth_status_codes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
