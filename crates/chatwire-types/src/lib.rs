//! Shared domain types for chatwire.
//!
//! Conversations, messages, client configuration and the error enums used
//! across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
