//! Infrastructure layer for chatwire.
//!
//! Implements the ports defined in `chatwire-core`: the reqwest-backed
//! [`ChatTransport`](chatwire_core::session::ChatTransport), a file-backed
//! [`KvBackend`](chatwire_core::persistence::KvBackend), plus config loading,
//! data-directory and credential resolution.

pub mod config;
pub mod filesystem;
pub mod http;
pub mod secret;
