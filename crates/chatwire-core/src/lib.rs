//! Streaming chat protocol logic for chatwire.
//!
//! This crate holds everything between the transport and the caller: the
//! SSE frame decoder, the stream session that owns one in-flight request,
//! the conversation store, the persistence port it writes through and the
//! controller that drives a chat turn. It depends only on `chatwire-types`,
//! never on `chatwire-infra` or any HTTP/filesystem crate.

pub mod chat;
pub mod decoder;
pub mod persistence;
pub mod session;
pub mod store;
