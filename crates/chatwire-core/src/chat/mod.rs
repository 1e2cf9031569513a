//! Chat turns: user message in, streamed reply applied to the store.

pub mod controller;

pub use controller::{ChatController, Turn, TurnOutcome};
