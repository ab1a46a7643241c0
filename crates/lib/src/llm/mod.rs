//! Completion API abstraction and the OpenAI-compatible client.
//!
//! The gateway only needs "message in, reply out"; `Completer` is that seam so tests can
//! swap in a stub.

mod openai;

pub use openai::{ChatMessage, Completer, CompletionError, OpenAiClient};
