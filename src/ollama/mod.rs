//! Client for the Ollama HTTP API.
//!
//! The module covers model listing, single-shot generation and multi-turn
//! chat, together with the stream reader that turns newline-delimited JSON
//! responses into text.

/// Image and text file attachments.
pub mod attach;
/// Blocking HTTP client.
pub mod client;
/// Error type shared by the client layer.
pub mod error;
/// Streamed and buffered response readers.
pub mod stream;
/// Wire types and request builders.
pub mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_MODEL, OllamaClient};
pub use error::{OllamaError, Result};
pub use types::{ChatRequest, Chunk, Conversation, GenerateRequest, Message, ModelInfo};
