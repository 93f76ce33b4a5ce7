//! Command-line tools and a small blocking client for a local or remote
//! Ollama server.

pub mod commands;
pub mod config;
pub mod logging;
pub mod ollama;

pub use ollama::{OllamaClient, OllamaError};
