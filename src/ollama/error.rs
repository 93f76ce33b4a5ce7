use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors surfaced by [`OllamaClient`](crate::ollama::client::OllamaClient).
///
/// Malformed stream lines and chunks missing the expected field are not
/// errors; the stream reader skips them.
#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    /// The server answered with a non-success status.
    #[error("Ollama API error {status}: {body}")]
    Transport { status: StatusCode, body: String },
    /// The request could not be sent or the body could not be obtained.
    #[error("Ollama request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The body broke off after the response headers were received.
    #[error("Ollama response stream failed: {0}")]
    Stream(#[source] io::Error),
    /// A non-streaming body was not a JSON object.
    #[error("Ollama response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing a fragment to the output sink failed.
    #[error("Failed to write model output: {0}")]
    Output(#[source] io::Error),
}

impl OllamaError {
    /// Raw server body for transport failures, kept for diagnostics.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Transport { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, OllamaError>;
