use std::io::{self, BufReader, Write};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::ollama::error::{OllamaError, Result};
use crate::ollama::stream::{self, Extractor};
use crate::ollama::types::{ChatRequest, GenerateRequest, ModelInfo, TagsResponse};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

/// Blocking client for an Ollama server.
///
/// One HTTP client is created at construction and reused for every call so
/// connections stay alive between requests. Calls run one at a time.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    default_model: String,
    client: Client,
}

impl OllamaClient {
    /// Creates a client without a request timeout.
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, default_model, None)
    }

    /// Creates a client whose requests fail after `timeout`, body included.
    pub fn with_timeout(
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/tags`.
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.url("/api/tags");
        debug!(%url, "listing models");
        let response = check_status(self.client.get(&url).send()?)?;
        let tags: TagsResponse = serde_json::from_slice(&response.bytes()?)?;
        Ok(tags.models)
    }

    /// Runs a generation, echoing output to stdout.
    pub fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generate_to(request, &mut io::stdout().lock())
    }

    /// `POST /api/generate`, echoing output to `sink`.
    pub fn generate_to<W: Write + ?Sized>(
        &self,
        request: &GenerateRequest,
        sink: &mut W,
    ) -> Result<String> {
        let payload = request.to_payload(&self.default_model);
        self.post_and_read(&GENERATE, &payload, request.stream, sink)
    }

    /// Runs a chat turn, echoing output to stdout.
    pub fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.chat_to(request, &mut io::stdout().lock())
    }

    /// `POST /api/chat`, echoing output to `sink`. The request's messages are
    /// sent as given; appending the reply to the history is the caller's job.
    pub fn chat_to<W: Write + ?Sized>(&self, request: &ChatRequest, sink: &mut W) -> Result<String> {
        let payload = request.to_payload(&self.default_model);
        self.post_and_read(&CHAT, &payload, request.stream, sink)
    }

    fn post_and_read<W: Write + ?Sized>(
        &self,
        endpoint: &Endpoint,
        payload: &Value,
        streaming: bool,
        sink: &mut W,
    ) -> Result<String> {
        let url = self.url(endpoint.path);
        debug!(%url, model = %payload["model"], streaming, "sending request");
        let response = check_status(self.client.post(&url).json(payload).send()?)?;

        if streaming {
            let outcome = stream::read_stream(BufReader::new(response), sink, endpoint.extract)?;
            if outcome.completed {
                writeln!(sink).map_err(OllamaError::Output)?;
            } else {
                debug!("stream ended without a terminal chunk");
            }
            return Ok(outcome.text);
        }

        let body = response.bytes()?;
        let text = match stream::read_single(&body, endpoint.extract)? {
            Some(text) => text,
            None if endpoint.echo_missing => String::new(),
            None => return Ok(String::new()),
        };
        writeln!(sink, "{text}").map_err(OllamaError::Output)?;
        Ok(text)
    }
}

/// Per-endpoint response handling.
struct Endpoint {
    path: &'static str,
    extract: Extractor,
    /// Non-streaming only: print an empty line when the body has no fragment.
    echo_missing: bool,
}

const GENERATE: Endpoint = Endpoint {
    path: "/api/generate",
    extract: stream::generate_fragment,
    echo_missing: true,
};

const CHAT: Endpoint = Endpoint {
    path: "/api/chat",
    extract: stream::chat_fragment,
    echo_missing: false,
};

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(OllamaError::Transport { status, body })
}

#[cfg(test)]
mod tests {
    use super::OllamaClient;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let client = OllamaClient::new("http://gpu-box:11434//", "qwen3").expect("client");
        assert_eq!(client.base_url(), "http://gpu-box:11434");
        assert_eq!(client.url("/api/tags"), "http://gpu-box:11434/api/tags");
        assert_eq!(client.default_model(), "qwen3");
    }
}
