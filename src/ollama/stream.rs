//! Newline-delimited JSON response handling.
//!
//! Streamed responses from `/api/generate` and `/api/chat` arrive as one JSON
//! object per line. Each object carries a text fragment and a `done` flag; the
//! reader echoes fragments to a sink as they arrive and returns the joined
//! text once the terminal chunk is seen or the body runs out.

use std::io::{BufRead, Write};

use serde_json::Value;
use tracing::{debug, trace};

use crate::ollama::error::{OllamaError, Result};
use crate::ollama::types::Chunk;

/// Maps one parsed line to its fragment and completion flag.
pub type Extractor = fn(&Value) -> Chunk;

/// Extractor for `/api/generate`: the fragment is at `response`.
pub fn generate_fragment(value: &Value) -> Chunk {
    Chunk {
        fragment: value
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string),
        done: done_flag(value),
    }
}

/// Extractor for `/api/chat`: the fragment is at `message.content`.
pub fn chat_fragment(value: &Value) -> Chunk {
    Chunk {
        fragment: value
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string),
        done: done_flag(value),
    }
}

fn done_flag(value: &Value) -> bool {
    value.get("done").and_then(Value::as_bool).unwrap_or(false)
}

/// Result of consuming one streamed body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Concatenation of every fragment, in arrival order.
    pub text: String,
    /// Whether a chunk with `done == true` was seen. A body that simply ends
    /// is still a normal completion.
    pub completed: bool,
}

/// Per-call state machine over the lines of one response body.
pub struct StreamingResponseReader<'a, W: Write + ?Sized> {
    sink: &'a mut W,
    extract: Extractor,
    text: String,
    completed: bool,
}

impl<'a, W: Write + ?Sized> StreamingResponseReader<'a, W> {
    pub fn new(sink: &'a mut W, extract: Extractor) -> Self {
        Self {
            sink,
            extract,
            text: String::new(),
            completed: false,
        }
    }

    /// Feeds one line without its terminator. Returns `true` once the
    /// terminal chunk has been processed; later lines must not be fed.
    pub fn feed(&mut self, line: &[u8]) -> Result<bool> {
        if self.completed {
            return Ok(true);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(false);
        }

        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, len = line.len(), "skipping malformed stream line");
                return Ok(false);
            }
        };

        let chunk = (self.extract)(&value);
        if let Some(fragment) = chunk.fragment.filter(|fragment| !fragment.is_empty()) {
            self.sink
                .write_all(fragment.as_bytes())
                .and_then(|()| self.sink.flush())
                .map_err(OllamaError::Output)?;
            self.text.push_str(&fragment);
        }

        if chunk.done {
            trace!(chars = self.text.len(), "terminal chunk received");
            self.completed = true;
        }
        Ok(self.completed)
    }

    pub fn finish(self) -> StreamOutcome {
        StreamOutcome {
            text: self.text,
            completed: self.completed,
        }
    }
}

/// Consumes `reader` line by line until the terminal chunk or end of input.
///
/// Lines after the terminal chunk are left unread. An I/O failure while
/// reading the body is returned as [`OllamaError::Stream`] rather than
/// truncating silently.
pub fn read_stream<R, W>(reader: R, sink: &mut W, extract: Extractor) -> Result<StreamOutcome>
where
    R: BufRead,
    W: Write + ?Sized,
{
    let mut state = StreamingResponseReader::new(sink, extract);
    for line in reader.split(b'\n') {
        let mut line = line.map_err(OllamaError::Stream)?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if state.feed(&line)? {
            break;
        }
    }
    Ok(state.finish())
}

/// Non-streaming mode: the whole body is a single JSON object. Returns
/// `None` when the extractor finds no fragment.
pub fn read_single(body: &[u8], extract: Extractor) -> Result<Option<String>> {
    let value: Value = serde_json::from_slice(body)?;
    Ok((extract)(&value).fragment)
}
