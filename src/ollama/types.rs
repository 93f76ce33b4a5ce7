use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One chat message. `role` is kept open since the server does not constrain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            images: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    /// Wire form; `images` only appears when set.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("role".to_string(), Value::String(self.role.clone()));
        map.insert("content".to_string(), Value::String(self.content.clone()));
        if let Some(images) = &self.images {
            map.insert(
                "images".to_string(),
                Value::Array(images.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Ordered chat history, oldest first.
pub type Conversation = Vec<Message>;

/// One parsed line of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Text to emit for this step, if the line carried any.
    pub fragment: Option<String>,
    /// Completion flag; absent means `false`.
    pub done: bool,
}

/// Entry of the `GET /api/tags` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Payload keys owned by the client; extension fields may not replace them.
const RESERVED_KEYS: [&str; 5] = ["model", "prompt", "messages", "stream", "images"];

/// Request for `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub stream: bool,
    /// Base64-encoded images.
    pub images: Vec<String>,
    /// Additional protocol fields forwarded verbatim, in insertion order.
    pub extra: Map<String, Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            stream: true,
            images: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn image(mut self, encoded: impl Into<String>) -> Self {
        self.images.push(encoded.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.extra.extend(params);
        self
    }

    pub(crate) fn to_payload(&self, default_model: &str) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "model".to_string(),
            Value::String(self.model.as_deref().unwrap_or(default_model).to_string()),
        );
        payload.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        payload.insert("stream".to_string(), Value::Bool(self.stream));
        if !self.images.is_empty() {
            payload.insert(
                "images".to_string(),
                Value::Array(self.images.iter().cloned().map(Value::String).collect()),
            );
        }
        merge_extra(&mut payload, &self.extra);
        Value::Object(payload)
    }
}

/// Request for `POST /api/chat`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Conversation,
    pub stream: bool,
    /// Additional protocol fields forwarded verbatim, in insertion order.
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Conversation) -> Self {
        Self {
            model: None,
            messages,
            stream: true,
            extra: Map::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.extra.extend(params);
        self
    }

    pub(crate) fn to_payload(&self, default_model: &str) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "model".to_string(),
            Value::String(self.model.as_deref().unwrap_or(default_model).to_string()),
        );
        payload.insert(
            "messages".to_string(),
            Value::Array(self.messages.iter().map(Message::to_json).collect()),
        );
        payload.insert("stream".to_string(), Value::Bool(self.stream));
        merge_extra(&mut payload, &self.extra);
        Value::Object(payload)
    }
}

fn merge_extra(payload: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "ignoring extension field that shadows a request field");
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }
}
