//! Data model shared by the inbound handler and the upstream client.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /prompt-stream`.
///
/// `messages` is kept as raw JSON until [`into_turns`](Self::into_turns) so
/// that falsy values can be told apart from malformed ones.
#[derive(Debug, Default, Deserialize)]
pub struct PromptStreamRequest {
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
}

impl PromptStreamRequest {
    /// Parse a request body. Bodies that are not declared as JSON, or are
    /// blank, carry no fields and parse as an empty request.
    pub fn from_body(is_json: bool, body: &[u8]) -> Result<Self, RelayError> {
        if !is_json || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| {
            RelayError::InvalidBody(format!("Failed to parse the request body as JSON: {e}"))
        })
    }

    /// Request carrying the given turns.
    pub fn with_turns(turns: Vec<ConversationTurn>) -> Self {
        Self {
            messages: serde_json::to_value(turns).ok(),
        }
    }

    /// Take the caller's turns.
    ///
    /// Absent, `null`, `false`, `""`, `0` and `[]` all count as missing.
    /// Any other value must be a list of turns.
    pub fn into_turns(self) -> Result<Vec<ConversationTurn>, RelayError> {
        let value = match self.messages {
            None => return Err(RelayError::MissingMessages),
            Some(value) if is_falsy(&value) => return Err(RelayError::MissingMessages),
            Some(value) => value,
        };
        serde_json::from_value(value)
            .map_err(|e| RelayError::InvalidBody(format!("Invalid messages: {e}")))
    }
}

fn is_falsy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

/// Body sent to the upstream chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    pub stream: bool,
}

impl UpstreamRequest {
    /// Build a streaming request with the system instruction at position 0,
    /// followed by the caller's turns in their original order.
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        turns: Vec<ConversationTurn>,
    ) -> Self {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ConversationTurn::system(system_prompt));
        messages.extend(turns);

        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// Classification of a single line of the upstream event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// A non-empty text fragment at `choices[0].delta.content`.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
    /// Blank lines, non-`data:` lines and payloads without a delta.
    Ignored,
    /// A `data:` payload that could not be decoded.
    Malformed(String),
}

/// Streaming chat completion chunk as sent by the upstream provider.
///
/// Only the fields the relay reads are modelled.
#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// In-band error object some providers emit mid-stream.
#[derive(Debug, Deserialize)]
pub(crate) struct ChunkError {
    #[serde(default)]
    pub message: Option<String>,
}
