//! OpenAI-style request bodies and response payloads.
//!
//! Only the fields this adapter reads are modelled; everything else in a
//! provider response is ignored.

use pipeline::{ChatMessage, ModelName};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Builds a chat completions body.
///
/// Pass-through options go in first so that `model`, `messages`, and
/// `stream` always reflect this call.
pub(crate) fn chat_body(
    model: &ModelName,
    messages: &[ChatMessage],
    extra: &Map<String, Value>,
    stream: bool,
) -> Value {
    let mut body = extra.clone();
    body.insert("model".into(), json!(model.as_str()));
    body.insert("messages".into(), json!(messages));
    if stream {
        body.insert("stream".into(), Value::Bool(true));
    } else {
        body.remove("stream");
    }
    Value::Object(body)
}

/// Builds an embeddings body requesting plain float vectors.
pub(crate) fn embeddings_body(model: &ModelName, texts: &[String]) -> Value {
    json!({
        "model": model.as_str(),
        "input": texts,
        "encoding_format": "float",
    })
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

/// Non-streaming chat completion response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice. `None` if there are no choices; a `null`
    /// content is the empty string.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
    }
}

/// One `data:` event of a streaming chat completion.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

/// Incremental content of a streamed choice.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Non-empty text carried by the first choice, if any.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// `{"error": {"message": ...}}` as returned by OpenAI and Azure.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}
