//! Request, option, and result value types for LLM provider calls.
//!
//! These carry invariants that the provider adapters rely on: a
//! [`ChatRequest`] always yields messages in `[system?] + history + [user?]`
//! order, [`CallOptions`] keeps dispatcher-reserved keys out of the
//! pass-through map, and an [`EmbeddingMatrix`] has a fixed row width.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ApiKey, ApiVersion, LlmError, ModelName};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of one turn in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// A turn written by the caller.
    User,
    /// A turn produced by the model.
    Assistant,
}

/// One role/content pair sent to a chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced this turn.
    pub role: Role,
    /// Text of the turn.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials and options
// ---------------------------------------------------------------------------

/// Per-call overrides for the provider endpoint and credentials.
///
/// Unset fields fall back to the provider's configured values. Overrides apply
/// to one call only; they are never written to process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the provider (Azure resource endpoint or OpenAI base URL).
    pub endpoint: Option<String>,
    /// API key.
    pub api_key: Option<ApiKey>,
    /// API version (Azure only).
    pub api_version: Option<ApiVersion>,
}

impl Credentials {
    /// Returns `true` if no override is set.
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.api_key.is_none() && self.api_version.is_none()
    }

    /// Returns `self` with every field that `over` sets replaced by `over`'s value.
    #[must_use]
    pub fn overlaid_with(self, over: &Credentials) -> Self {
        Self {
            endpoint: over.endpoint.clone().or(self.endpoint),
            api_key: over.api_key.clone().or(self.api_key),
            api_version: over.api_version.clone().or(self.api_version),
        }
    }
}

/// Option keys owned by the dispatcher; [`CallOptions::without_dispatch_keys`]
/// strips them from a caller's options.
pub const DISPATCH_OPTION_KEYS: [&str; 3] = ["model", "keyword_extraction", "mode"];

/// Option keys silently discarded by [`CallOptions::from_map`]; the adapter
/// owns them.
const DISCARDED_OPTION_KEYS: [&str; 2] = ["hashing_kv", "stream"];

/// Options accompanying a chat call.
///
/// Dispatcher-relevant settings are named fields; everything else is passed
/// through to the provider request body untouched via [`CallOptions::extra`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Model (or Azure deployment) to call. `None` uses the provider default.
    pub model: Option<ModelName>,
    /// Post-process the completion into its embedded JSON body.
    pub keyword_extraction: bool,
    /// Query mode of the calling pipeline. Never sent to a provider.
    pub mode: Option<String>,
    /// Per-call endpoint/credential overrides.
    pub credentials: Credentials,
    /// Provider pass-through options (`temperature`, `max_tokens`, ...).
    pub extra: Map<String, Value>,
}

impl CallOptions {
    /// Splits an arbitrary JSON object of options into reserved fields and the
    /// pass-through remainder.
    ///
    /// Fails with [`LlmError::InvalidRequest`] if a reserved key has the wrong
    /// JSON type.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, LlmError> {
        for key in DISCARDED_OPTION_KEYS {
            if map.remove(key).is_some() {
                tracing::debug!(key, "discarding adapter-owned option");
            }
        }

        let model = take_string(&mut map, "model")?.and_then(ModelName::new);
        let mode = take_string(&mut map, "mode")?;
        let keyword_extraction = match map.remove("keyword_extraction") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(LlmError::invalid_request(format!(
                    "option 'keyword_extraction' must be a boolean, got {other}"
                )))
            }
        };
        let credentials = Credentials {
            endpoint: take_string(&mut map, "base_url")?,
            api_key: take_string(&mut map, "api_key")?.and_then(ApiKey::new),
            api_version: take_string(&mut map, "api_version")?.and_then(ApiVersion::new),
        };

        Ok(Self {
            model,
            keyword_extraction,
            mode,
            credentials,
            extra: map,
        })
    }

    /// Returns these options with the dispatcher-reserved fields (`model`,
    /// `keyword_extraction`, `mode`) cleared.
    #[must_use]
    pub fn without_dispatch_keys(mut self) -> Self {
        self.model = None;
        self.keyword_extraction = false;
        self.mode = None;
        for key in DISPATCH_OPTION_KEYS {
            self.extra.remove(key);
        }
        self
    }

    /// Merges `fixed` over `self`: wherever both set a value, `fixed` wins.
    ///
    /// Credentials merge field by field; `extra` merges key by key.
    #[must_use]
    pub fn overlaid_with(mut self, fixed: &CallOptions) -> Self {
        if fixed.model.is_some() {
            self.model = fixed.model.clone();
        }
        if fixed.mode.is_some() {
            self.mode = fixed.mode.clone();
        }
        self.keyword_extraction |= fixed.keyword_extraction;
        self.credentials = self.credentials.overlaid_with(&fixed.credentials);
        for (key, value) in &fixed.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        self
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<Option<String>, LlmError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(LlmError::invalid_request(format!(
            "option '{key}' must be a string, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A single chat completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// Final user turn. May be `None` when `history` already ends with the
    /// turn to answer.
    pub prompt: Option<String>,
    /// Optional system prompt, sent first.
    pub system_prompt: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// Model, credentials, and pass-through options.
    pub options: CallOptions,
}

impl ChatRequest {
    /// Creates a request for a single user prompt with default options.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Sets the prior conversation turns.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Sets the call options.
    #[must_use]
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the ordered message list `[system?] + history + [user?]`.
    ///
    /// An empty system prompt adds no system turn. Fails with
    /// [`LlmError::InvalidRequest`] if the result would be empty.
    pub fn messages(&self) -> Result<Vec<ChatMessage>, LlmError> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(self.history.iter().cloned());
        if let Some(prompt) = &self.prompt {
            messages.push(ChatMessage::user(prompt.clone()));
        }

        if messages.is_empty() {
            return Err(LlmError::invalid_request(
                "chat request has no prompt, system prompt, or history",
            ));
        }
        Ok(messages)
    }
}

/// A request to embed a batch of texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingRequest {
    /// Texts to embed; one matrix row per text, in order.
    pub texts: Vec<String>,
    /// Embedding model. `None` uses the provider default.
    pub model: Option<ModelName>,
    /// Per-call endpoint/credential overrides.
    pub credentials: Credentials,
}

impl EmbeddingRequest {
    /// Creates a request for `texts` with the default model and credentials.
    pub fn new(texts: Vec<String>) -> Self {
        Self {
            texts,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Attributes of an embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    /// Model name.
    pub model: ModelName,
    /// Width of every embedding vector.
    pub dimension: usize,
    /// Maximum input length in tokens accepted by the model.
    pub max_token_size: usize,
}

impl Default for EmbeddingSpec {
    /// `text-embedding-3-small`: 1536-wide vectors, 8191 input tokens.
    fn default() -> Self {
        Self {
            model: ModelName::default_embedding(),
            dimension: 1536,
            max_token_size: 8191,
        }
    }
}

/// Row-major matrix of embeddings, one row per input text.
///
/// Every row has exactly [`EmbeddingMatrix::dimension`] entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingMatrix {
    dimension: usize,
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    /// Creates a matrix, checking that every row has width `dimension`.
    ///
    /// Fails with [`LlmError::MalformedResponse`] naming the first offending row.
    pub fn new(dimension: usize, rows: Vec<Vec<f32>>) -> Result<Self, LlmError> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dimension) {
            return Err(LlmError::malformed(
                format!(
                    "embedding row {index} has {} values, expected {dimension}",
                    row.len()
                ),
                None,
            ));
        }
        Ok(Self { dimension, rows })
    }

    /// Creates a matrix with no rows.
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            rows: Vec::new(),
        }
    }

    /// Width of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrows all rows.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Consumes the matrix, returning its rows.
    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }
}
