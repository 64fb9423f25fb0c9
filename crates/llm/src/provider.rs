//! HTTP provider for OpenAI-compatible and Azure OpenAI endpoints.

use std::future::Future;

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use pipeline::{
    ChatRequest, EmbeddingMatrix, EmbeddingProvider, EmbeddingRequest, LlmError, LlmProvider,
    ModelName, TextStream,
};
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::{from_status, from_transport};
use crate::keywords::extract_json_or_raw;
use crate::retry::{with_retry, BackoffPolicy};
use crate::stream::text_fragments;
use crate::wire::{self, ChatCompletion, EmbeddingResponse};

/// A fully built HTTP call, reused unchanged across retry attempts.
struct PreparedCall {
    url: String,
    headers: HeaderMap,
    body: Value,
}

/// Chat and embedding provider speaking the OpenAI wire format.
///
/// One instance owns one connection pool and one immutable
/// [`ProviderConfig`]. Credentials given on a request apply to that request
/// only. Every call is retried per the instance's [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    backoff: BackoffPolicy,
}

impl OpenAiProvider {
    /// Creates a provider with its own HTTP client, bounded by
    /// `config.timeout` for connecting and `config.read_timeout` between
    /// body reads.
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        let client = client_builder(&config)
            .build()
            .map_err(|e| LlmError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a provider sharing an existing HTTP client.
    ///
    /// `config.timeout` still bounds each attempt; connect and read limits
    /// are whatever `client` was built with.
    pub fn with_client(client: Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// The static configuration of this provider.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The retry policy of this provider.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    fn prepare_chat(&self, request: &ChatRequest, stream: bool) -> Result<PreparedCall, LlmError> {
        let messages = request.messages()?;
        let model = request
            .options
            .model
            .clone()
            .unwrap_or_else(|| self.config.chat_model.clone());
        let endpoint = self.config.resolve(&request.options.credentials)?;
        Ok(PreparedCall {
            url: endpoint.chat_url(&model),
            headers: endpoint.headers()?,
            body: wire::chat_body(&model, &messages, &request.options.extra, stream),
        })
    }

    /// Sends one attempt, turning non-success statuses into errors.
    async fn send(&self, call: &PreparedCall) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&call.url)
            .headers(call.headers.clone())
            .json(&call.body)
            .send()
            .await
            .map_err(from_transport)?;

        let status = response.status();
        debug!(status = status.as_u16(), "provider responded");
        if status.is_success() {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(from_status(status, &headers, &body))
    }

    /// Fails `attempt` with [`LlmError::TimedOut`] once `config.timeout` has
    /// passed.
    async fn within_timeout<T, F>(&self, attempt: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        let limit = self.config.timeout;
        tokio::time::timeout(limit, attempt)
            .await
            .unwrap_or_else(|_| {
                Err(LlmError::TimedOut {
                    message: format!("no response within {limit:?}"),
                    source: None,
                })
            })
    }

    async fn chat_once(&self, call: &PreparedCall) -> Result<String, LlmError> {
        let completion = self
            .within_timeout(async {
                self.send(call)
                    .await?
                    .json::<ChatCompletion>()
                    .await
                    .map_err(from_transport)
            })
            .await?;
        completion
            .into_text()
            .ok_or_else(|| LlmError::malformed("completion has no choices", None))
    }

    async fn embed_once(
        &self,
        call: &PreparedCall,
        expected: usize,
    ) -> Result<EmbeddingMatrix, LlmError> {
        let response = self
            .within_timeout(async {
                self.send(call)
                    .await?
                    .json::<EmbeddingResponse>()
                    .await
                    .map_err(from_transport)
            })
            .await?;

        if response.data.len() != expected {
            return Err(LlmError::malformed(
                format!(
                    "expected {expected} embeddings, provider returned {}",
                    response.data.len()
                ),
                None,
            ));
        }
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if let Some((position, row)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
            return Err(LlmError::malformed(
                format!(
                    "embedding indices are not 0..{expected}: position {position} holds index {}",
                    row.index
                ),
                None,
            ));
        }
        let rows = data.into_iter().map(|d| d.embedding).collect();
        EmbeddingMatrix::new(self.config.embedding.dimension, rows)
    }

    /// Returns the completion text for `request`, retrying transient failures.
    #[instrument(
        name = "llm.complete",
        skip_all,
        fields(flavor = %self.config.flavor, model = tracing::field::Empty)
    )]
    pub async fn complete_text(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let call = self.prepare_chat(request, false)?;
        record_model(&call);
        let text = with_retry(&self.backoff, "chat", || self.chat_once(&call)).await?;
        debug!(chars = text.len(), "completion received");

        if request.options.keyword_extraction {
            return Ok(extract_json_or_raw(text));
        }
        Ok(text)
    }

    /// Opens a streaming completion; only opening the stream is retried.
    ///
    /// `config.timeout` bounds each attempt up to the response headers. The
    /// body may then run for as long as fragments keep arriving within
    /// `config.read_timeout` of each other.
    #[instrument(
        name = "llm.stream",
        skip_all,
        fields(flavor = %self.config.flavor, model = tracing::field::Empty)
    )]
    pub async fn stream_text(&self, request: &ChatRequest) -> Result<TextStream, LlmError> {
        let call = self.prepare_chat(request, true)?;
        record_model(&call);
        let response = with_retry(&self.backoff, "chat_stream", || {
            self.within_timeout(self.send(&call))
        })
        .await?;
        let body = response.bytes_stream().map(|chunk| chunk.map_err(from_transport));
        Ok(Box::pin(text_fragments(body)))
    }

    /// Embeds every text in `request`, retrying transient failures.
    #[instrument(
        name = "llm.embed",
        skip_all,
        fields(flavor = %self.config.flavor, texts = request.texts.len())
    )]
    pub async fn embed_texts(&self, request: &EmbeddingRequest) -> Result<EmbeddingMatrix, LlmError> {
        if request.texts.is_empty() {
            return Ok(EmbeddingMatrix::empty(self.config.embedding.dimension));
        }
        let model: &ModelName = request.model.as_ref().unwrap_or(&self.config.embedding.model);
        let endpoint = self.config.resolve(&request.credentials)?;
        let call = PreparedCall {
            url: endpoint.embeddings_url(model),
            headers: endpoint.headers()?,
            body: wire::embeddings_body(model, &request.texts),
        };
        with_retry(&self.backoff, "embed", || {
            self.embed_once(&call, request.texts.len())
        })
        .await
    }
}

/// HTTP client settings for a provider that owns its client.
///
/// No whole-request timeout is set: it would cut off a long stream that is
/// still producing. Attempts are bounded by [`OpenAiProvider`] instead.
pub(crate) fn client_builder(config: &ProviderConfig) -> ClientBuilder {
    Client::builder()
        .connect_timeout(config.timeout)
        .read_timeout(config.read_timeout)
}

fn record_model(call: &PreparedCall) {
    if let Some(model) = call.body.get("model").and_then(Value::as_str) {
        tracing::Span::current().record("model", model);
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.complete_text(request).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, LlmError> {
        self.stream_text(request).await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingMatrix, LlmError> {
        self.embed_texts(request).await
    }

    fn dimension(&self) -> usize {
        self.config.embedding.dimension
    }
}
