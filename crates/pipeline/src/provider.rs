//! Port traits for LLM backends.
//!
//! The RAG pipeline never talks HTTP itself. It holds `Arc<dyn LlmProvider>`
//! (and `Arc<dyn EmbeddingProvider>`) values; infrastructure crates implement
//! these traits once per provider, and the dispatcher implements
//! [`LlmProvider`] on top of a set of other providers.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{ChatRequest, EmbeddingMatrix, EmbeddingRequest, LlmError};

/// A lazy, finite, forward-only sequence of completion text fragments.
///
/// Each item is one non-empty delta as emitted by the provider. An `Err`
/// item ends the sequence. The stream is not restartable.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A chat completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the full completion text for `request`.
    ///
    /// Implementations retry transient failures internally; an error returned
    /// here is final.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Opens a streaming completion for `request`.
    ///
    /// Only opening the stream is retried. Failures after the first fragment
    /// surface as an `Err` item.
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, LlmError>;
}

/// An embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every text in `request`, one row per text, in input order.
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingMatrix, LlmError>;

    /// Width of the vectors this provider returns.
    fn dimension(&self) -> usize;
}
