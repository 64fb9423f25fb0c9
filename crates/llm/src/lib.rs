//! LLM provider infrastructure adapter.
//!
//! Implements [`pipeline::LlmProvider`] and [`pipeline::EmbeddingProvider`]
//! for OpenAI-compatible endpoints, in both the plain OpenAI and the Azure
//! OpenAI dialect ([`ApiFlavor`]).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, SSE decoding, and exponential back-off live here. The
//! [`pipeline`] crate sees only the port traits.
//!
//! ## Retry
//!
//! Every call goes through [`retry::with_retry`]: up to 3 attempts, waits of
//! 4s growing to at most 10s, and only for rate limiting, connection failures,
//! and timeouts. Streaming calls retry the initial connection only.

pub mod config;
mod error;
pub mod keywords;
pub mod provider;
pub mod retry;
pub mod sse;
mod stream;
mod wire;

pub use config::{ApiFlavor, ProviderConfig, ResolvedEndpoint};
pub use keywords::{extract_json_or_raw, locate_json_body, KeywordExtraction};
pub use provider::OpenAiProvider;
pub use retry::{with_retry, BackoffPolicy};
