//! LLM domain for a retrieval-augmented-generation pipeline.
//!
//! This crate contains the value types, error taxonomy, and port traits that
//! the pipeline uses to call hosted language models. Infrastructure crates
//! implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain types + port definitions.** This crate has no I/O dependencies.
//! It defines *what* a completion or embedding call is; the `llm` crate
//! defines *how* to perform one over HTTP.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names and secrets (`ModelName`, `ApiVersion`, `ApiKey`) |
//! | [`types`] | Messages, requests, call options, embedding matrix |
//! | [`errors`] | `LlmError` and the `RetryPolicy` classification |
//! | [`provider`] | `LlmProvider` / `EmbeddingProvider` port traits |

pub mod errors;
pub mod identifiers;
pub mod provider;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{BoxError, LlmError, RetryPolicy};
pub use identifiers::{ApiKey, ApiVersion, ModelName};
pub use provider::{EmbeddingProvider, LlmProvider, TextStream};
pub use types::{
    CallOptions, ChatMessage, ChatRequest, Credentials, EmbeddingMatrix, EmbeddingRequest,
    EmbeddingSpec, Role, DISPATCH_OPTION_KEYS,
};
