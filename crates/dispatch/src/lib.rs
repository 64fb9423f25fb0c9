//! Multi-model dispatch for LLM calls.
//!
//! A [`MultiModel`] holds an ordered list of [`ModelDescriptor`]s, each a
//! backend plus the options it always applies, and round-robins successive
//! calls across them. The usual use is one descriptor per provider key, to
//! spread traffic over several rate limits.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Dispatch only sequences calls to
//! [`pipeline::LlmProvider`] implementations. It performs no I/O of its own
//! and knows nothing about HTTP or a particular provider.

pub mod descriptor;
pub mod multi_model;

pub use descriptor::ModelDescriptor;
pub use multi_model::MultiModel;
