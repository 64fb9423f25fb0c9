//! A configured model backend plus the options it always applies.

use std::fmt;
use std::sync::Arc;

use pipeline::{CallOptions, LlmError, LlmProvider, ModelName};
use serde_json::{Map, Value};

/// One entry in a [`crate::MultiModel`] rotation.
///
/// Immutable once built. The `fixed` options are overlaid on every request
/// sent through this descriptor and win over anything the caller passed.
#[derive(Clone)]
pub struct ModelDescriptor {
    /// Label used in logs. Never sent to a provider.
    pub name: String,
    /// Backend performing the call.
    pub backend: Arc<dyn LlmProvider>,
    /// Options fixed for this descriptor (model, credentials, sampling...).
    pub fixed: CallOptions,
}

impl ModelDescriptor {
    /// Creates a descriptor with no fixed options.
    pub fn new(name: impl Into<String>, backend: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            backend,
            fixed: CallOptions::default(),
        }
    }

    /// Replaces the fixed options.
    #[must_use]
    pub fn with_options(mut self, fixed: CallOptions) -> Self {
        self.fixed = fixed;
        self
    }

    /// Pins the model this descriptor calls.
    #[must_use]
    pub fn with_model(mut self, model: ModelName) -> Self {
        self.fixed.model = Some(model);
        self
    }

    /// Replaces the fixed options with an untyped argument map, e.g.
    /// `{"model": "gpt-4o", "api_key": "...", "temperature": 0}`.
    pub fn with_fixed_arguments(mut self, arguments: Map<String, Value>) -> Result<Self, LlmError> {
        self.fixed = CallOptions::from_map(arguments)?;
        Ok(self)
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("fixed", &self.fixed)
            .finish_non_exhaustive()
    }
}
