//! Round-robin dispatcher over a fixed list of model descriptors.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pipeline::{ChatRequest, LlmError, LlmProvider, TextStream};
use tracing::{debug, instrument};

use crate::descriptor::ModelDescriptor;

/// Spreads successive calls across several descriptors, typically one per
/// provider key, so no single key absorbs all traffic.
///
/// The k-th call (counting from 1) goes to descriptor `(k - 1) % len`. The
/// cursor advances when a descriptor is selected, whatever the call's outcome.
/// A failed call is not retried on another descriptor; retry is the backend's
/// concern.
#[derive(Debug)]
pub struct MultiModel {
    descriptors: Vec<ModelDescriptor>,
    cursor: AtomicUsize,
}

impl MultiModel {
    /// Fails with [`LlmError::ConfigurationError`] when `descriptors` is empty.
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Result<Self, LlmError> {
        if descriptors.is_empty() {
            return Err(LlmError::configuration(
                "multi-model dispatch needs at least one model descriptor",
            ));
        }
        Ok(Self {
            descriptors,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The rotation, in dispatch order.
    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    fn next_descriptor(&self) -> (usize, &ModelDescriptor) {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.descriptors.len();
        (index, &self.descriptors[index])
    }

    /// Selects the next descriptor and builds the request it will receive.
    ///
    /// The caller's `model`, `keyword_extraction` and `mode` are dropped; the
    /// descriptor's fixed options are then laid over what remains.
    fn route(&self, request: &ChatRequest) -> (&ModelDescriptor, ChatRequest) {
        let (index, descriptor) = self.next_descriptor();
        let mut routed = request.clone();
        routed.options = routed
            .options
            .without_dispatch_keys()
            .overlaid_with(&descriptor.fixed);

        tracing::Span::current().record("descriptor", descriptor.name.as_str());
        debug!(index, of = self.descriptors.len(), "dispatching to model descriptor");
        (descriptor, routed)
    }

    /// Sends `request` to the next descriptor's backend.
    #[instrument(name = "dispatch.complete", skip_all, fields(descriptor = tracing::field::Empty))]
    pub async fn dispatch(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let (descriptor, routed) = self.route(request);
        descriptor.backend.complete(&routed).await
    }

    /// Streaming counterpart of [`MultiModel::dispatch`].
    #[instrument(name = "dispatch.stream", skip_all, fields(descriptor = tracing::field::Empty))]
    pub async fn dispatch_stream(&self, request: &ChatRequest) -> Result<TextStream, LlmError> {
        let (descriptor, routed) = self.route(request);
        descriptor.backend.stream(&routed).await
    }
}

#[async_trait]
impl LlmProvider for MultiModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.dispatch(request).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, LlmError> {
        self.dispatch_stream(request).await
    }
}
