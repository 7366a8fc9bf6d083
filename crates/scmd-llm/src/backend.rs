//! Backend trait.
//!
//! Defines the interface that every inference engine must implement.

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{CompletionRequest, CompletionResponse};

/// Inference backend capability.
///
/// Implementors turn a [`CompletionRequest`] into generated text. Executors
/// only ever see `dyn Backend`, so local and remote engines are
/// interchangeable.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Run a single completion.
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse>;

    /// Whether the backend can currently serve requests.
    async fn is_available(&self) -> bool {
        true
    }

    /// Count tokens in text (approximate).
    fn estimate_tokens(&self, text: &str) -> usize {
        // ~4 chars per token
        text.len() / 4
    }
}

/// Blanket implementation allowing `Box<dyn Backend>` to be used wherever
/// `B: Backend` is required.
#[async_trait]
impl Backend for Box<dyn Backend> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        (**self).complete(request).await
    }

    async fn is_available(&self) -> bool {
        (**self).is_available().await
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        (**self).estimate_tokens(text)
    }
}
