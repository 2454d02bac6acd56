//! Inference provider abstraction
//!
//! The agent only ever talks to `LlmService`; the concrete client speaks the
//! OpenAI-compatible chat protocol exposed by the inference router.

mod error;
mod inference;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use inference::InferenceService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Receives text fragments while a streamed completion is in flight
pub type DeltaSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Common interface for inference providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Make a completion request, reporting text as it is generated.
    ///
    /// Providers without streaming support report the whole text at once.
    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.complete(request).await?;
        let text = response.text();
        if !text.is_empty() {
            on_delta(&text);
        }
        Ok(response)
    }

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }

    fn log_result(&self, result: &Result<LlmResponse, LlmError>, duration: std::time::Duration) {
        match result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        self.log_result(&result, start.elapsed());
        result
    }

    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete_streaming(request, on_delta).await;
        self.log_result(&result, start.elapsed());
        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
