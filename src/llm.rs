//! Text-generation model access
//!
//! Only Gemini is wired up; processors talk to the [`LlmService`] trait.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiService, DEFAULT_GEMINI_MODEL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Wraps a service and records one log line per completion
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let started = Instant::now();
        let result = self.inner.complete(request).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                model = %self.inner.model_id(),
                elapsed_ms = %elapsed_ms,
                turns = request.messages.len(),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                reply_chars = response.text.chars().count(),
                "Model replied"
            ),
            Err(e) => tracing::error!(
                model = %self.inner.model_id(),
                elapsed_ms = %elapsed_ms,
                kind = ?e.kind,
                error = %e.message,
                "Model call failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
