//! VLM interaction: the generative-model seam and its edgequake-llm backing.
//!
//! Request handlers and the [`crate::extract::Extractor`] only see the
//! [`GenerativeModel`] trait, so tests can drive the whole HTTP surface with a
//! scripted model. [`LlmModel`] is the production implementation over any
//! `edgequake_llm` provider (Gemini by default).
//!
//! Calls are not retried; a failed call surfaces as
//! [`Doc2JsonError::LlmApiError`].

use crate::config::ServiceConfig;
use crate::error::Doc2JsonError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A boxed stream of generated text chunks, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, Doc2JsonError>> + Send>>;

/// What the model produced for one non-streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Generated text, returned verbatim.
    Text(String),
    /// The provider refused to answer for policy reasons.
    Blocked { reason: String },
}

/// The operations the service needs from a generative text/vision model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// `provider/model` label used in logs and the health endpoint.
    fn name(&self) -> String;

    /// Text-only completion.
    async fn generate(&self, prompt: &str) -> Result<Generation, Doc2JsonError>;

    /// Completion over a prompt and one image, sent as a single user turn.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: ImageData,
    ) -> Result<Generation, Doc2JsonError>;

    /// Incremental completion; chunks are yielded as the provider emits them.
    async fn stream(&self, prompt: &str) -> Result<TextStream, Doc2JsonError>;
}

/// [`GenerativeModel`] backed by an `edgequake_llm` provider.
pub struct LlmModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Resolve the provider named in `config` and wrap it.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, Doc2JsonError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Generation, Doc2JsonError> {
        let start = Instant::now();
        match self.provider.chat(messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.name(),
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                if let Some(reason) = response.finish_reason.as_deref() {
                    if is_safety_finish_reason(reason) {
                        warn!("{}: response blocked (finish_reason={})", self.name(), reason);
                        return Ok(Generation::Blocked {
                            reason: reason.to_string(),
                        });
                    }
                }
                Ok(Generation::Text(response.content))
            }
            Err(e) => {
                let message = e.to_string();
                if is_safety_error(&message) {
                    warn!("{}: response blocked: {}", self.name(), message);
                    return Ok(Generation::Blocked { reason: message });
                }
                warn!("{}: call failed: {}", self.name(), message);
                Err(Doc2JsonError::LlmApiError { message })
            }
        }
    }
}

#[async_trait]
impl GenerativeModel for LlmModel {
    fn name(&self) -> String {
        format!("{}/{}", self.provider.name(), self.provider.model())
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, Doc2JsonError> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: ImageData,
    ) -> Result<Generation, Doc2JsonError> {
        self.complete(&[ChatMessage::user_with_images(prompt, vec![image])])
            .await
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, Doc2JsonError> {
        let chunks = self
            .provider
            .stream(prompt)
            .await
            .map_err(|e| Doc2JsonError::LlmApiError {
                message: e.to_string(),
            })?;

        Ok(Box::pin(chunks.map(|chunk| {
            chunk.map_err(|e| Doc2JsonError::LlmApiError {
                message: e.to_string(),
            })
        })))
    }
}

/// Build `CompletionOptions` from the service config.
fn build_options(config: &ServiceConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve LLM provider from config.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, Doc2JsonError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    ProviderFactory::create_llm_provider(&config.provider_name, &config.model).map_err(|e| {
        Doc2JsonError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        }
    })
}

/// Finish reasons providers use for policy refusals (Gemini, OpenAI, Azure).
fn is_safety_finish_reason(reason: &str) -> bool {
    matches!(
        reason.to_ascii_lowercase().as_str(),
        "safety" | "content_filter" | "blocked" | "blocklist" | "prohibited_content" | "spii"
    )
}

/// edgequake-llm turns a content-filter finish into an `ApiError`.
fn is_safety_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("content_filter") || lower.contains("content filter") || lower.contains("safety")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ServiceConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn safety_finish_reasons() {
        assert!(is_safety_finish_reason("SAFETY"));
        assert!(is_safety_finish_reason("content_filter"));
        assert!(!is_safety_finish_reason("stop"));
        assert!(!is_safety_finish_reason("length"));
    }

    #[test]
    fn safety_errors() {
        assert!(is_safety_error(
            "API error: response stopped by content_filter guardrail"
        ));
        assert!(!is_safety_error("API error: 429 quota exceeded"));
    }
}
