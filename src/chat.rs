//! Conversational passthrough: forward a prompt, return the reply verbatim.

use crate::error::Doc2JsonError;
use crate::pipeline::llm::{GenerativeModel, Generation};
use tracing::{debug, warn};

/// Send `prompt` to the model and return its full text reply.
///
/// # Errors
/// - [`Doc2JsonError::MissingPrompt`] for an absent or empty prompt
/// - [`Doc2JsonError::ResponseBlocked`] when the model refuses to answer
/// - [`Doc2JsonError::LlmApiError`] on any upstream failure
pub async fn chat(model: &dyn GenerativeModel, prompt: Option<&str>) -> Result<String, Doc2JsonError> {
    let prompt = prompt
        .filter(|p| !p.is_empty())
        .ok_or(Doc2JsonError::MissingPrompt)?;
    debug!("Chat prompt: {} chars", prompt.len());

    match model.generate(prompt).await? {
        Generation::Text(text) => Ok(text),
        Generation::Blocked { reason } => {
            warn!("Chat reply blocked: {}", reason);
            Err(Doc2JsonError::ResponseBlocked { reason })
        }
    }
}
