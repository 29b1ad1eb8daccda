//! Streaming passthrough: relay model chunks as Server-Sent Events.
//!
//! Each chunk becomes one SSE event, in arrival order, with no buffering or
//! reassembly. The relay is a lazy stream: when the client disconnects axum
//! drops it, which drops the upstream model stream with it.

use crate::error::Doc2JsonError;
use crate::pipeline::llm::{GenerativeModel, TextStream};
use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::pin::Pin;
use tracing::{debug, info, warn};

/// A boxed stream of SSE events, ready for `axum::response::Sse`.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Start a streaming generation for `prompt` and relay it as events.
///
/// # Returns
/// - `Ok(EventStream)` once the upstream stream is open
/// - `Err(Doc2JsonError)` when the model rejects the request up front
pub async fn relay(model: &dyn GenerativeModel, prompt: &str) -> Result<EventStream, Doc2JsonError> {
    info!("Starting stream from {} ({} char prompt)", model.name(), prompt.len());
    let chunks = model.stream(prompt).await?;
    Ok(Box::pin(into_events(chunks)))
}

/// Map text chunks to `data:` events.
///
/// An upstream error mid-stream is reported once as an `error` event and
/// ends the stream.
pub fn into_events(chunks: TextStream) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(Some(chunks), |state| async move {
        let mut chunks = state?;
        match chunks.next().await {
            Some(Ok(text)) => {
                debug!("Relaying chunk of {} chars", text.len());
                Some((Ok(Event::default().data(sse_safe(&text))), Some(chunks)))
            }
            Some(Err(e)) => {
                warn!("Stream aborted: {}", e);
                let event = Event::default().event("error").data(sse_safe(&e.to_string()));
                Some((Ok(event), None))
            }
            None => {
                debug!("Upstream stream finished");
                None
            }
        }
    })
}

/// SSE fields cannot carry carriage returns; newlines are split by axum.
fn sse_safe(text: &str) -> String {
    text.replace('\r', "")
}
