//! Error types for the edgequake-doc2json service.
//!
//! A single enum, [`Doc2JsonError`], covers every failure that can end a
//! request or abort startup. Failures that must *not* end a request never
//! appear here as returned values:
//!
//! * salvaging failures resolve to an empty [`crate::schema::ExtractedRecord`]
//!   (see [`crate::pipeline::salvage`]);
//! * insert failures are logged, downgrade the upload message and leave
//!   `json_data` empty;
//! * safety blocks are a [`crate::pipeline::llm::Generation`] variant, not an
//!   error.
//!
//! [`Doc2JsonError::status`] decides how the HTTP layer reports each variant:
//! client input mistakes are `400`, everything else is `500` carrying the
//! `Display` text.

use axum::http::StatusCode;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-doc2json library.
#[derive(Debug, Error)]
pub enum Doc2JsonError {
    // ── Client input errors ───────────────────────────────────────────────
    /// `/chat` was called without a non-empty `prompt`.
    #[error("Prompt is required")]
    MissingPrompt,

    /// The request body could not be read as the expected JSON document.
    #[error("Invalid request body: {detail}")]
    InvalidBody { detail: String },

    /// The multipart upload had no `file` part.
    #[error("No file part")]
    MissingFile,

    /// The `file` part was present but carried an empty filename.
    #[error("No selected file")]
    EmptyFilename,

    /// The multipart stream itself was malformed or truncated.
    #[error("Malformed multipart upload: {detail}")]
    InvalidMultipart { detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned an error (network, quota, malformed response).
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// A conversational reply was withheld by the model's safety filters.
    #[error("Response blocked by the model's safety filters ({reason})")]
    ResponseBlocked { reason: String },

    // ── Blob store errors ─────────────────────────────────────────────────
    /// No bucket was configured, so uploads cannot be stored.
    #[error("Blob storage is not configured.\nSet S3_BUCKET to enable uploads.")]
    StorageNotConfigured,

    /// Writing the uploaded bytes to the blob store failed.
    #[error("Failed to upload '{key}' to blob storage: {detail}")]
    UploadFailed { key: String, detail: String },

    /// Reading the stored bytes back from the blob store failed.
    #[error("Failed to download '{key}' from blob storage: {detail}")]
    DownloadFailed { key: String, detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The uploaded bytes are not a decodable image.
    #[error("Cannot decode uploaded image: {detail}")]
    ImageDecodeFailed { detail: String },

    /// The decoded image could not be re-encoded for the model request.
    #[error("Cannot encode image for the model: {detail}")]
    ImageEncodeFailed { detail: String },

    // ── Document store errors ─────────────────────────────────────────────
    /// The document database could not be reached.
    #[error("Document database unavailable: {detail}")]
    DatabaseUnavailable { detail: String },

    /// Inserting an extracted record failed.
    #[error("Failed to store extracted record: {detail}")]
    PersistFailed { detail: String },

    // ── Startup errors ────────────────────────────────────────────────────
    /// The static landing page could not be read.
    #[error("Landing page '{path}' is unavailable: {source}")]
    LandingPageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listen socket could not be bound.
    #[error("Cannot listen on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2JsonError {
    /// HTTP status used when this error ends a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Doc2JsonError::MissingPrompt
            | Doc2JsonError::InvalidBody { .. }
            | Doc2JsonError::MissingFile
            | Doc2JsonError::EmptyFilename
            | Doc2JsonError::InvalidMultipart { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `true` for errors caused by the caller's request rather than the service.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        for e in [
            Doc2JsonError::MissingPrompt,
            Doc2JsonError::MissingFile,
            Doc2JsonError::EmptyFilename,
            Doc2JsonError::InvalidBody {
                detail: "eof".into(),
            },
        ] {
            assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{e}");
            assert!(e.is_client_error());
        }
    }

    #[test]
    fn upstream_errors_map_to_500() {
        let e = Doc2JsonError::LlmApiError {
            message: "quota exceeded".into(),
        };
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("quota exceeded"));
    }

    #[test]
    fn missing_file_messages_match_http_contract() {
        assert_eq!(Doc2JsonError::MissingFile.to_string(), "No file part");
        assert_eq!(Doc2JsonError::EmptyFilename.to_string(), "No selected file");
        assert_eq!(Doc2JsonError::MissingPrompt.to_string(), "Prompt is required");
    }

    #[test]
    fn upload_failed_display() {
        let e = Doc2JsonError::UploadFailed {
            key: "card.png".into(),
            detail: "access denied".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("card.png"), "got: {msg}");
        assert!(msg.contains("access denied"), "got: {msg}");
    }
}
