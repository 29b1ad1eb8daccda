//! Upload-and-extract orchestration.
//!
//! [`Extractor`] owns handles to the three external collaborators (model,
//! blob store, document store) and drives one upload through the pipeline in
//! [`crate::pipeline`]. It is built once at startup and shared by every
//! request.

use crate::error::Doc2JsonError;
use crate::output::{UploadResponse, MSG_ANALYZED, MSG_BLOCKED, MSG_STORED, MSG_STORE_FAILED};
use crate::pipeline::encode;
use crate::pipeline::llm::{GenerativeModel, Generation};
use crate::pipeline::persist::DocumentStore;
use crate::pipeline::salvage::{salvage_outcome, Salvage};
use crate::pipeline::storage::BlobStore;
use crate::prompts::extraction_prompt;
use crate::schema::ExtractedRecord;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Coordinates one upload: store → read back → analyse → salvage → persist.
pub struct Extractor {
    model: Arc<dyn GenerativeModel>,
    blobs: Option<Arc<dyn BlobStore>>,
    documents: Option<Arc<dyn DocumentStore>>,
    prompt: String,
}

impl Extractor {
    /// `prompt` overrides the schema-derived extraction prompt when `Some`.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        blobs: Option<Arc<dyn BlobStore>>,
        documents: Option<Arc<dyn DocumentStore>>,
        prompt: Option<String>,
    ) -> Self {
        Self {
            model,
            blobs,
            documents,
            prompt: prompt.unwrap_or_else(|| extraction_prompt().to_string()),
        }
    }

    pub fn has_storage(&self) -> bool {
        self.blobs.is_some()
    }

    pub fn has_database(&self) -> bool {
        self.documents.is_some()
    }

    /// Run the full extraction flow for one uploaded file.
    ///
    /// # Errors
    /// Storage, image and model failures end the request. Salvaging and
    /// insert failures do not: both yield an empty `json_data`, and a failed
    /// insert also downgrades the message. Without a document store the
    /// extracted record is returned as-is.
    pub async fn extract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, Doc2JsonError> {
        let start = Instant::now();
        let blobs = self
            .blobs
            .as_ref()
            .ok_or(Doc2JsonError::StorageNotConfigured)?;

        // ── Step 1: Store the upload ─────────────────────────────────────────
        info!("Storing upload '{}' ({} bytes)", filename, bytes.len());
        let url = blobs.put(filename, bytes).await?;

        // ── Step 2: Read the canonical copy back ─────────────────────────────
        let stored = blobs.get(filename).await?;

        // ── Step 3: Decode + encode for the model ────────────────────────────
        let image = encode::decode_upload(&stored)?;
        let image_data = encode::encode_image(&image)?;

        // ── Step 4: Ask the model ────────────────────────────────────────────
        let raw = match self.model.generate_with_image(&self.prompt, image_data).await? {
            Generation::Text(text) => text,
            Generation::Blocked { reason } => {
                warn!("Extraction for '{}' blocked: {}", filename, reason);
                return Ok(UploadResponse {
                    message: MSG_BLOCKED.to_string(),
                    url,
                    json_data: ExtractedRecord::empty(),
                    document_id: None,
                });
            }
        };
        debug!("Model returned {} chars for '{}'", raw.len(), filename);

        // ── Step 5: Salvage a record ─────────────────────────────────────────
        let outcome = salvage_outcome(&raw);
        if let Salvage::Repaired(_) = outcome {
            info!("'{}': record recovered by secondary repair", filename);
        }
        let mut record = outcome.into_record();
        if !record.is_empty() {
            let missing = record.missing_fields();
            if !missing.is_empty() {
                warn!("'{}': model omitted fields {:?}", filename, missing);
            }
        }

        // ── Step 6: Persist ──────────────────────────────────────────────────
        let mut message = MSG_ANALYZED;
        let mut document_id = None;
        match self.documents.as_ref() {
            Some(documents) if !record.is_empty() => {
                record.attach_file_url(url.clone());
                match documents.insert(&record).await {
                    Ok(id) => {
                        info!("'{}': stored as document {}", filename, id);
                        message = MSG_STORED;
                        document_id = Some(id);
                    }
                    Err(e) => {
                        warn!("'{}': {}", filename, e);
                        message = MSG_STORE_FAILED;
                        record = ExtractedRecord::empty();
                    }
                }
            }
            _ => {}
        }

        info!(
            "Extracted {} fields from '{}' in {}ms",
            record.len(),
            filename,
            start.elapsed().as_millis()
        );

        Ok(UploadResponse {
            message: message.to_string(),
            url,
            json_data: record,
            document_id,
        })
    }
}
