//! # edgequake-doc2json
//!
//! Extract structured fields from identity and residence-permit images using
//! Vision Language Models (VLMs), served over HTTP.
//!
//! ## Why this crate?
//!
//! Template-based OCR breaks on every new card layout. Instead this crate
//! hands the image to a VLM with a schema-derived prompt and then *salvages*
//! whatever text comes back into a fixed-schema JSON record, tolerating the
//! prose, fences and quoting mistakes models routinely make.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Store    write to S3, read the canonical copy back
//!  ├─ 2. Encode   decode image → PNG → base64 ImageData
//!  ├─ 3. VLM      one extraction call (gemini-2.0-flash by default)
//!  ├─ 4. Salvage  delimiter extraction, normalisation, fallback repair
//!  ├─ 5. Persist  optional MongoDB insert (failure degrades, never fails)
//!  └─ 6. Output   { message, url, json_data }
//! ```
//!
//! `/chat` and `/stream` forward prompts to the same model verbatim.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2json::{serve, AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .bucket("id-uploads")
//!         .build()?;
//!     let state = AppState::connect(&config).await?;
//!     serve(config.bind_addr, state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2json` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chat;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BlobStoreConfig, DocumentStoreConfig, ServiceConfig, ServiceConfigBuilder};
pub use error::Doc2JsonError;
pub use extract::Extractor;
pub use output::{ChatResponse, ErrorResponse, HealthResponse, UploadResponse};
pub use pipeline::llm::{GenerativeModel, Generation, LlmModel, TextStream};
pub use pipeline::persist::{DocumentStore, MongoDocumentStore};
pub use pipeline::salvage::{salvage, salvage_outcome, Salvage};
pub use pipeline::storage::{BlobStore, S3BlobStore};
pub use schema::{ExtractedRecord, FieldSpec, FIELDS};
pub use server::{router, serve, AppState};
