//! Pipeline stages for document-image extraction.
//!
//! Each submodule implements exactly one step, or one external collaborator
//! behind a trait, so stages are independently testable and backends can be
//! swapped without touching the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ storage ──▶ encode ──▶ llm ──▶ salvage ──▶ persist
//! (bytes)    (S3 put/get) (PNG b64)  (VLM)   (JSON)     (MongoDB)
//! ```
//!
//! 1. [`storage`]: write the upload to the blob store and read it back
//! 2. [`encode`]:  decode the image and wrap it as base64 PNG `ImageData`
//! 3. [`llm`]:     the generative-model seam; the only stage that talks to
//!    the VLM
//! 4. [`salvage`]: recover a schema record from whatever text came back
//! 5. [`persist`]: optionally insert the record into the document store

pub mod encode;
pub mod llm;
pub mod persist;
pub mod salvage;
pub mod storage;
