//! End-to-end tests against a live model API.
//!
//! These tests make real LLM calls and are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//! They need `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) to be set.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! The document test additionally reads `test_cases/residence_card.png` and is
//! skipped when that file is absent.

use async_trait::async_trait;
use edgequake_doc2json::{
    chat, salvage_outcome, stream, BlobStore, Doc2JsonError, Extractor, GenerativeModel,
    LlmModel, Salvage, ServiceConfig, FIELDS,
};
use futures::StreamExt;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test unless E2E_ENABLED is set and an API key is available.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match std::env::var("GEMINI_API_KEY").or_else(|_| std::env::var("GOOGLE_API_KEY")) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                println!("SKIP: GEMINI_API_KEY is not set");
                return;
            }
        }
    }};
}

fn live_model(api_key: String) -> Arc<dyn GenerativeModel> {
    if std::env::var("GEMINI_API_KEY").is_err() {
        std::env::set_var("GEMINI_API_KEY", &api_key);
    }
    let config = ServiceConfig::builder()
        .api_key(api_key)
        .build()
        .expect("config");
    Arc::new(LlmModel::from_config(&config).expect("provider"))
}

#[derive(Default)]
struct MemoryBlobs {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, Doc2JsonError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Doc2JsonError> {
        self.objects.lock().unwrap().get(key).cloned().ok_or_else(|| {
            Doc2JsonError::DownloadFailed {
                key: key.to_string(),
                detail: "missing".into(),
            }
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

fn extractor(model: Arc<dyn GenerativeModel>) -> Extractor {
    Extractor::new(model, Some(Arc::new(MemoryBlobs::default())), None, None)
}

// ── Chat and stream ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_live() {
    let key = e2e_skip_unless_ready!();
    let model = live_model(key);

    let reply = chat::chat(model.as_ref(), Some("Reply with the single word: pong"))
        .await
        .expect("chat");
    println!("chat reply: {reply:?}");
    assert!(!reply.trim().is_empty());
    assert!(reply.to_lowercase().contains("pong"), "got: {reply}");
}

#[tokio::test]
async fn test_stream_live() {
    let key = e2e_skip_unless_ready!();
    let model = live_model(key);

    let chunks: Vec<String> = model
        .stream("Count from one to five in words.")
        .await
        .expect("stream")
        .map(|c| c.expect("chunk"))
        .collect()
        .await;
    let text = chunks.concat();
    println!("{} chunks: {text:?}", chunks.len());
    assert!(!chunks.is_empty());
    assert!(text.to_lowercase().contains("three"), "got: {text}");
}

#[tokio::test]
async fn test_stream_events_live() {
    let key = e2e_skip_unless_ready!();
    let model = live_model(key);

    let events: Vec<_> = stream::relay(model.as_ref(), "Say hello.")
        .await
        .expect("relay")
        .collect()
        .await;
    assert!(!events.is_empty());
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_blank_image_yields_object() {
    let key = e2e_skip_unless_ready!();
    let model = live_model(key);

    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 120, Rgb([255, 255, 255])));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let response = extractor(model)
        .extract("blank.png", png)
        .await
        .expect("extract");
    println!("{}", serde_json::to_string_pretty(&response).unwrap());

    assert_eq!(response.url, "memory://blank.png");
    // Whatever the model says about a blank page, json_data is a map whose
    // keys all come from the schema.
    for (key, _) in response.json_data.iter() {
        assert!(FIELDS.iter().any(|f| f.name == key.as_str()), "unexpected key {key}");
    }
}

#[tokio::test]
async fn test_extract_residence_card() {
    let key = e2e_skip_unless_ready!();
    let path = test_cases_dir().join("residence_card.png");
    if !path.exists() {
        println!("SKIP: test file not found: {}", path.display());
        return;
    }
    let model = live_model(key);
    let bytes = std::fs::read(&path).unwrap();

    let response = extractor(model)
        .extract("residence_card.png", bytes)
        .await
        .expect("extract");
    println!("{}", serde_json::to_string_pretty(&response).unwrap());

    assert!(!response.json_data.is_empty(), "no fields extracted");
    assert!(
        response.json_data.missing_fields().len() < FIELDS.len(),
        "every field missing"
    );
}

#[tokio::test]
async fn test_live_reply_salvages() {
    let key = e2e_skip_unless_ready!();
    let model = live_model(key);

    let reply = chat::chat(
        model.as_ref(),
        Some(r#"Return a JSON object with keys "name" and "country" for a fictional person. Nothing else."#),
    )
    .await
    .expect("chat");

    match salvage_outcome(&reply) {
        Salvage::Parsed(record) | Salvage::Repaired(record) => {
            assert!(record.get("name").is_some(), "got: {reply}");
        }
        other => panic!("reply did not salvage ({other:?}): {reply}"),
    }
}
