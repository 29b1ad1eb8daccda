//! HTTP surface: axum router, shared state and request handlers.
//!
//! | Route          | Handler                                   |
//! |----------------|-------------------------------------------|
//! | `GET /`        | static landing page                       |
//! | `GET /health`  | collaborator availability                 |
//! | `POST /chat`   | [`crate::chat::chat`]                     |
//! | `POST /upload` | [`crate::extract::Extractor::extract`]    |
//! | `GET /stream`  | [`crate::stream::relay`] as SSE           |
//!
//! Handlers return `Result<_, Doc2JsonError>`; the error's
//! [`IntoResponse`] impl turns every failure into `{"error": "..."}` with the
//! status from [`Doc2JsonError::status`].

use crate::chat;
use crate::config::ServiceConfig;
use crate::error::Doc2JsonError;
use crate::extract::Extractor;
use crate::output::{ChatRequest, ChatResponse, ErrorResponse, HealthResponse, UploadResponse};
use crate::pipeline::llm::{GenerativeModel, LlmModel};
use crate::pipeline::persist::{DocumentStore, MongoDocumentStore};
use crate::pipeline::storage::{BlobStore, S3BlobStore};
use crate::stream::{self, EventStream};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::response::{Html, IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Long-lived service handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn GenerativeModel>,
    pub extractor: Arc<Extractor>,
    pub landing_page: Arc<str>,
    pub default_stream_prompt: Arc<str>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Assemble state from already-constructed collaborators.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        blobs: Option<Arc<dyn BlobStore>>,
        documents: Option<Arc<dyn DocumentStore>>,
        config: &ServiceConfig,
        landing_page: impl Into<Arc<str>>,
    ) -> Self {
        let extractor = Extractor::new(
            Arc::clone(&model),
            blobs,
            documents,
            config.extraction_prompt.clone(),
        );
        Self {
            model,
            extractor: Arc::new(extractor),
            landing_page: landing_page.into(),
            default_stream_prompt: config.default_stream_prompt.as_str().into(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Open every collaborator named in `config`.
    ///
    /// # Errors
    /// Fails only when the landing page cannot be read or the model provider
    /// cannot be created. A missing bucket or an unreachable database is
    /// logged and the service starts without that collaborator.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, Doc2JsonError> {
        let landing_page = tokio::fs::read_to_string(&config.landing_page)
            .await
            .map_err(|source| Doc2JsonError::LandingPageUnavailable {
                path: config.landing_page.clone(),
                source,
            })?;

        let model: Arc<dyn GenerativeModel> = Arc::new(LlmModel::from_config(config)?);
        info!("Model: {}", model.name());

        let blobs = S3BlobStore::connect(&config.blob_store)
            .await
            .map(|store| Arc::new(store) as Arc<dyn BlobStore>);
        if blobs.is_none() {
            warn!("No blob storage bucket configured; uploads will fail");
        }

        let documents = match MongoDocumentStore::connect(&config.document_store).await {
            Ok(Some(store)) => Some(Arc::new(store) as Arc<dyn DocumentStore>),
            Ok(None) => {
                info!("No database configured; extracted records will not be stored");
                None
            }
            Err(e) => {
                warn!("{}; continuing without persistence", e);
                None
            }
        };

        Ok(Self::new(model, blobs, documents, config, landing_page))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat_handler))
        .route("/upload", post(upload_handler).layer(upload_limit))
        .route("/stream", get(stream_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Doc2JsonError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Doc2JsonError::BindFailed { addr, source })?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Doc2JsonError::Internal(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.landing_page.to_string())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model.name(),
        storage: state.extractor.has_storage(),
        database: state.extractor.has_database(),
    })
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, Doc2JsonError> {
    let Json(request) = payload.map_err(|e| Doc2JsonError::InvalidBody {
        detail: e.body_text(),
    })?;
    let response = chat::chat(state.model.as_ref(), request.prompt.as_deref()).await?;
    Ok(Json(ChatResponse { response }))
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Doc2JsonError> {
    let (filename, bytes) = read_file_part(&mut multipart).await?;
    let response = state.extractor.extract(&filename, bytes).await?;
    Ok(Json(response))
}

/// Find the `file` part and read it fully.
async fn read_file_part(multipart: &mut Multipart) -> Result<(String, Vec<u8>), Doc2JsonError> {
    let malformed = |e: axum::extract::multipart::MultipartError| Doc2JsonError::InvalidMultipart {
        detail: e.body_text(),
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") {
            continue;
        }
        // A `file` part without a filename is a plain form value, not an upload.
        let filename = match field.file_name() {
            None => return Err(Doc2JsonError::MissingFile),
            Some("") => return Err(Doc2JsonError::EmptyFilename),
            Some(name) => name.to_string(),
        };
        let bytes = field.bytes().await.map_err(malformed)?;
        debug!("Received '{}' ({} bytes)", filename, bytes.len());
        return Ok((filename, bytes.to_vec()));
    }
    Err(Doc2JsonError::MissingFile)
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    prompt: Option<String>,
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<EventStream>, Doc2JsonError> {
    let prompt = query
        .prompt
        .unwrap_or_else(|| state.default_stream_prompt.to_string());
    let events = stream::relay(state.model.as_ref(), &prompt).await?;
    Ok(Sse::new(events))
}

impl IntoResponse for Doc2JsonError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_client_error() {
            debug!("Rejected request: {}", self);
        } else {
            error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
