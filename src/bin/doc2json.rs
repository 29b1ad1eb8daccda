//! HTTP server binary for edgequake-doc2json.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig`, opens the external services and serves.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2json::{serve, AppState, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (0.0.0.0:5000)
  doc2json

  # Local S3-compatible store and MongoDB
  doc2json --s3-endpoint http://localhost:9000 --mongo-uri mongodb://localhost:27017

  # Different model
  doc2json --model gemini-2.5-pro

ENDPOINTS:
  GET  /                 landing page
  GET  /health           collaborator status
  POST /chat             {"prompt": "..."} → {"response": "..."}
  POST /upload           multipart field `file` → {"message", "url", "json_data"}
  GET  /stream?prompt=…  text/event-stream, one `data:` event per chunk

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Model API key (GOOGLE_API_KEY is accepted too)
  S3_BUCKET               Bucket for uploaded images
  S3_ACCESS_KEY           S3 access key id (default AWS chain when unset)
  S3_SECRET_KEY           S3 secret access key
  MONGO_URI               MongoDB connection string (persistence off when unset)
  MONGO_DB_NAME           Database name (default: doc2json)
  MONGO_COLLECTION_NAME   Collection name (default: extracted_documents)
  RUST_LOG                Log filter, e.g. edgequake_doc2json=debug

A `.env` file in the working directory is loaded before flags are parsed.
"#;

/// Extract structured fields from document images with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "doc2json",
    version,
    about = "Extract structured fields from document images with a Vision LLM",
    long_about = "HTTP service that stores uploaded document images in S3, asks a Vision \
Language Model to extract a fixed set of identity-document fields, salvages the reply into \
JSON and optionally stores it in MongoDB. Also exposes chat and streaming passthroughs.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Model API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "DOC2JSON_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM model ID.
    #[arg(long, env = "DOC2JSON_MODEL", default_value = "gemini-2.0-flash")]
    model: String,

    /// LLM temperature for extraction calls (0.0–2.0).
    #[arg(long, env = "DOC2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per extraction.
    #[arg(long, env = "DOC2JSON_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "DOC2JSON_EXTRACTION_PROMPT")]
    extraction_prompt: Option<PathBuf>,

    /// Bucket for uploaded images.
    #[arg(long, env = "S3_BUCKET")]
    s3_bucket: Option<String>,

    /// S3 access key id.
    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    s3_access_key: Option<String>,

    /// S3 secret access key.
    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    s3_secret_key: Option<String>,

    /// S3 region.
    #[arg(long, env = "S3_REGION")]
    s3_region: Option<String>,

    /// Custom S3-compatible endpoint URL.
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// MongoDB connection string.
    #[arg(long, env = "MONGO_URI", hide_env_values = true)]
    mongo_uri: Option<String>,

    /// MongoDB database name.
    #[arg(long, env = "MONGO_DB_NAME", default_value = edgequake_doc2json::config::DEFAULT_DATABASE)]
    mongo_db: String,

    /// MongoDB collection name.
    #[arg(long, env = "MONGO_COLLECTION_NAME", default_value = edgequake_doc2json::config::DEFAULT_COLLECTION)]
    mongo_collection: String,

    /// Listen address.
    #[arg(long, env = "DOC2JSON_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Static landing page served at `/`.
    #[arg(long, env = "DOC2JSON_LANDING_PAGE", default_value = "static/index.html")]
    landing_page: PathBuf,

    /// Maximum upload size in MiB.
    #[arg(long, env = "DOC2JSON_MAX_UPLOAD_MB", default_value_t = 16)]
    max_upload_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2JSON_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // edgequake-llm's ProviderFactory reads the key from the environment.
    // Exported while the process is still single-threaded.
    if let Some(key) = resolve_api_key(&cli) {
        export_api_key(&cli.provider, &key);
    }

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli).await?;

    // ── Open services ────────────────────────────────────────────────────
    let state = AppState::connect(&config)
        .await
        .context("Failed to start service")?;

    info!("doc2json {} starting", env!("CARGO_PKG_VERSION"));
    serve(config.bind_addr, state).await.context("Server failed")?;

    Ok(())
}

/// `--api-key` / `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
fn resolve_api_key(cli: &Cli) -> Option<String> {
    cli.api_key
        .clone()
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        .filter(|key| !key.is_empty())
}

/// Map CLI args to `ServiceConfig`.
async fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let extraction_prompt = if let Some(ref path) = cli.extraction_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read extraction prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let api_key = resolve_api_key(cli);

    let mut builder = ServiceConfig::builder()
        .provider_name(&cli.provider)
        .model(&cli.model)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .database(&cli.mongo_db)
        .collection(&cli.mongo_collection)
        .bind_addr(cli.bind)
        .landing_page(&cli.landing_page)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(prompt) = extraction_prompt {
        builder = builder.extraction_prompt(prompt);
    }
    if let Some(ref bucket) = cli.s3_bucket {
        builder = builder.bucket(bucket);
    }
    if let (Some(access), Some(secret)) = (&cli.s3_access_key, &cli.s3_secret_key) {
        builder = builder.s3_credentials(access, secret);
    }
    if let Some(ref region) = cli.s3_region {
        builder = builder.s3_region(region);
    }
    if let Some(ref endpoint) = cli.s3_endpoint {
        builder = builder.s3_endpoint(endpoint);
    }
    if let Some(ref uri) = cli.mongo_uri {
        builder = builder.mongo_uri(uri);
    }

    builder.build().context("Invalid configuration")
}

/// Environment variable the named provider reads its key from.
fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        _ => None,
    }
}

/// Set the key variable the named provider reads, unless already set.
///
/// Must run before the tokio runtime starts any worker threads.
fn export_api_key(provider: &str, key: &str) {
    let Some(var) = api_key_var(provider) else {
        return;
    };
    if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
        std::env::set_var(var, key);
    }
}
