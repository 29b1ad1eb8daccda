//! Configuration types for the extraction service.
//!
//! Every knob lives in [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests build configs directly.

use crate::error::Doc2JsonError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "doc2json";

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "extracted_documents";

/// Prompt used by `/stream` when the query string has none.
pub const DEFAULT_STREAM_PROMPT: &str = "Tell me a story";

/// Configuration for the extraction service.
///
/// # Example
/// ```rust
/// use edgequake_doc2json::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .api_key("test-key")
///     .model("gemini-2.0-flash")
///     .bucket("id-uploads")
///     .build()
///     .unwrap();
/// assert_eq!(config.document_store.database, "doc2json");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// LLM provider name passed to `ProviderFactory`. Default: "gemini".
    pub provider_name: String,

    /// LLM model identifier. Default: "gemini-2.0-flash".
    pub model: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Model API key. Required unless `provider` is set.
    pub api_key: Option<String>,

    /// Sampling temperature for extraction calls. Default: 0.1.
    ///
    /// Extraction is transcription: low temperature keeps the model faithful
    /// to what is printed on the card.
    pub temperature: f32,

    /// Maximum tokens generated per extraction call. Default: 2048.
    pub max_tokens: usize,

    /// Custom extraction prompt. If None, uses the schema-derived default.
    pub extraction_prompt: Option<String>,

    /// Prompt used by `/stream` when the caller supplies none.
    pub default_stream_prompt: String,

    /// Where uploaded images are stored.
    pub blob_store: BlobStoreConfig,

    /// Where extracted records are persisted.
    pub document_store: DocumentStoreConfig,

    /// Listen address. Default: 0.0.0.0:5000.
    pub bind_addr: SocketAddr,

    /// Static landing page served at `/`. Default: "static/index.html".
    pub landing_page: PathBuf,

    /// Maximum accepted request body for uploads, in bytes. Default: 16 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider_name: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            provider: None,
            api_key: None,
            temperature: 0.1,
            max_tokens: 2048,
            extraction_prompt: None,
            default_stream_prompt: DEFAULT_STREAM_PROMPT.to_string(),
            blob_store: BlobStoreConfig::default(),
            document_store: DocumentStoreConfig::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            landing_page: PathBuf::from("static/index.html"),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("blob_store", &self.blob_store)
            .field("document_store", &self.document_store)
            .field("bind_addr", &self.bind_addr)
            .field("landing_page", &self.landing_page)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// S3 bucket and credentials.
#[derive(Clone, Default)]
pub struct BlobStoreConfig {
    /// Bucket name. Uploads fail with `StorageNotConfigured` when unset.
    pub bucket: Option<String>,
    /// Access key id. Falls back to the default AWS credential chain.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Region. Falls back to the AWS environment, then "us-east-1".
    pub region: Option<String>,
    /// Custom S3-compatible endpoint (MinIO, R2, …).
    pub endpoint: Option<String>,
}

impl fmt::Debug for BlobStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStoreConfig")
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// MongoDB connection and target collection.
#[derive(Clone)]
pub struct DocumentStoreConfig {
    /// Connection string. Persistence is disabled when unset.
    pub uri: Option<String>,
    pub database: String,
    pub collection: String,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl fmt::Debug for DocumentStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Connection strings commonly embed credentials.
        f.debug_struct("DocumentStoreConfig")
            .field("uri", &self.uri.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn default_stream_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.default_stream_prompt = prompt.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.blob_store.bucket = Some(bucket.into());
        self
    }

    pub fn s3_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.blob_store.access_key = Some(access_key.into());
        self.config.blob_store.secret_key = Some(secret_key.into());
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.config.blob_store.region = Some(region.into());
        self
    }

    pub fn s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.blob_store.endpoint = Some(endpoint.into());
        self
    }

    pub fn mongo_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.document_store.uri = Some(uri.into());
        self
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.config.document_store.database = name.into();
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.document_store.collection = name.into();
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn landing_page(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.landing_page = path.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Doc2JsonError> {
        let c = &self.config;
        let has_key = c.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if c.provider.is_none() && !has_key {
            return Err(Doc2JsonError::ProviderNotConfigured {
                provider: c.provider_name.clone(),
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) to the model API key.".into(),
            });
        }
        if c.max_upload_bytes == 0 {
            return Err(Doc2JsonError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Doc2JsonError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
