//! Blob storage: where uploaded document images live.
//!
//! The stored object is the canonical copy of an upload. The extractor writes
//! it, reads it back and only then sends it to the model, so the URL returned
//! to the caller always points at exactly the bytes that were analysed.

use crate::config::BlobStoreConfig;
use crate::error::Doc2JsonError;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

/// Region used when neither config nor the AWS environment names one.
const FALLBACK_REGION: &str = "us-east-1";

/// Named byte storage with a predictable public URL per key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, returning the object's public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, Doc2JsonError>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, Doc2JsonError>;

    /// Public URL of `key`, whether or not it exists yet.
    fn public_url(&self, key: &str) -> String;
}

/// [`BlobStore`] over Amazon S3 or any S3-compatible endpoint.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    endpoint: Option<String>,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            endpoint,
        }
    }

    /// Build a client from config, or `None` when no bucket is configured.
    ///
    /// Explicit keys win over the default AWS credential chain. A custom
    /// endpoint switches to path-style addressing.
    pub async fn connect(config: &BlobStoreConfig) -> Option<Self> {
        let bucket = config.bucket.clone()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(ref region) = config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access), Some(secret)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "doc2json-config",
            ));
        }
        let shared = loader.load().await;

        let mut s3 = aws_sdk_s3::config::Builder::from(&shared);
        if shared.region().is_none() {
            s3 = s3.region(Region::new(FALLBACK_REGION));
        }
        if let Some(ref endpoint) = config.endpoint {
            s3 = s3.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        info!("Blob storage: bucket '{}'", bucket);
        Some(Self::new(
            Client::from_conf(s3.build()),
            bucket,
            config.endpoint.clone(),
        ))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, Doc2JsonError> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| Doc2JsonError::UploadFailed {
                key: key.to_string(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;
        debug!("Stored {} bytes as s3://{}/{}", len, self.bucket, key);
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Doc2JsonError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Doc2JsonError::DownloadFailed {
                key: key.to_string(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| Doc2JsonError::DownloadFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;
        Ok(data.into_bytes().to_vec())
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.bucket, self.endpoint.as_deref(), key)
    }
}

/// Virtual-hosted AWS URL, or `{endpoint}/{bucket}/{key}` for custom endpoints.
pub fn object_url(bucket: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_url_is_virtual_hosted() {
        assert_eq!(
            object_url("ids", None, "card.png"),
            "https://ids.s3.amazonaws.com/card.png"
        );
    }

    #[test]
    fn custom_endpoint_url_is_path_style() {
        assert_eq!(
            object_url("ids", Some("http://localhost:9000/"), "card.png"),
            "http://localhost:9000/ids/card.png"
        );
    }

    #[tokio::test]
    async fn connect_without_bucket_is_none() {
        let config = BlobStoreConfig::default();
        assert!(S3BlobStore::connect(&config).await.is_none());
    }
}
