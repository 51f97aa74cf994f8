//! S3 Client module
//!
//! The gallery talks to object storage through the [`ObjectStore`] trait. The
//! production implementation, [`S3Client`], wraps the AWS SDK and is built
//! from an explicit [`StorageConfig`] value rather than ambient global state.
//!
//! # Example
//!
//! ```no_run
//! use s3_gallery::config::Config;
//! use s3_gallery::s3::{ObjectStore, S3Client};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let client = S3Client::new(&config.storage).await?;
//!
//! let body = Bytes::from_static(b"\x89PNG...");
//! let output = client.put_object("cat.png", body, "image/png").await?;
//! println!("Stored at {}", output.location);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, content_type, etag |
//! | ListObjectsV2 | `s3.list_objects_v2` | bucket, continued, keys, truncated |
//! | Presign GetObject | `s3.presign_get_object` | bucket, key, expires_in_secs |

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use thiserror::Error;

mod credentials;

pub use credentials::{CredentialSource, CredentialsError, CredentialsProvider};

/// Characters escaped when an object key is placed in a URL path.
/// `/` is kept so nested keys read naturally.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Credentials error: {0}")]
    CredentialsError(#[from] CredentialsError),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Signing error: {0}")]
    SigningError(String),
}

/// Result of a successful PutObject
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectOutput {
    /// Public location of the stored object
    pub location: String,
    pub etag: Option<String>,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectListing {
    /// Keys in the order the provider returned them
    pub keys: Vec<String>,
    /// Token for the next page, present only when the listing was truncated
    pub next_continuation_token: Option<String>,
}

/// Object storage operations used by the gallery
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object with that key
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, S3ClientError>;

    /// List one page of keys in the bucket
    async fn list_objects(
        &self,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, S3ClientError>;

    /// Generate a signed read URL for `key` valid for `expires_in`
    async fn presign_get(&self, key: &str, expires_in: Duration)
        -> Result<String, S3ClientError>;
}

/// S3 client backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    path_style: bool,
    public_base_url: Option<String>,
}

impl S3Client {
    /// Create a new S3 client from storage configuration
    pub async fn new(config: &StorageConfig) -> Result<Self, S3ClientError> {
        let source = CredentialsProvider::resolve(config)?;

        let retry_config = RetryConfig::standard()
            .with_max_attempts(config.max_attempts)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(creds) = source.credentials() {
            loader = loader.credentials_provider(creds.clone());
        }

        let sdk_config = loader.load().await;

        let path_style = config.path_style();
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(path_style)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired);

        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint.trim_end_matches('/'));
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            path_style,
            credentials = source.label(),
            "Initialized S3 client"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            path_style,
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    /// Public, unsigned location of an object.
    ///
    /// Mirrors the `Location` S3 reports for uploads: virtual-hosted style on
    /// AWS, `{endpoint}/{bucket}/{key}` with path-style addressing, or the
    /// configured public base URL when one is set.
    pub fn object_url(&self, key: &str) -> String {
        let encoded = utf8_percent_encode(key, KEY_ENCODE_SET);

        if let Some(ref base) = self.public_base_url {
            return format!("{}/{}", base, encoded);
        }

        if self.path_style {
            return format!("{}/{}/{}", self.endpoint(), self.bucket, encoded);
        }

        match self.endpoint {
            Some(ref endpoint) => match endpoint.split_once("://") {
                Some((scheme, host)) => format!("{}://{}.{}/{}", scheme, self.bucket, host, encoded),
                None => format!("{}/{}/{}", endpoint, self.bucket, encoded),
            },
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, encoded
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            upload.bytes = body.len(),
            http.content_type = %content_type,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, S3ClientError> {
        let bytes = body.len();

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(bytes as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        tracing::debug!(bytes, "PutObject completed");

        Ok(PutObjectOutput {
            location: self.object_url(key),
            etag,
        })
    }

    #[tracing::instrument(
        name = "s3.list_objects_v2",
        skip(self, continuation_token),
        fields(
            s3.bucket = %self.bucket,
            s3.continued = continuation_token.is_some(),
            s3.keys = tracing::field::Empty,
            s3.truncated = tracing::field::Empty
        ),
        err
    )]
    async fn list_objects(
        &self,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, S3ClientError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let keys: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        let truncated = output.is_truncated().unwrap_or(false);
        let next_continuation_token = if truncated {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        let span = tracing::Span::current();
        span.record("s3.keys", keys.len());
        span.record("s3.truncated", truncated);

        Ok(ObjectListing {
            keys,
            next_continuation_token,
        })
    }

    #[tracing::instrument(
        name = "s3.presign_get_object",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            expires_in_secs = expires_in.as_secs()
        ),
        err
    )]
    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, S3ClientError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| S3ClientError::SigningError(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }
}
