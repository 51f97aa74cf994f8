//! Shared test infrastructure
//!
//! - In-memory object store with S3-like overwrite and ordering semantics
//! - Store wrapper that holds uploads until released
//! - Configuration builders
//! - Test server management
//! - JWT token generation

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use s3_gallery::config::{
    AuthConfig, Config, GalleryConfig, JwtConfig, MetricsConfig, ServerConfig, StorageConfig,
};
use s3_gallery::s3::{ObjectListing, ObjectStore, PutObjectOutput, S3ClientError};
use s3_gallery::server::Server;
use s3_gallery::Session;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Test bucket name
pub const TEST_BUCKET: &str = "gallery-test-bucket";

/// JWT secret for test tokens
pub const JWT_SECRET: &str = "gallery-test-secret-key-for-jwt-tokens";

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Object store kept in memory.
///
/// Keys list in lexicographic order like S3, puts replace objects with the
/// same key, and `page_size` splits listings into continuation pages.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<String, StoredObject>>,
    pub page_size: Option<usize>,
    pub fail_puts: Mutex<bool>,
    pub fail_lists: Mutex<bool>,
    pub puts: AtomicUsize,
    pub lists: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: &[&str]) -> Self {
        let store = Self::new();
        for key in keys {
            store.insert(key, Bytes::from_static(b"seed"), "image/png");
        }
        store
    }

    pub fn insert(&self, key: &str, body: Bytes, content_type: &str) {
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(key).cloned()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        *self.fail_puts.lock() = fail;
    }

    pub fn set_fail_lists(&self, fail: bool) {
        *self.fail_lists.lock() = fail;
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, S3ClientError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_puts.lock() {
            return Err(S3ClientError::RequestError("connection refused".into()));
        }
        self.insert(key, body, content_type);
        Ok(PutObjectOutput {
            location: format!("https://{}.s3.test/{}", TEST_BUCKET, key),
            etag: Some("\"etag\"".into()),
        })
    }

    async fn list_objects(
        &self,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, S3ClientError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if *self.fail_lists.lock() {
            return Err(S3ClientError::RequestError("access denied".into()));
        }

        let keys: Vec<String> = self.objects.lock().keys().cloned().collect();
        let start = continuation_token
            .map(|t| t.parse::<usize>().expect("numeric token"))
            .unwrap_or(0);

        match self.page_size {
            Some(size) if start + size < keys.len() => Ok(ObjectListing {
                keys: keys[start..start + size].to_vec(),
                next_continuation_token: Some((start + size).to_string()),
            }),
            _ => Ok(ObjectListing {
                keys: keys[start.min(keys.len())..].to_vec(),
                next_continuation_token: None,
            }),
        }
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, S3ClientError> {
        Ok(format!(
            "https://{}.s3.test/{}?X-Amz-Expires={}&X-Amz-Signature=sig",
            TEST_BUCKET,
            key,
            expires_in.as_secs()
        ))
    }
}

/// Store whose puts block until released
pub struct GatedStore {
    pub inner: MemoryStore,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for GatedStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, S3ClientError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.put_object(key, body, content_type).await
    }

    async fn list_objects(
        &self,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, S3ClientError> {
        self.inner.list_objects(continuation_token).await
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, S3ClientError> {
        self.inner.presign_get(key, expires_in).await
    }
}

/// Session over a store with default gallery settings
pub fn session(store: Arc<dyn ObjectStore>) -> Arc<Session> {
    Arc::new(Session::new(store, TEST_BUCKET, &GalleryConfig::default()))
}

/// Base configuration bound to an OS-assigned port
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            max_upload_bytes: 1024 * 1024,
        },
        storage: StorageConfig {
            bucket: TEST_BUCKET.into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: Some("test-access".into()),
            secret_key: Some("test-secret".into()),
            force_path_style: None,
            public_base_url: None,
            max_attempts: 1,
            timeout_secs: 5,
        },
        gallery: GalleryConfig::default(),
        auth: AuthConfig::default(),
        metrics: MetricsConfig::default(),
    }
}

/// Configuration with JWT auth enabled
pub fn auth_config() -> Config {
    let mut config = test_config();
    config.auth = AuthConfig {
        enabled: true,
        jwt: Some(JwtConfig {
            secret: Some(JWT_SECRET.into()),
            algorithm: "HS256".into(),
            issuer: None,
            audience: None,
        }),
    };
    config
}

/// Running server plus an HTTP client
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: Config, session: Arc<Session>) -> Self {
        let server = Server::bind(config, session).await.unwrap();
        let addr = server.local_addr();

        let handle = tokio::spawn(async move {
            let _ = server.run_until(std::future::pending()).await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            client,
            _handle: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Generate a valid JWT token for testing
pub fn generate_test_jwt(subject: &str, expires_in_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: i64,
    }

    let claims = Claims {
        sub: subject,
        exp: chrono::Utc::now().timestamp() + expires_in_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
