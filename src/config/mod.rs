//! Configuration module for the gallery service
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Parse configuration from a YAML string, expanding `${VAR}` references
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        ConfigLoader::parse(content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.bucket cannot be empty".into(),
            ));
        }

        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid storage endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if let Some(ref base) = self.storage.public_base_url {
            if !is_valid_http_url(base) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid public_base_url '{}': must start with http:// or https://",
                    base
                )));
            }
        }

        // Only one of the pair is almost always a typo in the config
        if self.storage.access_key.is_some() != self.storage.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "storage.access_key and storage.secret_key must be set together".into(),
            ));
        }

        if self.storage.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_attempts must be at least 1".into(),
            ));
        }

        // Presigned URLs are limited to one week by SigV4
        if self.gallery.url_expiry_secs == 0 || self.gallery.url_expiry_secs > 604_800 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid gallery.url_expiry_secs {}: must be between 1 and 604800",
                self.gallery.url_expiry_secs
            )));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_upload_bytes must be greater than zero".into(),
            ));
        }

        if self.auth.enabled {
            match self.auth.jwt {
                Some(ref jwt) => match jwt.algorithm.to_uppercase().as_str() {
                    "HS256" | "RS256" | "ES256" => {
                        if jwt.secret.as_deref().map_or(true, |s| s.trim().is_empty()) {
                            return Err(ConfigError::ValidationError(
                                "auth.jwt.secret is required when auth is enabled".into(),
                            ));
                        }
                    }
                    alg => {
                        return Err(ConfigError::ValidationError(format!(
                            "Unsupported JWT algorithm '{}': must be HS256, RS256 or ES256",
                            alg
                        )))
                    }
                },
                None => {
                    return Err(ConfigError::ValidationError(
                        "auth.jwt must be configured when auth is enabled".into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Largest accepted upload body in bytes. Default: 25MB
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    26214400 // 25MB
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, RustFS, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use `{endpoint}/{bucket}/{key}` addressing. Defaults to true when a
    /// custom endpoint is set.
    #[serde(default)]
    pub force_path_style: Option<bool>,
    /// Base used to build the "last uploaded" location instead of the
    /// provider URL, e.g. a CDN in front of the bucket.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Total attempts per storage request, including the first. Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-operation timeout in seconds. Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StorageConfig {
    /// Whether requests use path-style addressing
    pub fn path_style(&self) -> bool {
        self.force_path_style.unwrap_or(self.endpoint.is_some())
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

/// Gallery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Validity of each signed gallery URL in seconds. Default: 60
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
    /// Follow continuation tokens when listing. When false only the first
    /// page of the listing is shown. Default: true
    #[serde(default = "default_paginate")]
    pub paginate: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            url_expiry_secs: default_url_expiry_secs(),
            paginate: default_paginate(),
        }
    }
}

fn default_url_expiry_secs() -> u64 {
    60
}

fn default_paginate() -> bool {
    true
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret (HS256) or PEM public key (RS256/ES256)
    pub secret: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics at `/metrics`. Default: true
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
