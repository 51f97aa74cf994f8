//! S3 Credentials Module
//!
//! Resolves the credentials the storage client signs with. Credentials only
//! ever live in the server process; nothing here is rendered to the page.
//!
//! Resolution order:
//!
//! 1. `storage.access_key` / `storage.secret_key` from the configuration file
//! 2. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 3. The AWS SDK default provider chain (profile, web identity, IMDS, ...)
//!
//! # Example
//!
//! ```
//! use s3_gallery::s3::CredentialsProvider;
//!
//! let creds = CredentialsProvider::from_parts("access-key", "secret-key", None);
//! assert_eq!(creds.access_key_id(), "access-key");
//! ```

use crate::config::StorageConfig;
use aws_credential_types::Credentials;
use thiserror::Error;

/// Provider name recorded on credentials built by this module
const PROVIDER_NAME: &str = "s3-gallery";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Where the storage client gets its credentials from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Static keys from the configuration file
    Config(Credentials),
    /// Static keys from the process environment
    Environment(Credentials),
    /// Defer to the SDK default chain
    DefaultChain,
}

impl CredentialSource {
    /// Static credentials, if this source has any
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            CredentialSource::Config(c) | CredentialSource::Environment(c) => Some(c),
            CredentialSource::DefaultChain => None,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            CredentialSource::Config(_) => "config",
            CredentialSource::Environment(_) => "environment",
            CredentialSource::DefaultChain => "default_chain",
        }
    }
}

/// Factory methods for credential sources
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Build static credentials
    pub fn from_parts(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Credentials {
        Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            PROVIDER_NAME,
        )
    }

    /// Load credentials from environment variables
    ///
    /// Looks for:
    /// - `AWS_ACCESS_KEY_ID`
    /// - `AWS_SECRET_ACCESS_KEY`
    /// - `AWS_SESSION_TOKEN` (optional)
    pub fn from_env() -> Result<Credentials, CredentialsError> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_ACCESS_KEY_ID not set".into())
        })?;

        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_SECRET_ACCESS_KEY not set".into())
        })?;

        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self::from_parts(access_key, secret_key, session_token))
    }

    /// Load credentials from the storage configuration
    pub fn from_config(config: &StorageConfig) -> Result<Credentials, CredentialsError> {
        let access_key = config.access_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("access_key not set in config".into())
        })?;

        let secret_key = config.secret_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("secret_key not set in config".into())
        })?;

        if access_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "access_key and secret_key cannot be empty".into(),
            ));
        }

        Ok(Self::from_parts(access_key.clone(), secret_key.clone(), None))
    }

    /// Pick a credential source following the resolution order
    pub fn resolve(config: &StorageConfig) -> Result<CredentialSource, CredentialsError> {
        if config.access_key.is_some() || config.secret_key.is_some() {
            return Self::from_config(config).map(CredentialSource::Config);
        }

        match Self::from_env() {
            Ok(creds) => Ok(CredentialSource::Environment(creds)),
            Err(_) => Ok(CredentialSource::DefaultChain),
        }
    }
}
