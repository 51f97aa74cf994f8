//! Authentication module
//!
//! Guards the page and its API with JWT bearer tokens. Storage credentials
//! stay on the server; callers only ever present a short-lived token.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub mod jwt;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Authentication result containing claims
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub subject: String,
    pub claims: HashMap<String, serde_json::Value>,
}

/// Authenticator trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResult, AuthError>;
}

/// Authentication request context
#[derive(Debug, Default)]
pub struct AuthRequest {
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub query: Option<String>,
    pub method: String,
    pub path: String,
}

impl AuthRequest {
    /// Build from any HTTP request's parts
    pub fn from_parts<B>(req: &hyper::Request<B>) -> Self {
        let headers = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        Self {
            headers,
            query: req.uri().query().map(str::to_string),
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
        }
    }
}
