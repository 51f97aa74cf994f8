//! JWT Authentication
//!
//! Supports HS256, RS256 and ES256. Tokens are read from the
//! `Authorization: Bearer` header first, then the `token` query parameter so
//! a plain browser navigation to `/?token=...` works.

use super::{AuthError, AuthRequest, AuthResult, Authenticator};
use crate::config::JwtConfig;
use crate::metrics;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// JWT Authenticator
///
/// # Example
///
/// ```
/// use s3_gallery::auth::jwt::JwtAuthenticator;
///
/// let auth = JwtAuthenticator::new_hs256("my-secret")
///     .with_issuer("https://auth.example.com")
///     .with_audience("gallery");
/// ```
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator with a secret key (HS256)
    pub fn new_hs256(secret: &str) -> Self {
        Self::with_key(
            DecodingKey::from_secret(secret.as_bytes()),
            Algorithm::HS256,
        )
    }

    /// Create a new JWT authenticator with an RSA public key (RS256)
    pub fn new_rs256(public_key_pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    /// Create a new JWT authenticator with an EC public key (ES256)
    pub fn new_es256(public_key_pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_ec_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self::with_key(key, Algorithm::ES256))
    }

    fn with_key(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.validate_aud = false; // Only validate aud when explicitly set

        Self {
            decoding_key,
            validation,
        }
    }

    /// Build an authenticator from configuration
    pub fn from_config(config: &JwtConfig) -> Result<Self, AuthError> {
        let secret = config
            .secret
            .as_deref()
            .ok_or_else(|| AuthError::InvalidKey("no JWT secret configured".into()))?;

        let mut auth = match config.algorithm.to_uppercase().as_str() {
            "HS256" => Self::new_hs256(secret),
            "RS256" => Self::new_rs256(secret)?,
            "ES256" => Self::new_es256(secret)?,
            alg => {
                return Err(AuthError::InvalidKey(format!(
                    "unsupported JWT algorithm: {}",
                    alg
                )))
            }
        };

        if let Some(ref issuer) = config.issuer {
            auth = auth.with_issuer(issuer);
        }
        if let Some(ref audience) = config.audience {
            auth = auth.with_audience(audience);
        }

        Ok(auth)
    }

    /// Set the required issuer (`iss` claim)
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Set the required audience (`aud` claim)
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Extract token from request
    fn extract_token(request: &AuthRequest) -> Option<&str> {
        if let Some(token) = request
            .headers
            .get("authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "))
        {
            return Some(token.trim());
        }

        request
            .query
            .as_deref()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResult, AuthError> {
        let token = match Self::extract_token(request) {
            Some(token) => token,
            None => {
                metrics::record_auth_attempt("jwt", false);
                return Err(AuthError::MissingAuth);
            }
        };

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                metrics::record_auth_attempt("jwt", false);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })?;

        let mut claims = std::collections::HashMap::new();
        if let Some(iss) = &token_data.claims.iss {
            claims.insert("iss".into(), serde_json::Value::String(iss.clone()));
        }
        if let Some(aud) = &token_data.claims.aud {
            claims.insert("aud".into(), serde_json::Value::String(aud.clone()));
        }

        metrics::record_auth_attempt("jwt", true);
        tracing::debug!(subject = %token_data.claims.sub, "JWT authentication successful");

        Ok(AuthResult {
            subject: token_data.claims.sub,
            claims,
        })
    }
}
