//! HTTP server module
//!
//! Built directly on `hyper` and `tokio`: one task per connection, HTTP/1.1,
//! graceful stop on Ctrl-C. The server owns the storage client through the
//! shared [`Session`]; the page only ever talks to this server.
//!
//! # Example
//!
//! ```no_run
//! use s3_gallery::{config::Config, server::Server};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let server = Server::from_config(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::jwt::JwtAuthenticator;
use crate::auth::Authenticator;
use crate::config::Config;
use crate::s3::S3Client;
use crate::session::Session;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

mod handlers;

pub use handlers::handle_request;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// State shared by every connection
pub struct AppState {
    pub config: Config,
    pub session: Arc<Session>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

impl AppState {
    /// Build state, constructing the authenticator when auth is enabled.
    ///
    /// Fails closed: auth enabled without a usable JWT configuration is an
    /// error rather than an open server.
    pub fn new(config: Config, session: Arc<Session>) -> Result<Self, ServerError> {
        let authenticator: Option<Arc<dyn Authenticator>> = if config.auth.enabled {
            let jwt = config.auth.jwt.as_ref().ok_or_else(|| {
                ServerError::ConfigError("auth enabled but no JWT configuration".into())
            })?;
            let auth = JwtAuthenticator::from_config(jwt)
                .map_err(|e| ServerError::ConfigError(e.to_string()))?;
            Some(Arc::new(auth))
        } else {
            None
        };

        Ok(Self {
            config,
            session,
            authenticator,
        })
    }
}

/// HTTP Server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Build the S3 client and session from configuration, then bind
    pub async fn from_config(config: Config) -> Result<Self, ServerError> {
        let client = S3Client::new(&config.storage)
            .await
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let session = Arc::new(Session::new(
            Arc::new(client),
            config.storage.bucket.clone(),
            &config.gallery,
        ));

        Self::bind(config, session).await
    }

    /// Bind to the configured address with an existing session.
    ///
    /// Port 0 lets the OS pick; see [`Server::local_addr`].
    pub async fn bind(config: Config, session: Arc<Session>) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        let state = Arc::new(AppState::new(config, session)?);

        info!(
            address = %local_addr,
            auth = state.authenticator.is_some(),
            metrics = state.config.metrics.enabled,
            "Server bound"
        );

        Ok(Self {
            state,
            listener,
            local_addr,
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(shutdown).await
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Connection errors are logged and never stop the accept loop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Starting server on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}
