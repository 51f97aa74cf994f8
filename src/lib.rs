//! S3 Gallery Library
//!
//! Upload images to an S3 bucket and browse them through short-lived signed
//! URLs, from a single web page served by this crate.
//!
//! # Features
//!
//! - **Server-side credentials**: storage keys never leave the server
//! - **Signed gallery**: every listed object gets an expiring read URL
//! - **One upload at a time**: concurrent uploads are rejected, not raced
//! - **S3 Compatible**: AWS, MinIO, RustFS and other S3 endpoints
//! - **Optional JWT auth** for the page and its API
//!
//! # Example
//!
//! ```no_run
//! use s3_gallery::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::from_config(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod gallery;
pub mod metrics;
pub mod render;
pub mod router;
pub mod s3;
pub mod server;
pub mod session;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use session::{Session, SessionView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
