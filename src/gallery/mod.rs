//! Gallery module
//!
//! Lists the bucket and turns every key into a signed, expiring read URL.
//! The gallery is replaced wholesale on each successful refresh and left
//! untouched when a refresh fails.

use crate::config::GalleryConfig;
use crate::metrics;
use crate::s3::{ObjectStore, S3ClientError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Gallery errors
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Failed to list objects: {0}")]
    ListFailed(#[source] S3ClientError),

    #[error("Failed to sign URL for '{key}': {source}")]
    SignFailed {
        key: String,
        #[source]
        source: S3ClientError,
    },
}

/// One signed image URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryEntry {
    pub key: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Builds gallery entries from the object store
pub struct GalleryFetcher {
    store: Arc<dyn ObjectStore>,
    expiry: Duration,
    paginate: bool,
}

impl GalleryFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, config: &GalleryConfig) -> Self {
        Self {
            store,
            expiry: Duration::from_secs(config.url_expiry_secs),
            paginate: config.paginate,
        }
    }

    /// Validity of each generated URL
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// List object keys in provider order.
    ///
    /// Follows continuation tokens when pagination is enabled; otherwise only
    /// the first page is returned.
    pub async fn list_keys(&self) -> Result<Vec<String>, GalleryError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page = self
                .store
                .list_objects(token.clone())
                .await
                .map_err(GalleryError::ListFailed)?;

            keys.extend(page.keys);

            match page.next_continuation_token {
                Some(next) if self.paginate => {
                    // Any token seen before means the provider is cycling
                    if !seen_tokens.insert(next.clone()) {
                        tracing::warn!(token = %next, "Listing returned a repeated continuation token");
                        break;
                    }
                    token = Some(next);
                }
                Some(_) => {
                    tracing::debug!(keys = keys.len(), "Listing truncated, pagination disabled");
                    break;
                }
                None => break,
            }
        }

        Ok(keys)
    }

    /// List the bucket and sign a read URL for every key, one at a time.
    #[tracing::instrument(
        name = "gallery.fetch",
        skip(self),
        fields(gallery.entries = tracing::field::Empty)
    )]
    pub async fn fetch(&self) -> Result<Vec<GalleryEntry>, GalleryError> {
        let keys = self.list_keys().await?;
        let mut entries = Vec::with_capacity(keys.len());

        for key in keys {
            let issued_at = Utc::now();
            let url = match self.store.presign_get(&key, self.expiry).await {
                Ok(url) => url,
                Err(source) => return Err(GalleryError::SignFailed { key, source }),
            };

            entries.push(GalleryEntry {
                key,
                url,
                expires_at: issued_at
                    + chrono::Duration::from_std(self.expiry)
                        .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            });
        }

        tracing::Span::current().record("gallery.entries", entries.len());
        Ok(entries)
    }
}

/// Gallery state: the current list of signed URLs
pub struct Gallery {
    fetcher: GalleryFetcher,
    bucket: String,
    next_generation: AtomicU64,
    current: Mutex<Listing>,
}

/// Entries together with the generation of the refresh that produced them
#[derive(Default)]
struct Listing {
    generation: u64,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new(fetcher: GalleryFetcher, bucket: impl Into<String>) -> Self {
        Self {
            fetcher,
            bucket: bucket.into(),
            next_generation: AtomicU64::new(1),
            current: Mutex::new(Listing::default()),
        }
    }

    /// Re-fetch the gallery.
    ///
    /// On success the entries are replaced and their count returned. On
    /// failure the error is logged, the previous entries stay in place and
    /// the error is handed back for callers that care.
    ///
    /// Refreshes are numbered when they start. A refresh that finishes after
    /// a later-started one has already been applied is discarded, so an
    /// older listing never overwrites a newer one.
    pub async fn refresh(&self) -> Result<usize, GalleryError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        match self.fetcher.fetch().await {
            Ok(entries) => {
                let count = entries.len();
                {
                    let mut current = self.current.lock();
                    if generation < current.generation {
                        tracing::debug!(
                            bucket = %self.bucket,
                            generation,
                            applied = current.generation,
                            "Discarding stale gallery listing"
                        );
                        return Ok(current.entries.len());
                    }
                    *current = Listing {
                        generation,
                        entries,
                    };
                }
                metrics::record_gallery_refresh(&self.bucket, true, count);
                tracing::info!(bucket = %self.bucket, entries = count, "Gallery refreshed");
                Ok(count)
            }
            Err(e) => {
                metrics::record_gallery_refresh(&self.bucket, false, 0);
                tracing::error!(bucket = %self.bucket, error = %e, "Error fetching image list");
                Err(e)
            }
        }
    }

    /// Snapshot of the current entries
    pub fn entries(&self) -> Vec<GalleryEntry> {
        self.current.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.current.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.lock().entries.is_empty()
    }
}
