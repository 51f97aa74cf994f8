//! Upload module
//!
//! Sends the selected file to object storage and refreshes the gallery when
//! the upload lands. At most one upload runs at a time; a second call while
//! one is in flight is rejected rather than queued.
//!
//! ```text
//! Idle --(upload, file present)--> InFlight --(settle: success | failure)--> Idle
//! ```

use crate::gallery::Gallery;
use crate::metrics;
use crate::s3::{ObjectStore, S3ClientError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub mod selection;

pub use selection::{FileSelection, SelectedFile, SelectionError};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("An upload is already in progress")]
    AlreadyInFlight,

    #[error("Storage error: {0}")]
    Storage(#[from] S3ClientError),
}

/// Whether an upload is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Idle,
    InFlight,
}

impl UploadStatus {
    pub fn is_in_flight(self) -> bool {
        self == UploadStatus::InFlight
    }
}

/// What an upload call did
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// No file was selected; nothing happened
    Skipped,
    /// The object was stored
    Uploaded {
        location: String,
        /// Whether the follow-up gallery refresh succeeded
        gallery_refreshed: bool,
    },
}

/// Marks an upload as in flight for as long as it lives.
///
/// Dropping the guard returns the status to `Idle`, whether the upload
/// succeeded, failed, or its future was dropped mid-way.
pub struct InFlightGuard<'a> {
    status: &'a Mutex<UploadStatus>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.status.lock() = UploadStatus::Idle;
    }
}

/// Drives uploads and owns the "last uploaded" location
pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStore>,
    gallery: Arc<Gallery>,
    bucket: String,
    status: Mutex<UploadStatus>,
    last_uploaded_url: Mutex<Option<String>>,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, gallery: Arc<Gallery>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            gallery,
            bucket: bucket.into(),
            status: Mutex::new(UploadStatus::Idle),
            last_uploaded_url: Mutex::new(None),
        }
    }

    pub fn status(&self) -> UploadStatus {
        *self.status.lock()
    }

    /// Location of the most recent successful upload
    pub fn last_uploaded_url(&self) -> Option<String> {
        self.last_uploaded_url.lock().clone()
    }

    /// Move to `InFlight`, or fail if an upload is already running.
    ///
    /// Check and set happen under one lock so two callers cannot both win.
    pub fn try_begin(&self) -> Result<InFlightGuard<'_>, UploadError> {
        let mut status = self.status.lock();
        if status.is_in_flight() {
            metrics::record_upload_rejected(&self.bucket);
            return Err(UploadError::AlreadyInFlight);
        }
        *status = UploadStatus::InFlight;
        Ok(InFlightGuard {
            status: &self.status,
        })
    }

    /// Upload `file` if there is one.
    ///
    /// With no file this is a no-op: the status never changes and storage is
    /// not contacted.
    pub async fn upload(&self, file: Option<SelectedFile>) -> Result<UploadOutcome, UploadError> {
        let Some(file) = file else {
            tracing::debug!("Upload requested with no file selected");
            return Ok(UploadOutcome::Skipped);
        };

        let guard = self.try_begin()?;
        self.run(guard, file).await
    }

    /// Perform the upload while holding an in-flight guard.
    ///
    /// The object key is the file name as given, so a file with the same
    /// name replaces the stored object. Failures are logged and returned;
    /// the last uploaded location is left as it was.
    #[tracing::instrument(
        name = "upload.put",
        skip(self, _guard, file),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %file.name,
            upload.bytes = file.len(),
            http.content_type = %file.content_type
        )
    )]
    pub async fn run(
        &self,
        _guard: InFlightGuard<'_>,
        file: SelectedFile,
    ) -> Result<UploadOutcome, UploadError> {
        let bytes = file.len() as u64;
        let start_time = Instant::now();

        let result = self
            .store
            .put_object(&file.name, file.bytes, &file.content_type)
            .await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&self.bucket, duration.as_secs_f64());

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                metrics::record_upload_failure(&self.bucket);
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Error uploading file"
                );
                return Err(UploadError::Storage(e));
            }
        };

        metrics::record_upload_success(&self.bucket, bytes);
        tracing::info!(
            location = %output.location,
            etag = ?output.etag,
            duration_ms = duration.as_millis() as u64,
            "Upload completed"
        );

        *self.last_uploaded_url.lock() = Some(output.location.clone());

        // Refresh errors are logged by the gallery and do not fail the upload
        let gallery_refreshed = self.gallery.refresh().await.is_ok();

        Ok(UploadOutcome::Uploaded {
            location: output.location,
            gallery_refreshed,
        })
    }
}
