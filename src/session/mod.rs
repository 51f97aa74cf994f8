//! UI session state
//!
//! Ties file selection, uploads and the gallery together behind one shared
//! value. The HTTP layer holds a single `Arc<Session>`; everything that would
//! live in browser state in a client-only app lives here instead, next to the
//! storage credentials.

use crate::config::GalleryConfig;
use crate::gallery::{Gallery, GalleryEntry, GalleryError, GalleryFetcher};
use crate::s3::ObjectStore;
use crate::upload::{
    FileSelection, SelectedFile, UploadError, UploadOrchestrator, UploadOutcome, UploadStatus,
};
use serde::Serialize;
use std::sync::Arc;

/// Read-only snapshot used for rendering and JSON responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: UploadStatus,
    pub last_uploaded_url: Option<String>,
    pub gallery: Vec<GalleryEntry>,
}

impl SessionView {
    pub fn is_uploading(&self) -> bool {
        self.status.is_in_flight()
    }
}

/// The gallery page's state
pub struct Session {
    selection: FileSelection,
    uploads: UploadOrchestrator,
    gallery: Arc<Gallery>,
}

impl Session {
    /// Build a session over an already configured store.
    ///
    /// `bucket` is only used to label logs and metrics.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, config: &GalleryConfig) -> Self {
        let bucket = bucket.into();
        let gallery = Arc::new(Gallery::new(
            GalleryFetcher::new(store.clone(), config),
            bucket.clone(),
        ));

        Self {
            selection: FileSelection::new(),
            uploads: UploadOrchestrator::new(store, gallery.clone(), bucket),
            gallery,
        }
    }

    /// Page load: refresh the gallery and return the state to render.
    ///
    /// A failed refresh is already logged; the stale gallery is rendered.
    pub async fn mount(&self) -> SessionView {
        let _ = self.gallery.refresh().await;
        self.view()
    }

    /// Handle a file-selection event
    pub fn select<I>(&self, files: I) -> Option<SelectedFile>
    where
        I: IntoIterator<Item = SelectedFile>,
    {
        self.selection.select(files)
    }

    pub fn selected(&self) -> Option<SelectedFile> {
        self.selection.current()
    }

    /// Upload the currently selected file
    pub async fn upload(&self) -> Result<UploadOutcome, UploadError> {
        self.uploads.upload(self.selection.current()).await
    }

    /// Select and upload in one step.
    ///
    /// The in-flight guard is taken before the selection changes, so a
    /// rejected call leaves the running upload's selection alone and two
    /// requests cannot swap files under each other.
    pub async fn submit<I>(&self, files: I) -> Result<UploadOutcome, UploadError>
    where
        I: IntoIterator<Item = SelectedFile>,
    {
        let Some(file) = files.into_iter().next() else {
            self.selection.select(None::<SelectedFile>);
            return Ok(UploadOutcome::Skipped);
        };

        let guard = self.uploads.try_begin()?;
        self.selection.select(Some(file.clone()));
        self.uploads.run(guard, file).await
    }

    /// Re-fetch the gallery
    pub async fn refresh_gallery(&self) -> Result<usize, GalleryError> {
        self.gallery.refresh().await
    }

    pub fn status(&self) -> UploadStatus {
        self.uploads.status()
    }

    pub fn last_uploaded_url(&self) -> Option<String> {
        self.uploads.last_uploaded_url()
    }

    pub fn gallery(&self) -> Vec<GalleryEntry> {
        self.gallery.entries()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.uploads.status(),
            last_uploaded_url: self.uploads.last_uploaded_url(),
            gallery: self.gallery.entries(),
        }
    }
}
