//! Session behaviour against an in-memory store
//!
//! Covers the upload lifecycle, the signed gallery, and the in-flight guard.

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::{session, GatedStore, MemoryStore};
use mockall::mock;
use s3_gallery::render::{render_page, EMPTY_GALLERY_TEXT};
use s3_gallery::s3::{ObjectListing, ObjectStore, PutObjectOutput, S3ClientError};
use s3_gallery::upload::{SelectedFile, UploadError, UploadOutcome, UploadStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Store {}

    #[async_trait]
    impl ObjectStore for Store {
        async fn put_object(
            &self,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> Result<PutObjectOutput, S3ClientError>;

        async fn list_objects(
            &self,
            continuation_token: Option<String>,
        ) -> Result<ObjectListing, S3ClientError>;

        async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, S3ClientError>;
    }
}

fn png(name: &str) -> SelectedFile {
    SelectedFile::new(name, "image/png", Bytes::from_static(b"\x89PNG\r\n\x1a\n"))
}

fn keys(session: &s3_gallery::Session) -> Vec<String> {
    session.gallery().into_iter().map(|e| e.key).collect()
}

// ============================================================================
// Upload lifecycle
// ============================================================================

#[tokio::test]
async fn test_successful_upload_sets_last_url_and_returns_to_idle() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());

    let outcome = session.submit(Some(png("cat.png"))).await.unwrap();

    match outcome {
        UploadOutcome::Uploaded {
            location,
            gallery_refreshed,
        } => {
            assert_eq!(
                location,
                "https://gallery-test-bucket.s3.test/cat.png"
            );
            assert!(gallery_refreshed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(session.status(), UploadStatus::Idle);
    assert_eq!(
        session.last_uploaded_url().as_deref(),
        Some("https://gallery-test-bucket.s3.test/cat.png")
    );

    let stored = store.get("cat.png").unwrap();
    assert_eq!(stored.content_type, "image/png");
    assert_eq!(&stored.body[..4], b"\x89PNG");
}

#[tokio::test]
async fn test_upload_uses_selected_file() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());

    session.select(vec![png("first.png"), png("second.png")]);
    assert_eq!(session.selected().unwrap().name, "first.png");

    session.upload().await.unwrap();

    assert!(store.get("first.png").is_some());
    assert!(store.get("second.png").is_none());
}

#[tokio::test]
async fn test_upload_without_file_is_noop() {
    let mut mock = MockStore::new();
    mock.expect_put_object().never();
    mock.expect_list_objects().never();
    mock.expect_presign_get().never();

    let session = session(Arc::new(mock));

    assert_eq!(session.upload().await.unwrap(), UploadOutcome::Skipped);
    assert_eq!(
        session.submit(None::<SelectedFile>).await.unwrap(),
        UploadOutcome::Skipped
    );
    assert_eq!(session.status(), UploadStatus::Idle);
    assert!(session.last_uploaded_url().is_none());
}

#[tokio::test]
async fn test_empty_selection_clears_previous_choice() {
    let session = session(Arc::new(MemoryStore::new()));

    session.select(Some(png("a.png")));
    assert!(session.selected().is_some());

    session.select(Vec::<SelectedFile>::new());
    assert!(session.selected().is_none());
}

#[tokio::test]
async fn test_put_receives_file_name_and_content_type() {
    let mut mock = MockStore::new();
    mock.expect_put_object()
        .withf(|key, body, content_type| {
            key == "c.png" && content_type == "image/png" && !body.is_empty()
        })
        .times(1)
        .returning(|key, _, _| {
            Ok(PutObjectOutput {
                location: format!("https://bucket.s3.test/{}", key),
                etag: None,
            })
        });
    mock.expect_list_objects().returning(|_| {
        Ok(ObjectListing {
            keys: vec!["c.png".into()],
            next_continuation_token: None,
        })
    });
    mock.expect_presign_get()
        .withf(|_, expires_in| *expires_in == Duration::from_secs(60))
        .returning(|key, _| Ok(format!("https://bucket.s3.test/{}?signed", key)));

    let session = session(Arc::new(mock));
    session.submit(Some(png("c.png"))).await.unwrap();

    assert_eq!(keys(&session), vec!["c.png"]);
}

#[tokio::test]
async fn test_failed_upload_returns_to_idle_and_keeps_last_url() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());

    session.submit(Some(png("ok.png"))).await.unwrap();
    let before = session.last_uploaded_url();
    let lists_before = store.list_count();

    store.set_fail_puts(true);
    let err = session.submit(Some(png("broken.png"))).await.unwrap_err();

    assert!(matches!(err, UploadError::Storage(_)));
    assert_eq!(session.status(), UploadStatus::Idle);
    assert_eq!(session.last_uploaded_url(), before);
    // No gallery refresh after a failed upload
    assert_eq!(store.list_count(), lists_before);
}

#[tokio::test]
async fn test_gallery_refresh_failure_after_upload_keeps_location() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());
    store.set_fail_lists(true);

    let outcome = session.submit(Some(png("late.png"))).await.unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Uploaded {
            location: "https://gallery-test-bucket.s3.test/late.png".into(),
            gallery_refreshed: false,
        }
    );
    assert!(session.last_uploaded_url().is_some());
    assert_eq!(session.status(), UploadStatus::Idle);
}

// ============================================================================
// Gallery
// ============================================================================

#[tokio::test]
async fn test_gallery_has_one_distinct_url_per_key_in_listing_order() {
    let store = Arc::new(MemoryStore::with_keys(&["c.jpg", "a.png", "b.gif"]));
    let session = session(store);

    let view = session.mount().await;

    let listed: Vec<&str> = view.gallery.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(listed, vec!["a.png", "b.gif", "c.jpg"]);

    let urls: HashSet<&str> = view.gallery.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls.len(), 3);
    assert!(view
        .gallery
        .iter()
        .all(|e| e.url.contains("X-Amz-Expires=60")));
}

#[tokio::test]
async fn test_gallery_entries_expire_after_sixty_seconds() {
    let session = session(Arc::new(MemoryStore::with_keys(&["a.png"])));

    let before = chrono::Utc::now();
    let view = session.mount().await;
    let after = chrono::Utc::now();

    let expires_at = view.gallery[0].expires_at;
    assert!(expires_at >= before + chrono::Duration::seconds(60));
    assert!(expires_at <= after + chrono::Duration::seconds(60));
}

#[tokio::test]
async fn test_empty_bucket_renders_fallback() {
    let session = session(Arc::new(MemoryStore::new()));

    let view = session.mount().await;
    assert!(view.gallery.is_empty());

    let html = render_page(&view, None);
    assert!(html.contains(EMPTY_GALLERY_TEXT));
    assert!(!html.contains("<div class=\"grid\">"));
}

#[tokio::test]
async fn test_overwrite_same_name_keeps_single_entry() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());

    session.submit(Some(png("same.png"))).await.unwrap();
    session
        .submit(Some(SelectedFile::new(
            "same.png",
            "image/png",
            Bytes::from_static(b"second version"),
        )))
        .await
        .unwrap();

    assert_eq!(keys(&session), vec!["same.png"]);
    assert_eq!(
        store.get("same.png").unwrap().body,
        Bytes::from_static(b"second version")
    );
}

#[tokio::test]
async fn test_upload_adds_to_existing_gallery() {
    let store = Arc::new(MemoryStore::with_keys(&["a.png", "b.png"]));
    let session = session(store);

    assert_eq!(session.mount().await.gallery.len(), 2);

    session.submit(Some(png("c.png"))).await.unwrap();

    assert_eq!(keys(&session), vec!["a.png", "b.png", "c.png"]);
}

#[tokio::test]
async fn test_gallery_follows_continuation_pages() {
    let store = MemoryStore {
        page_size: Some(2),
        ..MemoryStore::default()
    };
    for key in ["1.png", "2.png", "3.png", "4.png", "5.png"] {
        store.insert(key, Bytes::from_static(b"x"), "image/png");
    }
    let store = Arc::new(store);
    let session = session(store.clone());

    session.mount().await;

    assert_eq!(session.gallery().len(), 5);
    assert_eq!(store.list_count(), 3);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_gallery() {
    let store = Arc::new(MemoryStore::with_keys(&["a.png"]));
    let session = session(store.clone());
    session.mount().await;

    store.set_fail_lists(true);
    store.insert("b.png", Bytes::from_static(b"x"), "image/png");

    assert!(session.refresh_gallery().await.is_err());
    assert_eq!(keys(&session), vec!["a.png"]);
}

// ============================================================================
// Concurrency guard
// ============================================================================

#[tokio::test]
async fn test_concurrent_upload_is_rejected() {
    let store = Arc::new(GatedStore::new(MemoryStore::new()));
    let session = session(store.clone());

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(Some(png("first.png"))).await })
    };

    store.entered.notified().await;
    assert_eq!(session.status(), UploadStatus::InFlight);
    assert!(session.view().is_uploading());

    let second = session.submit(Some(png("second.png"))).await;
    assert!(matches!(second, Err(UploadError::AlreadyInFlight)));
    // The rejected call must not replace the running upload's selection
    assert_eq!(session.selected().unwrap().name, "first.png");

    store.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, UploadOutcome::Uploaded { .. }));

    assert_eq!(session.status(), UploadStatus::Idle);
    assert_eq!(keys(&session), vec!["first.png"]);
    assert!(store.inner.get("second.png").is_none());
}

#[tokio::test]
async fn test_dropped_upload_releases_guard() {
    let store = Arc::new(GatedStore::new(MemoryStore::new()));
    let session = session(store.clone());

    let task = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(Some(png("abandoned.png"))).await })
    };
    store.entered.notified().await;
    assert_eq!(session.status(), UploadStatus::InFlight);

    task.abort();
    let _ = task.await;

    assert_eq!(session.status(), UploadStatus::Idle);
}
