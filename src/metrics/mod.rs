//! Metrics module
//!
//! Prometheus metrics for uploads and gallery refreshes, exposed in text
//! format at `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "gallery_uploads_total",
        "Total number of uploads",
        &["bucket", "status"]  // "success", "failure" or "rejected"
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "gallery_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "gallery_upload_duration_seconds",
        "Upload duration in seconds",
        &["bucket"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();

    // Gallery metrics
    pub static ref GALLERY_REFRESHES: CounterVec = register_counter_vec!(
        "gallery_refreshes_total",
        "Gallery refreshes by outcome",
        &["bucket", "status"]
    ).unwrap();

    pub static ref SIGNED_URLS_TOTAL: Counter = register_counter!(
        "gallery_signed_urls_total",
        "Signed read URLs generated for the gallery"
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "gallery_auth_attempts_total",
        "Authentication attempts",
        &["method", "status"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record an upload turned away because another was in flight
pub fn record_upload_rejected(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "rejected"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket])
        .observe(duration_secs);
}

/// Record the outcome of a gallery refresh
pub fn record_gallery_refresh(bucket: &str, success: bool, signed_urls: usize) {
    let status = if success { "success" } else { "failure" };
    GALLERY_REFRESHES.with_label_values(&[bucket, status]).inc();
    SIGNED_URLS_TOTAL.inc_by(signed_urls as f64);
}

/// Record authentication attempt
pub fn record_auth_attempt(method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[method, status]).inc();
}

/// Encode every registered metric in Prometheus text format.
///
/// Returns the body and its content type.
pub fn encode_text() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
