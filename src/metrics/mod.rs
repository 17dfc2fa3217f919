//! Metrics module
//!
//! Provides Prometheus counters for built requests and handled uploads.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder,
};

lazy_static! {
    // Request builder metrics
    pub static ref REQUESTS_BUILT_TOTAL: Counter = register_counter!(
        "party_requests_built_total",
        "Total number of multipart bodies built"
    ).unwrap();

    pub static ref REQUEST_BYTES_TOTAL: Counter = register_counter!(
        "party_request_bytes_total",
        "Total bytes of multipart bodies built"
    ).unwrap();

    // Upload handler metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "party_uploads_total",
        "Total number of handled uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "party_upload_bytes_total",
        "Total bytes of extracted files"
    ).unwrap();

    pub static ref UPLOADS_REJECTED_TOTAL: CounterVec = register_counter_vec!(
        "party_uploads_rejected_total",
        "Rejected uploads by reason",
        &["reason"]
    ).unwrap();
}

/// Record a built request body
pub fn record_request_built(bytes: u64) {
    REQUESTS_BUILT_TOTAL.inc();
    REQUEST_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a successfully extracted upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a rejected upload
pub fn record_upload_rejected(reason: &str) {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
    UPLOADS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

/// Render all registered metrics in the Prometheus text format
///
/// Returns the encoded body and its content type.
pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
