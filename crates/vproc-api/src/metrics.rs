//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vproc_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vproc_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vproc_http_requests_in_flight";

    // Queue metrics
    pub const QUEUE_LENGTH: &str = "vproc_queue_length";
    pub const QUEUE_DLQ_LENGTH: &str = "vproc_queue_dlq_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "vproc_jobs_enqueued_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update queue length gauge.
pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Update DLQ length gauge.
pub fn set_dlq_length(length: u64) {
    gauge!(names::QUEUE_DLQ_LENGTH).set(length as f64);
}

/// Record a job enqueued.
pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

/// Sanitize path for metrics labels (replace numeric ids).
fn sanitize_path(path: &str) -> String {
    regex_lite::Regex::new(r"/[0-9]+(/|$)")
        .unwrap()
        .replace_all(path, "/:id$1")
        .to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/api/videos/42/status"), "/api/videos/:id/status");
        assert_eq!(sanitize_path("/api/videos/42"), "/api/videos/:id");
        assert_eq!(sanitize_path("/api/videos/active"), "/api/videos/active");
    }
}
