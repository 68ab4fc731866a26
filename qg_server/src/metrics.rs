//! Prometheus metrics for quality-gate resolution observability.

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record one web-service request and its outcome (`ok`, `http_error`, `io_error`).
pub fn http_request(outcome: &str, duration_ms: u64) {
    counter!("qg_http_requests_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("qg_http_request_duration_ms").record(duration_ms as f64);
}

/// Record a finished resolution (`resolved` or an error kind).
pub fn resolution(outcome: &str) {
    counter!("qg_resolutions_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a per-task cache lookup (`hit` or `miss`).
pub fn cache_lookup(result: &str) {
    counter!("qg_cache_lookups_total", "result" => result.to_string()).increment(1);
}

/// Record a batch request (`guarded` or `walked`).
pub fn batch(result: &str) {
    counter!("qg_batches_total", "result" => result.to_string()).increment(1);
}

/// Record a webhook received event.
pub fn webhook_received(status: &str) {
    counter!("qg_webhooks_received_total", "status" => status.to_string()).increment(1);
}
