use std::time::Duration;

use metrics::{counter, histogram};

use crate::download::AccessDecision;

/// Bucket HTTP status codes to control cardinality
pub fn bucket_status_code(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let status_bucket = bucket_status_code(status_code);

    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_bucket
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_access_decision(decision: AccessDecision) {
    counter!("file_proxy_access_decisions_total", "decision" => decision.as_str()).increment(1);
}

/// `service` is a fixed name (`graph`, `dataverse`, `token`).
pub fn record_upstream_error(service: &'static str) {
    counter!("file_proxy_upstream_errors_total", "service" => service).increment(1);
}
