use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};

use super::generate_trace_id;

/// HTTP header name for trace ID
pub const TRACE_ID_HEADER: &str = "x-trace-id";

const MAX_TRACE_ID_LEN: usize = 128;

/// Request tracing middleware.
///
/// Reuses an inbound `x-trace-id` when it is short and printable, otherwise
/// generates one. The id is stored in request extensions as [`TraceId`] and
/// echoed on the response.
pub async fn trace_requests(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_TRACE_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_trace_id);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}

/// Wrapper for trace ID that can be extracted from request extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
