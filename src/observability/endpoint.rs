use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::recorder::get_metrics_manager;

/// `GET /metrics`
pub async fn metrics_endpoint() -> Response {
    let manager = match get_metrics_manager() {
        Ok(manager) => manager,
        Err(e) => {
            tracing::warn!("Metrics requested before recorder installation: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Metrics not available").into_response();
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        manager.render(),
    )
        .into_response()
}
