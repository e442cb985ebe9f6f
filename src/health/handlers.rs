use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::debug;

use super::{HealthManager, HealthResponse, HealthStatus};

/// Liveness probe: the process is up.
pub async fn liveness_handler() -> &'static str {
    "OK"
}

/// Readiness probe.
///
/// `starting` is reported as 200 during the startup grace period and as 503
/// after it.
pub async fn readiness_handler(
    State(health_manager): State<HealthManager>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let health = health_manager.get_health().await;
    debug!(status = ?health.status, "Readiness check");

    match health.status {
        HealthStatus::Healthy => Ok(Json(health)),
        HealthStatus::Starting if health_manager.is_in_startup_period() => Ok(Json(health)),
        _ => Err((StatusCode::SERVICE_UNAVAILABLE, Json(health))),
    }
}
