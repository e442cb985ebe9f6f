use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::auth::components::ProxyComponents;
use crate::config::AppConfig;
use crate::download::{DownloadPipeline, DownloadState, download_handler};
use crate::health::{HealthManager, liveness_handler, readiness_handler};
use crate::logging::{TRACE_ID_HEADER, trace_requests};
use crate::middleware::metrics_middleware;
use crate::observability::metrics_endpoint;

/// Bind the configured address and serve until SIGINT or SIGTERM.
pub async fn start_server(config: AppConfig, components: ProxyComponents) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}. Is another process using this port?", bind_addr, e))?;
    info!("Server bound to {}", bind_addr);

    serve(listener, config, components, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// In-flight requests get `server.shutdown_timeout` seconds to finish.
pub async fn serve<F>(
    listener: TcpListener,
    config: AppConfig,
    components: ProxyComponents,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let health_manager = HealthManager::new();
    let app = build_app(&config, &components, health_manager.clone());

    let drain_started = Arc::new(Notify::new());
    let shutdown = {
        let health_manager = health_manager.clone();
        let drain_started = drain_started.clone();
        async move {
            shutdown.await;
            health_manager.mark_shutting_down().await;
            drain_started.notify_one();
        }
    };

    health_manager.mark_ready().await;
    info!("Serving on {}", listener.local_addr()?);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();
    let drain_deadline = async {
        drain_started.notified().await;
        tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout)).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            warn!(timeout_seconds = config.server.shutdown_timeout, "Graceful shutdown timed out, dropping open connections");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Assemble the full application router from configuration and components.
pub fn build_app(config: &AppConfig, components: &ProxyComponents, health_manager: HealthManager) -> Router {
    let pipeline = DownloadPipeline::new(components, config);
    let downloads = DownloadState::new(pipeline, config.download.clone());
    create_router(health_manager, downloads, &config.server.cors_allowed_origins)
}

/// Routes plus the middleware stack.
///
/// Every response, errors included, passes through `trace_requests` and
/// therefore carries `x-trace-id`.
pub fn create_router(health_manager: HealthManager, downloads: DownloadState, cors_origins: &[String]) -> Router {
    let health_routes = Router::new()
        .route("/health", get(liveness_handler))
        .route("/health/liveness", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health/readiness", get(readiness_handler))
        .with_state(health_manager);

    let api_routes = Router::new()
        .route("/api/file", get(download_handler))
        .with_state(downloads);

    let router = Router::new()
        .route("/metrics", get(metrics_endpoint))
        .merge(health_routes)
        .merge(api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(trace_requests));

    match cors_layer(cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Cross-origin access for the configured origins only: `GET` with
/// credentials, exposing the headers a browser download needs.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET])
            .allow_credentials(true)
            .expose_headers([
                header::CONTENT_DISPOSITION,
                HeaderName::from_static(TRACE_ID_HEADER),
            ]),
    )
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
