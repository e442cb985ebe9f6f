use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

const API_SERVICE: &str = "api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Starting,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across services
    pub status: HealthStatus,
    pub services: HashMap<String, ServiceHealth>,
    pub uptime_seconds: u64,
}

/// Tracks readiness of the process.
///
/// Downstream stores are not probed; they are checked per request.
#[derive(Debug, Clone)]
pub struct HealthManager {
    services: Arc<RwLock<HashMap<String, ServiceHealth>>>,
    startup_time: Instant,
    startup_grace_period: Duration,
}

impl Default for HealthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthManager {
    pub fn new() -> Self {
        let mut services = HashMap::new();
        services.insert(
            API_SERVICE.to_string(),
            ServiceHealth {
                status: HealthStatus::Starting,
                message: "API server starting up".to_string(),
            },
        );

        Self {
            services: Arc::new(RwLock::new(services)),
            startup_time: Instant::now(),
            startup_grace_period: Duration::from_secs(30),
        }
    }

    /// Called once the listener is bound.
    pub async fn mark_ready(&self) {
        self.set_api_status(HealthStatus::Healthy, "API server is ready").await;
        info!("API service marked as ready");
    }

    /// Called when shutdown begins so load balancers stop routing here.
    pub async fn mark_shutting_down(&self) {
        self.set_api_status(HealthStatus::Unhealthy, "API server is shutting down").await;
        info!("API service marked as shutting down");
    }

    async fn set_api_status(&self, status: HealthStatus, message: &str) {
        let mut services = self.services.write().await;
        services.insert(
            API_SERVICE.to_string(),
            ServiceHealth {
                status,
                message: message.to_string(),
            },
        );
    }

    pub async fn get_health(&self) -> HealthResponse {
        let services = self.services.read().await.clone();

        let status = if services.values().any(|s| s.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if services.values().any(|s| s.status == HealthStatus::Starting) {
            HealthStatus::Starting
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            services,
            uptime_seconds: self.startup_time.elapsed().as_secs(),
        }
    }

    pub fn is_in_startup_period(&self) -> bool {
        self.startup_time.elapsed() < self.startup_grace_period
    }
}
