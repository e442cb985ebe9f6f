use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Result, anyhow};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Owns the installed Prometheus recorder.
pub struct MetricsManager {
    handle: PrometheusHandle,
}

impl MetricsManager {
    fn install(environment: &str) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .add_global_label("service", env!("CARGO_PKG_NAME"))
            .add_global_label("environment", environment)
            .add_global_label("version", env!("CARGO_PKG_VERSION"))
            .install_recorder()
            .map_err(|e| anyhow!("Failed to install Prometheus recorder: {}", e))?;

        tracing::info!(environment, "Prometheus metrics recorder initialized");
        Ok(Self { handle })
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

static METRICS_MANAGER: OnceLock<Arc<MetricsManager>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Install the global recorder once; later calls return the same manager.
pub fn init_metrics(environment: &str) -> Result<Arc<MetricsManager>> {
    let _guard = INIT_LOCK
        .lock()
        .map_err(|_| anyhow!("Metrics initialization lock poisoned"))?;

    if let Some(manager) = METRICS_MANAGER.get() {
        return Ok(manager.clone());
    }

    let manager = Arc::new(MetricsManager::install(environment)?);
    // Cannot fail while the lock is held
    let _ = METRICS_MANAGER.set(manager.clone());
    Ok(manager)
}

pub fn get_metrics_manager() -> Result<Arc<MetricsManager>> {
    METRICS_MANAGER
        .get()
        .cloned()
        .ok_or_else(|| anyhow!("Metrics manager not initialized. Call init_metrics() first."))
}
