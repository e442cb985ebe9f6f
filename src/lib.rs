pub mod auth;
pub mod config;
pub mod download;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod services;

#[cfg(test)]
pub mod tests;

pub use config::*;
pub use error::*;
pub use server::*;

use anyhow::Result;

use crate::auth::components::ProxyComponents;

/// Process entry point: configuration, logging, metrics, then the server.
pub async fn run_server(cli: Cli) -> Result<()> {
    let app_config = config::load_config(&cli)?;

    logging::setup_tracing(&app_config.logging)?;
    logging::install_panic_hook();
    observability::init_metrics(app_config.environment.as_str())?;

    ::tracing::info!(
        environment = app_config.environment.as_str(),
        version = env!("CARGO_PKG_VERSION"),
        "graph-file-proxy starting up"
    );

    let components = ProxyComponents::new_production(&app_config)?;
    server::start_server(app_config, components).await
}
