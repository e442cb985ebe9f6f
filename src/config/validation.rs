use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
};
use garde::Validate;
use clap::Parser;

use super::{AppConfig, CredentialsConfig};
use crate::error::AppError;

#[derive(Parser, Clone, Debug, Default)]
#[command(name = "graph-file-proxy", version, about = "Authenticated SharePoint/OneDrive download proxy")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Server port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Environment name
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Flat environment names used by existing deployments, mapped onto the
/// nested configuration keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("USE_MANAGED_IDENTITY", "credentials.use_managed_identity"),
    ("TENANT_ID", "credentials.tenant_id"),
    ("CLIENT_ID", "credentials.client_id"),
    ("CLIENT_SECRET", "credentials.client_secret"),
    ("DATAVERSE_URL", "records.base_url"),
    ("DATAVERSE_ENTITY_SET", "records.entity_set"),
    ("DEFAULT_DISPOSITION", "download.default_disposition"),
    ("DEFAULT_SITE_HOST", "download.default_site_host"),
    ("DEFAULT_SITE_PATH", "download.default_site_path"),
    ("DEFAULT_LIST_ID", "download.default_list_id"),
];

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| Uncased::from(*path))
            .unwrap_or_else(|| Uncased::from(key.as_str().to_string()))
    })
}

/// Build the layered configuration source.
///
/// Precedence, lowest first: embedded defaults, base TOML file, per-environment
/// TOML file, `APP_`-prefixed variables, legacy flat variables, CLI flags.
pub fn figment_for(cli: &Cli) -> Figment {
    let env_name = cli.environment.clone().unwrap_or_else(||
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string())
    );
    let base_file = cli
        .config
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("config/default.toml"));

    let mut figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(base_file))
        .merge(Toml::file(format!("config/{}.toml", env_name)))
        .merge(Env::prefixed("APP_").split("__"))
        .merge(legacy_env());

    if let Some(environment) = &cli.environment {
        figment = figment.merge(("environment", environment.to_lowercase()));
    }
    if let Some(port) = cli.port {
        figment = figment.merge(("server.port", port));
    }
    if cli.debug {
        figment = figment.merge(("logging.level", "debug"));
    }
    figment
}

/// Load, validate and return the process configuration.
pub fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let config: AppConfig = figment_for(cli)
        .extract()
        .map_err(|e| AppError::Config(e.to_string()))?;

    config
        .validate()
        .map_err(|e| AppError::Config(e.to_string()))?;

    config.credentials.strategy()?;

    Ok(config)
}

/// Credential strategy, fixed once per process.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    ManagedIdentity {
        client_id: Option<String>,
    },
    ClientSecret {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl std::fmt::Debug for CredentialStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialStrategy::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            CredentialStrategy::ClientSecret { tenant_id, client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

impl CredentialsConfig {
    pub fn strategy(&self) -> Result<CredentialStrategy, AppError> {
        if self.use_managed_identity {
            return Ok(CredentialStrategy::ManagedIdentity {
                client_id: non_empty(&self.client_id),
            });
        }

        let tenant_id = non_empty(&self.tenant_id);
        let client_id = non_empty(&self.client_id);
        let client_secret = non_empty(&self.client_secret);
        match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(CredentialStrategy::ClientSecret {
                    authority_host: self.authority_host.trim_end_matches('/').to_string(),
                    tenant_id,
                    client_id,
                    client_secret,
                })
            }
            _ => Err(AppError::Config(
                "credentials.tenant_id, credentials.client_id and credentials.client_secret \
                 are required when use_managed_identity is false"
                    .to_string(),
            )),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
