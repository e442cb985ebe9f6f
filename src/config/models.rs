use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub server: ServerConfig,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,

    #[garde(dive)]
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[garde(dive)]
    #[serde(default)]
    pub graph: GraphConfig,

    #[garde(dive)]
    #[serde(default)]
    pub records: RecordStoreConfig,

    #[garde(dive)]
    #[serde(default)]
    pub download: DownloadConfig,

    #[garde(dive)]
    #[serde(default)]
    pub http: HttpClientConfig,

    #[garde(skip)]
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[garde(range(min = 1024, max = 65535))]
    pub port: u16,

    #[garde(length(min = 1), custom(validate_bind_address))]
    #[serde(default = "default_bind")]
    pub bind: String,

    #[garde(range(min = 1, max = 300))]
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64, // seconds

    /// Browser origins allowed to call the API cross-origin. Empty disables CORS.
    #[garde(custom(validate_origins))]
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: default_bind(),
            shutdown_timeout: default_shutdown_timeout(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Identity used by the proxy itself to call Graph and Dataverse.
///
/// With `use_managed_identity` the platform identity endpoint issues tokens and
/// `client_id` optionally selects a user-assigned identity. Otherwise the
/// tenant/client/secret triple drives a client-credentials grant.
#[derive(Clone, Deserialize, Serialize, Validate)]
pub struct CredentialsConfig {
    #[garde(skip)]
    #[serde(default = "default_use_managed_identity")]
    pub use_managed_identity: bool,

    #[garde(skip)]
    #[serde(default)]
    pub tenant_id: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub client_id: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub client_secret: Option<String>,

    #[garde(length(min = 1), custom(validate_http_url))]
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
}

fn default_use_managed_identity() -> bool {
    false
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            use_managed_identity: default_use_managed_identity(),
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_host: default_authority_host(),
        }
    }
}

// Keep the secret out of Debug output (config is logged at startup).
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("use_managed_identity", &self.use_managed_identity)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct GraphConfig {
    #[garde(length(min = 1), custom(validate_http_url))]
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,

    #[garde(length(min = 1))]
    #[serde(default = "default_graph_scope")]
    pub scope: String,

    /// List column holding the linked business record id.
    #[garde(length(min = 1))]
    #[serde(default = "default_record_field")]
    pub record_field: String,
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_graph_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

fn default_record_field() -> String {
    "CrmExpenseId".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            scope: default_graph_scope(),
            record_field: default_record_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RecordStoreConfig {
    /// Organization URL, e.g. `https://contoso.crm4.dynamics.com`.
    #[garde(length(min = 1), custom(validate_http_url))]
    #[serde(default)]
    pub base_url: String,

    #[garde(pattern(r"^/"))]
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Entity set name of the governed record, e.g. `new_expenses`.
    #[garde(length(min = 1))]
    #[serde(default)]
    pub entity_set: String,

    #[garde(skip)]
    #[serde(default)]
    pub principal_fallback: PrincipalFallback,
}

fn default_api_path() -> String {
    "/api/data/v9.2".to_string()
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_path: default_api_path(),
            entity_set: String::new(),
            principal_fallback: PrincipalFallback::default(),
        }
    }
}

impl RecordStoreConfig {
    /// Token scope for the record store.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.base_url.trim_end_matches('/'))
    }
}

/// Which `systemuser` column(s) the display principal is matched against when
/// the object-id lookup finds nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalFallback {
    None,
    #[default]
    DomainName,
    InternalEmail,
    Either,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct DownloadConfig {
    #[garde(skip)]
    #[serde(default)]
    pub default_disposition: DispositionMode,

    #[garde(skip)]
    #[serde(default)]
    pub default_site_host: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub default_site_path: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub default_list_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispositionMode {
    #[default]
    Inline,
    Attachment,
}

impl DispositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionMode::Inline => "inline",
            DispositionMode::Attachment => "attachment",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct HttpClientConfig {
    /// Per-request timeout for downstream calls; unset keeps the client default.
    #[garde(range(min = 1, max = 600))]
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    #[garde(length(min = 1))]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    concat!("graph-file-proxy/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

fn validate_bind_address(value: &str, _: &()) -> garde::Result {
    value.parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|_| garde::Error::new("Invalid IP address"))
}

fn validate_origins(value: &Vec<String>, _: &()) -> garde::Result {
    match value.iter().find(|origin| validate_http_url(origin, &()).is_err() || origin.ends_with('/')) {
        Some(origin) => Err(garde::Error::new(format!("Invalid CORS origin '{}'", origin))),
        None => Ok(()),
    }
}

fn validate_http_url(value: &str, _: &()) -> garde::Result {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(garde::Error::new("URL must start with http:// or https://"))
    }
}
