//! Bearer token acquisition for the proxy's own identity.
//!
//! Two strategies share one trait and are chosen once at startup from
//! [`CredentialStrategy`]:
//! - [`ManagedIdentityCredential`] asks the hosting platform's identity endpoint
//! - [`ClientSecretCredential`] runs an OAuth2 client-credentials grant
//!
//! Tokens are not cached here. Every call goes to the identity provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::CredentialStrategy;

const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Raw bearer token. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Token accepted by the document store (Graph) only.
#[derive(Debug, Clone)]
pub struct GraphToken(AccessToken);

impl GraphToken {
    pub fn new(token: AccessToken) -> Self {
        Self(token)
    }

    pub fn secret(&self) -> &str {
        self.0.secret()
    }
}

/// Token accepted by the record store (Dataverse) only.
#[derive(Debug, Clone)]
pub struct RecordStoreToken(AccessToken);

impl RecordStoreToken {
    pub fn new(token: AccessToken) -> Self {
        Self(token)
    }

    pub fn secret(&self) -> &str {
        self.0.secret()
    }
}

#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("identity provider rejected the request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a bearer token for `scope` (e.g. `https://graph.microsoft.com/.default`).
    async fn get_token(&self, scope: &str) -> Result<AccessToken, TokenError>;

    /// Short name of the credential strategy, for logs.
    fn strategy_name(&self) -> &'static str;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Default)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

async fn read_token(response: reqwest::Response) -> Result<AccessToken, TokenError> {
    let status = response.status();
    if !status.is_success() {
        crate::observability::record_upstream_error("token");
        let body: TokenErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .error_description
            .or(body.message)
            .or(body.error)
            .unwrap_or_else(|| "no error description".to_string());
        return Err(TokenError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| TokenError::InvalidResponse(e.to_string()))?;
    if token.access_token.is_empty() {
        return Err(TokenError::InvalidResponse("empty access_token".to_string()));
    }
    Ok(AccessToken::new(token.access_token))
}

fn transport_error(err: reqwest::Error) -> TokenError {
    crate::observability::record_upstream_error("token");
    TokenError::Transport(err.to_string())
}

/// Managed identity endpoints take a resource, not a `/.default` scope.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[derive(Debug, Clone)]
enum IdentityEndpoint {
    /// App Service / Functions identity endpoint with its per-process secret
    AppService { url: String, secret: String },
    /// Instance metadata service
    Imds { url: String },
}

/// Token provider backed by the platform-assigned managed identity.
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// Use the App Service endpoint when `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`
    /// are set, the instance metadata service otherwise.
    pub fn from_env(http: reqwest::Client, client_id: Option<String>) -> Self {
        match (std::env::var("IDENTITY_ENDPOINT"), std::env::var("IDENTITY_HEADER")) {
            (Ok(url), Ok(secret)) => Self::app_service(http, url, secret, client_id),
            _ => Self::imds(http, IMDS_TOKEN_URL.to_string(), client_id),
        }
    }

    pub fn app_service(
        http: reqwest::Client,
        url: String,
        secret: String,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http,
            endpoint: IdentityEndpoint::AppService { url, secret },
            client_id,
        }
    }

    pub fn imds(http: reqwest::Client, url: String, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: IdentityEndpoint::Imds { url },
            client_id,
        }
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, TokenError> {
        let resource = scope_to_resource(scope);
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let request = match &self.endpoint {
            IdentityEndpoint::AppService { url, secret } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http.get(url).header("X-IDENTITY-HEADER", secret).query(&query)
            }
            IdentityEndpoint::Imds { url } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http.get(url).header("Metadata", "true").query(&query)
            }
        };

        debug!(resource, "Requesting managed identity token");
        let response = request
            .send()
            .await
            .map_err(transport_error)?;
        read_token(response).await
    }

    fn strategy_name(&self) -> &'static str {
        "managed_identity"
    }
}

/// Token provider using an app registration's client secret.
#[derive(Clone)]
pub struct ClientSecretCredential {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                urlencoding::encode(tenant_id)
            ),
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, TokenError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        debug!(scope, "Requesting client credentials token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        read_token(response).await
    }

    fn strategy_name(&self) -> &'static str {
        "client_secret"
    }
}

/// Instantiate the provider for the configured strategy.
pub fn build_token_provider(
    strategy: &CredentialStrategy,
    http: reqwest::Client,
) -> Arc<dyn TokenProvider> {
    match strategy {
        CredentialStrategy::ManagedIdentity { client_id } => {
            Arc::new(ManagedIdentityCredential::from_env(http, client_id.clone()))
        }
        CredentialStrategy::ClientSecret {
            authority_host,
            tenant_id,
            client_id,
            client_secret,
        } => Arc::new(ClientSecretCredential::new(
            http,
            authority_host,
            tenant_id,
            client_id.clone(),
            client_secret.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::spawn_stub;
    use axum::{
        Form, Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_scope_to_resource() {
        assert_eq!(
            scope_to_resource("https://graph.microsoft.com/.default"),
            "https://graph.microsoft.com"
        );
        assert_eq!(scope_to_resource("https://org.crm.dynamics.com"), "https://org.crm.dynamics.com");
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = GraphToken::new(AccessToken::new("eyJ0eXAiOiJKV1Qi"));
        assert!(!format!("{:?}", token).contains("eyJ0"));
        assert_eq!(token.secret(), "eyJ0eXAiOiJKV1Qi");
    }

    #[tokio::test]
    async fn test_client_secret_grant() {
        let app = Router::new().route(
            "/contoso/oauth2/v2.0/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form["grant_type"], "client_credentials");
                assert_eq!(form["client_id"], "app-id");
                assert_eq!(form["client_secret"], "shh");
                Json(json!({ "access_token": format!("tok:{}", form["scope"]), "expires_in": 3599 }))
            }),
        );
        let base = spawn_stub(app).await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &base,
            "contoso",
            "app-id".to_string(),
            "shh".to_string(),
        );
        let token = credential.get_token("https://graph.microsoft.com/.default").await.unwrap();
        assert_eq!(token.secret(), "tok:https://graph.microsoft.com/.default");
        assert_eq!(credential.strategy_name(), "client_secret");
    }

    #[tokio::test]
    async fn test_client_secret_rejection_is_reported() {
        let app = Router::new().route(
            "/contoso/oauth2/v2.0/token",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "invalid_client",
                        "error_description": "AADSTS7000215: Invalid client secret provided."
                    })),
                )
            }),
        );
        let base = spawn_stub(app).await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &base,
            "contoso",
            "app-id".to_string(),
            "wrong".to_string(),
        );
        match credential.get_token("scope/.default").await {
            Err(TokenError::Rejected { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("AADSTS7000215"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_app_service_managed_identity() {
        let app = Router::new().route(
            "/msi/token",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(headers.get("x-identity-header").unwrap(), "per-process-secret");
                assert_eq!(q["api-version"], APP_SERVICE_API_VERSION);
                assert_eq!(q["client_id"], "user-assigned");
                Json(json!({ "access_token": format!("mi:{}", q["resource"]) }))
            }),
        );
        let base = spawn_stub(app).await;

        let credential = ManagedIdentityCredential::app_service(
            reqwest::Client::new(),
            format!("{}/msi/token", base),
            "per-process-secret".to_string(),
            Some("user-assigned".to_string()),
        );
        let token = credential.get_token("https://contoso.crm4.dynamics.com/.default").await.unwrap();
        assert_eq!(token.secret(), "mi:https://contoso.crm4.dynamics.com");
    }

    #[tokio::test]
    async fn test_imds_managed_identity() {
        let app = Router::new().route(
            "/metadata/identity/oauth2/token",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(headers.get("metadata").unwrap(), "true");
                assert_eq!(q["api-version"], IMDS_API_VERSION);
                assert!(!q.contains_key("client_id"));
                Json(json!({ "access_token": "imds-token" }))
            }),
        );
        let base = spawn_stub(app).await;

        let credential = ManagedIdentityCredential::imds(
            reqwest::Client::new(),
            format!("{}/metadata/identity/oauth2/token", base),
            None,
        );
        let token = credential.get_token("https://graph.microsoft.com/.default").await.unwrap();
        assert_eq!(token.secret(), "imds-token");
        assert_eq!(credential.strategy_name(), "managed_identity");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        let credential = ManagedIdentityCredential::imds(
            reqwest::Client::new(),
            "http://127.0.0.1:1/metadata/identity/oauth2/token".to_string(),
            None,
        );
        let result = credential.get_token("https://graph.microsoft.com/.default").await;
        assert!(matches!(result, Err(TokenError::Transport(_))));
    }

    #[test]
    fn test_build_token_provider_selects_strategy() {
        let strategy = CredentialStrategy::ClientSecret {
            authority_host: "https://login.microsoftonline.com".to_string(),
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
        };
        let provider = build_token_provider(&strategy, reqwest::Client::new());
        assert_eq!(provider.strategy_name(), "client_secret");

        let strategy = CredentialStrategy::ManagedIdentity { client_id: None };
        let provider = build_token_provider(&strategy, reqwest::Client::new());
        assert_eq!(provider.strategy_name(), "managed_identity");
    }
}
