//! Clients for the services the proxy depends on.
//!
//! Each downstream is reached through a trait so the download pipeline can be
//! exercised against in-memory doubles:
//! - [`token::TokenProvider`] issues bearer tokens for a scope
//! - [`graph::DocumentStore`] reads drive item metadata and content (Microsoft Graph)
//! - [`dataverse::RecordStore`] queries and reads business records (Dataverse)

use thiserror::Error;

pub mod dataverse;
pub mod graph;
pub mod token;

pub use dataverse::{DataverseClient, RecordStore, IMPERSONATION_HEADER};
pub use graph::{DocumentStore, GraphClient};
pub use token::{
    AccessToken, ClientSecretCredential, GraphToken, ManagedIdentityCredential, RecordStoreToken,
    TokenError, TokenProvider, build_token_provider,
};

/// A downstream call that did not produce a usable response.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The service answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    /// The request never produced a response
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The response body could not be interpreted
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl UpstreamError {
    /// HTTP status of the failed call, when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Send a request and turn anything but a 2xx into an [`UpstreamError`].
pub(crate) async fn send_checked(
    service: &'static str,
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<reqwest::Response, UpstreamError> {
    let response = request.send().await.map_err(|e| {
        crate::observability::record_upstream_error(service);
        UpstreamError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        crate::observability::record_upstream_error(service);
        tracing::debug!(service, status = status.as_u16(), url, "Downstream call failed");
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response)
}

/// Build the shared HTTP client used by every downstream.
pub fn build_http_client(config: &crate::config::HttpClientConfig) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
    if let Some(seconds) = config.timeout_seconds {
        builder = builder.timeout(std::time::Duration::from_secs(seconds));
    }
    Ok(builder.build()?)
}
