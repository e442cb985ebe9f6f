//! Microsoft Graph access for drive items, sites and lists.

use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::Value;

use super::{GraphToken, UpstreamError, send_checked};

const SERVICE: &str = "graph";

/// Read-only view of the document store.
///
/// `target` is either a path relative to the store's base URL
/// (`/drives/{id}/items/{id}`) or an absolute pagination link previously
/// returned by the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_json(&self, target: &str, token: &GraphToken) -> Result<Value, UpstreamError>;

    async fn get_content(&self, target: &str, token: &GraphToken) -> Result<Bytes, UpstreamError>;
}

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, target: &str) -> Result<String, UpstreamError> {
        if target.starts_with('/') {
            return Ok(format!("{}{}", self.base_url, target));
        }
        // Absolute links must stay on the Graph host; the bearer token goes with them
        if target.starts_with(&format!("{}/", self.base_url)) {
            return Ok(target.to_string());
        }
        Err(UpstreamError::Decode {
            url: target.to_string(),
            message: "link points outside the document store".to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for GraphClient {
    async fn get_json(&self, target: &str, token: &GraphToken) -> Result<Value, UpstreamError> {
        let url = self.url_for(target)?;
        let request = self
            .http
            .get(&url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json");

        let response = send_checked(SERVICE, request, &url).await?;
        response.json::<Value>().await.map_err(|e| UpstreamError::Decode {
            url,
            message: e.to_string(),
        })
    }

    async fn get_content(&self, target: &str, token: &GraphToken) -> Result<Bytes, UpstreamError> {
        let url = self.url_for(target)?;
        // The 302 to the pre-authenticated download URL is followed by reqwest,
        // which drops the Authorization header on the cross-origin hop.
        let request = self.http.get(&url).bearer_auth(token.secret());

        let response = send_checked(SERVICE, request, &url).await?;
        response.bytes().await.map_err(|e| UpstreamError::Transport {
            url,
            message: e.to_string(),
        })
    }
}

/// Percent-encode one path segment.
///
/// `!` (drive ids) and `,` (composite site ids) are legal in a segment and
/// Graph expects them literal.
pub fn segment(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%2C", ",")
}
