//! Dataverse Web API access for principals and governed records.

use async_trait::async_trait;
use serde_json::Value;

use super::{RecordStoreToken, UpstreamError, send_checked};

const SERVICE: &str = "dataverse";

/// Header that makes Dataverse evaluate a request as another `systemuser`.
pub const IMPERSONATION_HEADER: &str = "MSCRMCallerID";

/// Read-only view of the record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `entity_set` matching an OData `$filter`.
    async fn query(
        &self,
        entity_set: &str,
        filter: &str,
        select: &[&str],
        token: &RecordStoreToken,
    ) -> Result<Vec<Value>, UpstreamError>;

    /// Single row by primary key. With `impersonate`, the read is evaluated
    /// under that principal's security roles instead of the caller token's.
    async fn fetch_one(
        &self,
        entity_set: &str,
        id: &str,
        token: &RecordStoreToken,
        impersonate: Option<&str>,
    ) -> Result<Value, UpstreamError>;
}

#[derive(Clone)]
pub struct DataverseClient {
    http: reqwest::Client,
    api_base: String,
}

impl DataverseClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_path: &str) -> Self {
        Self {
            http,
            api_base: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                api_path.trim_matches('/')
            ),
        }
    }

    fn request(&self, url: &str, token: &RecordStoreToken) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
    }
}

#[async_trait]
impl RecordStore for DataverseClient {
    async fn query(
        &self,
        entity_set: &str,
        filter: &str,
        select: &[&str],
        token: &RecordStoreToken,
    ) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/{}", self.api_base, entity_set);
        let request = self
            .request(&url, token)
            .query(&[("$select", select.join(",").as_str()), ("$filter", filter)]);

        let response = send_checked(SERVICE, request, &url).await?;
        let mut body: Value = response.json().await.map_err(|e| UpstreamError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        match body.get_mut("value").map(Value::take) {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(UpstreamError::Decode {
                url,
                message: "missing value array".to_string(),
            }),
        }
    }

    async fn fetch_one(
        &self,
        entity_set: &str,
        id: &str,
        token: &RecordStoreToken,
        impersonate: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}({})", self.api_base, entity_set, urlencoding::encode(id));
        let mut request = self.request(&url, token);
        if let Some(principal_id) = impersonate {
            request = request.header(IMPERSONATION_HEADER, principal_id);
        }

        let response = send_checked(SERVICE, request, &url).await?;
        response.json().await.map_err(|e| UpstreamError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

/// Quote a value as an OData string literal.
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
