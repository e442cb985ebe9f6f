//! Downstream components for dependency injection
//!
//! Bundles the token provider and the two store clients so the router can be
//! built against production clients or in-memory doubles alike.

use std::sync::Arc;
use anyhow::Result;

use crate::config::AppConfig;
use crate::services::{
    DataverseClient, DocumentStore, GraphClient, RecordStore, TokenProvider,
    build_http_client, build_token_provider,
};

#[derive(Clone)]
pub struct ProxyComponents {
    /// Issues tokens for both stores
    pub tokens: Arc<dyn TokenProvider>,
    /// Microsoft Graph (file metadata and content)
    pub documents: Arc<dyn DocumentStore>,
    /// Dataverse (principals and governed records)
    pub records: Arc<dyn RecordStore>,
}

impl ProxyComponents {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        documents: Arc<dyn DocumentStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self { tokens, documents, records }
    }

    /// Create production components sharing one HTTP client.
    pub fn new_production(config: &AppConfig) -> Result<Self> {
        let strategy = config.credentials.strategy()?;
        let http = build_http_client(&config.http)?;

        let tokens = build_token_provider(&strategy, http.clone());
        let documents: Arc<dyn DocumentStore> = Arc::new(GraphClient::new(http.clone(), &config.graph.base_url));
        let records: Arc<dyn RecordStore> = Arc::new(DataverseClient::new(
            http,
            &config.records.base_url,
            &config.records.api_path,
        ));

        tracing::info!(
            credential_strategy = tokens.strategy_name(),
            graph = %config.graph.base_url,
            record_store = %config.records.base_url,
            "Downstream components created"
        );

        Ok(Self::new(tokens, documents, records))
    }
}
