use std::sync::Arc;

use tracing::{debug, instrument};

use super::{ContentStreamer, EntitlementResolver, FileDownload, FileLocator, FileReference};
use crate::auth::components::ProxyComponents;
use crate::auth::{AuditEntry, CallerIdentity, audit_access_decision};
use crate::config::{AppConfig, DispositionMode};
use crate::error::AppError;
use crate::observability::record_access_decision;
use crate::services::{GraphToken, RecordStoreToken, TokenProvider};

/// Runs one download request through token acquisition, location,
/// entitlement and content retrieval.
#[derive(Clone)]
pub struct DownloadPipeline {
    tokens: Arc<dyn TokenProvider>,
    locator: FileLocator,
    resolver: EntitlementResolver,
    streamer: ContentStreamer,
    graph_scope: String,
    record_scope: String,
    disposition: DispositionMode,
}

impl DownloadPipeline {
    pub fn new(components: &ProxyComponents, config: &AppConfig) -> Self {
        Self {
            tokens: components.tokens.clone(),
            locator: FileLocator::new(components.documents.clone(), config.graph.record_field.clone()),
            resolver: EntitlementResolver::new(components.records.clone(), &config.records),
            streamer: ContentStreamer::new(components.documents.clone()),
            graph_scope: config.graph.scope.clone(),
            record_scope: config.records.scope(),
            disposition: config.download.default_disposition,
        }
    }

    #[instrument(skip_all, fields(trace_id = %trace_id))]
    pub async fn run(
        &self,
        identity: &CallerIdentity,
        reference: &FileReference,
        trace_id: &str,
    ) -> Result<FileDownload, AppError> {
        let graph_token = GraphToken::new(self.tokens.get_token(&self.graph_scope).await?);
        let record_token = RecordStoreToken::new(self.tokens.get_token(&self.record_scope).await?);

        let file = self.locator.locate(reference, &graph_token).await?;
        debug!(
            container_id = %file.container_id,
            item_id = %file.item_id,
            linked = file.business_record_id.is_some(),
            "File located"
        );

        let entitlement = self
            .resolver
            .resolve(identity, file.business_record_id.as_deref(), &record_token)
            .await?;

        let entry = AuditEntry::new(
            trace_id,
            identity,
            &file,
            entitlement.principal_id.as_deref(),
            entitlement.decision,
        );
        audit_access_decision(&entry, identity.display_principal.as_deref());
        record_access_decision(entitlement.decision);

        entitlement.decision.into_result()?;

        let body = self.streamer.fetch(&file, &graph_token).await?;
        Ok(FileDownload::new(body, &file, self.disposition))
    }
}
