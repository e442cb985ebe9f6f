use std::sync::Arc;

use axum::{
    Extension,
    extract::{Query, State, rejection::QueryRejection},
    http::HeaderMap,
};
use tracing::{debug, info};

use super::{DownloadParams, DownloadPipeline, FileDownload};
use crate::auth::{CLIENT_PRINCIPAL_HEADER, extract_caller_identity};
use crate::config::DownloadConfig;
use crate::error::AppError;
use crate::logging::TraceId;

#[derive(Clone)]
pub struct DownloadState {
    pub pipeline: Arc<DownloadPipeline>,
    pub defaults: Arc<DownloadConfig>,
}

impl DownloadState {
    pub fn new(pipeline: DownloadPipeline, defaults: DownloadConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            defaults: Arc::new(defaults),
        }
    }
}

/// `GET /api/file`
///
/// The identity header is checked before the query so an anonymous caller
/// always gets 401, whatever the parameters.
pub async fn download_handler(
    State(state): State<DownloadState>,
    Extension(trace_id): Extension<TraceId>,
    headers: HeaderMap,
    query: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<FileDownload, AppError> {
    let identity = extract_caller_identity(headers.get(CLIENT_PRINCIPAL_HEADER))?;
    let Query(params) = query.map_err(|rejection| {
        debug!(trace_id = %trace_id, error = %rejection.body_text(), "Unparseable query string");
        AppError::InvalidInput("malformed query string".to_string())
    })?;
    let reference = params.into_reference(&state.defaults)?;

    info!(
        trace_id = %trace_id,
        subject_key = %identity.subject_key,
        reference = ?reference,
        "Download requested"
    );

    state.pipeline.run(&identity, &reference, trace_id.as_str()).await
}
