use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::ResolvedFile;
use crate::config::DispositionMode;
use crate::error::AppError;
use crate::services::graph::segment;
use crate::services::{DocumentStore, GraphToken};

const CACHE_CONTROL: &str = "private, max-age=60";

/// Fetches file bytes once access has been granted.
#[derive(Clone)]
pub struct ContentStreamer {
    documents: Arc<dyn DocumentStore>,
}

impl ContentStreamer {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn fetch(&self, file: &ResolvedFile, token: &GraphToken) -> Result<Bytes, AppError> {
        let target = format!(
            "/drives/{}/items/{}/content",
            segment(&file.container_id),
            segment(&file.item_id)
        );

        self.documents
            .get_content(&target, token)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::NotFound("file content not found".to_string())
                } else {
                    AppError::Upstream(e)
                }
            })
    }
}

/// Build a `Content-Disposition` value.
///
/// Names outside printable ASCII get an underscore-substituted `filename`
/// plus an RFC 5987 `filename*` carrying the real name.
pub fn content_disposition(mode: DispositionMode, file_name: &str) -> String {
    let printable = |c: char| c.is_ascii() && !c.is_ascii_control();

    let fallback: String = file_name
        .chars()
        .map(|c| if printable(c) { c } else { '_' })
        .collect();
    let quoted = fallback.replace('\\', "\\\\").replace('"', "\\\"");

    if file_name.chars().all(printable) {
        format!("{}; filename=\"{}\"", mode.as_str(), quoted)
    } else {
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            mode.as_str(),
            quoted,
            urlencoding::encode(file_name)
        )
    }
}

/// A successful download response.
#[derive(Debug)]
pub struct FileDownload {
    pub body: Bytes,
    pub content_type: String,
    pub disposition: String,
}

impl FileDownload {
    pub fn new(body: Bytes, file: &ResolvedFile, mode: DispositionMode) -> Self {
        Self {
            body,
            content_type: file.content_type.clone(),
            disposition: content_disposition(mode, &file.display_name),
        }
    }
}

impl IntoResponse for FileDownload {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream"));
        let disposition = HeaderValue::from_str(&self.disposition)
            .unwrap_or(HeaderValue::from_static("attachment"));

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
            ],
            Body::from(self.body),
        )
            .into_response()
    }
}
