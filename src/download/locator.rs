use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{FileReference, ListSelector, ResolvedFile};
use crate::error::AppError;
use crate::services::graph::segment;
use crate::services::{DocumentStore, GraphToken, UpstreamError};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_LIST_PAGES: usize = 50;

/// Resolves a [`FileReference`] to a concrete drive item and reads the
/// business record id stored in the item's list fields.
#[derive(Clone)]
pub struct FileLocator {
    documents: Arc<dyn DocumentStore>,
    record_field: String,
}

impl FileLocator {
    pub fn new(documents: Arc<dyn DocumentStore>, record_field: impl Into<String>) -> Self {
        Self {
            documents,
            record_field: record_field.into(),
        }
    }

    pub async fn locate(&self, reference: &FileReference, token: &GraphToken) -> Result<ResolvedFile, AppError> {
        match reference {
            FileReference::ByContainerItem { container_id, item_id } => {
                self.locate_item(container_id, item_id, token).await
            }
            FileReference::ByListEntry {
                site_host,
                site_path,
                list,
                entry_id,
            } => {
                self.locate_list_entry(site_host, site_path, list, entry_id, token)
                    .await
            }
        }
    }

    async fn locate_item(
        &self,
        container_id: &str,
        item_id: &str,
        token: &GraphToken,
    ) -> Result<ResolvedFile, AppError> {
        let item_path = format!("/drives/{}/items/{}", segment(container_id), segment(item_id));

        let metadata = self
            .documents
            .get_json(&format!("{}?$select=id,name,file", item_path), token)
            .await
            .map_err(|e| not_found_or_upstream(e, "file not found"))?;

        // Files outside a document library have no list fields
        let fields = match self
            .documents
            .get_json(&format!("{}/listItem/fields", item_path), token)
            .await
        {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!(container_id, item_id, error = %e, "List fields unavailable, treating file as unlinked");
                None
            }
        };

        Ok(ResolvedFile {
            container_id: container_id.to_string(),
            item_id: item_id.to_string(),
            display_name: display_name(&metadata, item_id),
            content_type: content_type(&metadata),
            business_record_id: fields.as_ref().and_then(|f| self.record_id_from(f)),
        })
    }

    async fn locate_list_entry(
        &self,
        site_host: &str,
        site_path: &str,
        list: &ListSelector,
        entry_id: &str,
        token: &GraphToken,
    ) -> Result<ResolvedFile, AppError> {
        let site = self
            .documents
            .get_json(
                &format!("/sites/{}:/{}?$select=id", segment(site_host), encode_path(site_path)),
                token,
            )
            .await
            .map_err(|e| not_found_or_upstream(e, "site not found"))?;
        let site_id = required_str(&site, "id").ok_or_else(|| decode_error("site has no id"))?;

        let list_id = match list {
            ListSelector::Id(id) => id.clone(),
            ListSelector::Title(title) => self.find_list_by_title(&site_id, title, token).await?,
        };

        let entry_path = format!(
            "/sites/{}/lists/{}/items/{}",
            segment(&site_id),
            segment(&list_id),
            segment(entry_id)
        );

        let entry = self
            .documents
            .get_json(&format!("{}?$expand=driveItem", entry_path), token)
            .await
            .map_err(|e| not_found_or_upstream(e, "list entry not found"))?;

        let drive_item = entry
            .get("driveItem")
            .filter(|v| v.is_object())
            .ok_or_else(|| AppError::NotFound("list entry has no linked file".to_string()))?;
        let container_id = drive_item
            .pointer("/parentReference/driveId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let item_id = required_str(drive_item, "id");
        let (Some(container_id), Some(item_id)) = (container_id, item_id) else {
            return Err(AppError::NotFound("list entry has no linked file".to_string()));
        };

        let fields = self
            .documents
            .get_json(&format!("{}/fields", entry_path), token)
            .await
            .map_err(|e| not_found_or_upstream(e, "list entry not found"))?;

        debug!(site_id = %site_id, list_id = %list_id, entry_id, item_id = %item_id, "List entry resolved");

        Ok(ResolvedFile {
            display_name: display_name(drive_item, &item_id),
            content_type: content_type(drive_item),
            business_record_id: self.record_id_from(&fields),
            container_id,
            item_id,
        })
    }

    /// Walk the site's lists, following `@odata.nextLink`, for an exact title match.
    async fn find_list_by_title(&self, site_id: &str, title: &str, token: &GraphToken) -> Result<String, AppError> {
        let mut next = Some(format!("/sites/{}/lists?$select=id,displayName", segment(site_id)));
        let mut visited = HashSet::new();

        while let Some(target) = next.take() {
            if visited.len() >= MAX_LIST_PAGES || !visited.insert(target.clone()) {
                warn!(site_id = %site_id, pages = visited.len(), "Stopped following list pages");
                break;
            }

            let page = self
                .documents
                .get_json(&target, token)
                .await
                .map_err(|e| not_found_or_upstream(e, "site not found"))?;

            let found = page
                .get("value")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .find(|list| list.get("displayName").and_then(Value::as_str) == Some(title))
                .and_then(|list| required_str(list, "id"));
            if let Some(id) = found {
                return Ok(id);
            }

            next = required_str(&page, "@odata.nextLink");
        }

        Err(AppError::NotFound(format!("list '{}' not found", title)))
    }

    fn record_id_from(&self, fields: &Value) -> Option<String> {
        fields
            .get(&self.record_field)
            .and_then(Value::as_str)
            .map(normalize_record_id)
            .filter(|id| !id.is_empty())
    }
}

/// Strip whitespace and the braces some list columns keep around GUIDs.
pub fn normalize_record_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
        .to_string()
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn required_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn display_name(item: &Value, fallback: &str) -> String {
    required_str(item, "name").unwrap_or_else(|| fallback.to_string())
}

fn content_type(item: &Value) -> String {
    item.pointer("/file/mimeType")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn not_found_or_upstream(err: UpstreamError, what: &str) -> AppError {
    if err.is_not_found() {
        AppError::NotFound(what.to_string())
    } else {
        AppError::Upstream(err)
    }
}

fn decode_error(message: &str) -> AppError {
    AppError::Upstream(UpstreamError::Decode {
        url: "graph".to_string(),
        message: message.to_string(),
    })
}
