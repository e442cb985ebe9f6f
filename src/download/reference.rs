use serde::Deserialize;

use super::{FileReference, ListSelector};
use crate::config::DownloadConfig;
use crate::error::AppError;

/// Query string of the download endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    /// `spitem` selects list-entry addressing
    pub mode: Option<String>,
    pub drive_id: Option<String>,
    pub item_id: Option<String>,
    pub site_host: Option<String>,
    pub site_path: Option<String>,
    pub sp_item_id: Option<String>,
    pub list_id: Option<String>,
    pub list_title: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DownloadParams {
    pub fn is_list_entry_mode(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("spitem"))
    }

    /// Build the file reference, filling list-entry gaps from configuration.
    pub fn into_reference(self, defaults: &DownloadConfig) -> Result<FileReference, AppError> {
        if !self.is_list_entry_mode() {
            return match (present(self.drive_id), present(self.item_id)) {
                (Some(container_id), Some(item_id)) => Ok(FileReference::ByContainerItem {
                    container_id,
                    item_id,
                }),
                _ => Err(AppError::InvalidInput(
                    "driveId and itemId are required".to_string(),
                )),
            };
        }

        let site_host = present(self.site_host).or_else(|| present(defaults.default_site_host.clone()));
        let site_path = present(self.site_path).or_else(|| present(defaults.default_site_path.clone()));
        let entry_id = present(self.sp_item_id);

        // Explicit request parameters win over the configured list
        let list = present(self.list_id)
            .map(ListSelector::Id)
            .or_else(|| present(self.list_title).map(ListSelector::Title))
            .or_else(|| present(defaults.default_list_id.clone()).map(ListSelector::Id));

        match (site_host, site_path, list, entry_id) {
            (Some(site_host), Some(site_path), Some(list), Some(entry_id)) => {
                Ok(FileReference::ByListEntry {
                    site_host,
                    site_path,
                    list,
                    entry_id,
                })
            }
            _ => Err(AppError::InvalidInput(
                "siteHost, sitePath, spItemId and listId or listTitle are required".to_string(),
            )),
        }
    }
}
