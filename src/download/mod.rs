//! Authorized file download pipeline
//!
//! A request flows through four stages, strictly in order:
//!
//! 1. identity extraction ([`crate::auth::extract_caller_identity`])
//! 2. token acquisition for the document store and the record store
//! 3. file location ([`locator::FileLocator`]) which also yields the linked
//!    business record id
//! 4. entitlement ([`entitlement::EntitlementResolver`]), delegated to the
//!    record store through an impersonated read
//!
//! Only an [`AccessDecision::Allowed`] outcome reaches the content stage
//! ([`content::ContentStreamer`]). Any failure ends the request immediately.
//! Nothing is cached between requests.

use serde::Serialize;

use crate::error::AppError;

pub mod content;
pub mod entitlement;
pub mod handler;
pub mod locator;
pub mod pipeline;
pub mod reference;

pub use content::{ContentStreamer, FileDownload, content_disposition};
pub use entitlement::{Entitlement, EntitlementResolver, Principal};
pub use handler::{DownloadState, download_handler};
pub use locator::FileLocator;
pub use pipeline::DownloadPipeline;
pub use reference::DownloadParams;

/// How a request addresses its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReference {
    /// Drive id + drive item id
    ByContainerItem { container_id: String, item_id: String },
    /// SharePoint list entry whose linked file is served
    ByListEntry {
        site_host: String,
        site_path: String,
        list: ListSelector,
        entry_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSelector {
    Id(String),
    /// Exact display name, resolved against the site's lists
    Title(String),
}

/// A file located in the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub container_id: String,
    pub item_id: String,
    pub display_name: String,
    pub content_type: String,
    /// `None` when the file is not linked to a governed record
    pub business_record_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allowed,
    DeniedNoRecordLink,
    DeniedNoPrincipal,
    DeniedInactivePrincipal,
    DeniedRecordUnreadable,
    RecordNotFound,
}

impl AccessDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allowed => "allowed",
            AccessDecision::DeniedNoRecordLink => "denied_no_record_link",
            AccessDecision::DeniedNoPrincipal => "denied_no_principal",
            AccessDecision::DeniedInactivePrincipal => "denied_inactive_principal",
            AccessDecision::DeniedRecordUnreadable => "denied_record_unreadable",
            AccessDecision::RecordNotFound => "record_not_found",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    /// `Ok` only for [`AccessDecision::Allowed`].
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::RecordNotFound => Err(AppError::NotFound(self.to_string())),
            denied => Err(AppError::Forbidden(denied)),
        }
    }
}

impl std::fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            AccessDecision::Allowed => "allowed",
            AccessDecision::DeniedNoRecordLink => "file is not linked to a business record",
            AccessDecision::DeniedNoPrincipal => "no matching user in the record store",
            AccessDecision::DeniedInactivePrincipal => "user is disabled in the record store",
            AccessDecision::DeniedRecordUnreadable => "user cannot read the linked record",
            AccessDecision::RecordNotFound => "linked record not found",
        };
        f.write_str(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_decision_status_mapping() {
        assert!(AccessDecision::Allowed.into_result().is_ok());

        let status = |d: AccessDecision| d.into_result().unwrap_err().status();
        assert_eq!(status(AccessDecision::DeniedNoRecordLink), StatusCode::FORBIDDEN);
        assert_eq!(status(AccessDecision::DeniedNoPrincipal), StatusCode::FORBIDDEN);
        assert_eq!(status(AccessDecision::DeniedInactivePrincipal), StatusCode::FORBIDDEN);
        assert_eq!(status(AccessDecision::DeniedRecordUnreadable), StatusCode::FORBIDDEN);
        assert_eq!(status(AccessDecision::RecordNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_only_allowed_is_allowed() {
        for decision in [
            AccessDecision::DeniedNoRecordLink,
            AccessDecision::DeniedNoPrincipal,
            AccessDecision::DeniedInactivePrincipal,
            AccessDecision::DeniedRecordUnreadable,
            AccessDecision::RecordNotFound,
        ] {
            assert!(!decision.is_allowed(), "{}", decision.as_str());
        }
        assert!(AccessDecision::Allowed.is_allowed());
    }
}
