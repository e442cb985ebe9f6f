use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AccessDecision;
use crate::auth::CallerIdentity;
use crate::config::{PrincipalFallback, RecordStoreConfig};
use crate::error::AppError;
use crate::services::dataverse::odata_string;
use crate::services::{RecordStore, RecordStoreToken, UpstreamError};

const PRINCIPAL_SET: &str = "systemusers";
const PRINCIPAL_FIELDS: &[&str] = &["systemuserid", "isdisabled"];

/// A user row in the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: String,
    pub active: bool,
}

impl Principal {
    fn from_row(row: &Value) -> Option<Self> {
        let principal_id = row.get("systemuserid").and_then(Value::as_str)?.to_string();
        // A row without the flag is treated as disabled
        let disabled = row.get("isdisabled").and_then(Value::as_bool).unwrap_or(true);
        Some(Self {
            principal_id,
            active: !disabled,
        })
    }
}

/// Outcome of an entitlement check.
#[derive(Debug, Clone)]
pub struct Entitlement {
    pub decision: AccessDecision,
    pub principal_id: Option<String>,
    /// The record as read under the caller's principal
    pub record: Option<Value>,
}

impl Entitlement {
    fn denied(decision: AccessDecision, principal_id: Option<String>) -> Self {
        Self {
            decision,
            principal_id,
            record: None,
        }
    }
}

/// Decides whether the caller may read the business record a file is linked to.
///
/// The record store is the source of truth: the record is read while
/// impersonating the caller's principal, so its own security model answers.
#[derive(Clone)]
pub struct EntitlementResolver {
    records: Arc<dyn RecordStore>,
    entity_set: String,
    fallback: PrincipalFallback,
}

impl EntitlementResolver {
    pub fn new(records: Arc<dyn RecordStore>, config: &RecordStoreConfig) -> Self {
        Self {
            records,
            entity_set: config.entity_set.clone(),
            fallback: config.principal_fallback,
        }
    }

    pub async fn resolve(
        &self,
        identity: &CallerIdentity,
        record_id: Option<&str>,
        token: &RecordStoreToken,
    ) -> Result<Entitlement, AppError> {
        let Some(record_id) = record_id else {
            return Ok(Entitlement::denied(AccessDecision::DeniedNoRecordLink, None));
        };

        let principals = match self.lookup_principals(identity, token).await {
            Ok(principals) => principals,
            Err(e) => {
                warn!(subject_key = %identity.subject_key, error = %e, "Principal lookup failed");
                return Ok(Entitlement::denied(AccessDecision::DeniedNoPrincipal, None));
            }
        };

        if principals.len() > 1 {
            warn!(
                subject_key = %identity.subject_key,
                matches = principals.len(),
                "Several principals match the caller, using the first active one"
            );
        }

        let Some(principal) = principals.iter().find(|p| p.active) else {
            let decision = if principals.is_empty() {
                AccessDecision::DeniedNoPrincipal
            } else {
                AccessDecision::DeniedInactivePrincipal
            };
            let principal_id = principals.first().map(|p| p.principal_id.clone());
            return Ok(Entitlement::denied(decision, principal_id));
        };

        match self
            .records
            .fetch_one(&self.entity_set, record_id, token, Some(&principal.principal_id))
            .await
        {
            Ok(record) => Ok(Entitlement {
                decision: AccessDecision::Allowed,
                principal_id: Some(principal.principal_id.clone()),
                record: Some(record),
            }),
            Err(e) if e.is_not_found() => Ok(Entitlement::denied(
                AccessDecision::RecordNotFound,
                Some(principal.principal_id.clone()),
            )),
            Err(e) if matches!(e.status(), Some(401 | 403)) => Ok(Entitlement::denied(
                AccessDecision::DeniedRecordUnreadable,
                Some(principal.principal_id.clone()),
            )),
            Err(e) => Err(AppError::Upstream(e)),
        }
    }

    /// Object id first; the login name only when that finds nobody.
    async fn lookup_principals(
        &self,
        identity: &CallerIdentity,
        token: &RecordStoreToken,
    ) -> Result<Vec<Principal>, UpstreamError> {
        match subject_filter(&identity.subject_key) {
            Some(filter) => {
                let found = self.query_principals(&filter, token).await?;
                if !found.is_empty() {
                    return Ok(found);
                }
            }
            None => debug!(subject_key = %identity.subject_key, "Subject key is not a GUID, skipping object id lookup"),
        }

        let Some(filter) = identity
            .display_principal
            .as_deref()
            .and_then(|upn| display_filter(self.fallback, upn))
        else {
            return Ok(Vec::new());
        };

        debug!(fallback = ?self.fallback, "Falling back to login name lookup");
        self.query_principals(&filter, token).await
    }

    async fn query_principals(&self, filter: &str, token: &RecordStoreToken) -> Result<Vec<Principal>, UpstreamError> {
        let rows = self
            .records
            .query(PRINCIPAL_SET, filter, PRINCIPAL_FIELDS, token)
            .await?;
        Ok(rows.iter().filter_map(Principal::from_row).collect())
    }
}

fn subject_filter(subject_key: &str) -> Option<String> {
    Uuid::parse_str(subject_key.trim())
        .ok()
        .map(|id| format!("azureactivedirectoryobjectid eq {}", id.hyphenated()))
}

fn display_filter(fallback: PrincipalFallback, login: &str) -> Option<String> {
    let literal = odata_string(login.trim());
    match fallback {
        PrincipalFallback::None => None,
        PrincipalFallback::DomainName => Some(format!("domainname eq {}", literal)),
        PrincipalFallback::InternalEmail => Some(format!("internalemailaddress eq {}", literal)),
        PrincipalFallback::Either => Some(format!(
            "(domainname eq {0} or internalemailaddress eq {0})",
            literal
        )),
    }
}
