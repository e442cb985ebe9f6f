use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::CallerIdentity;
use crate::download::{AccessDecision, ResolvedFile};
use crate::logging::sanitize_log_message;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub subject_key: String,
    pub principal_id: Option<String>,
    pub container_id: String,
    pub item_id: String,
    pub record_id: Option<String>,
    pub decision: AccessDecision,
}

impl AuditEntry {
    pub fn new(
        trace_id: &str,
        identity: &CallerIdentity,
        file: &ResolvedFile,
        principal_id: Option<&str>,
        decision: AccessDecision,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            trace_id: trace_id.to_string(),
            subject_key: identity.subject_key.clone(),
            principal_id: principal_id.map(str::to_string),
            container_id: file.container_id.clone(),
            item_id: file.item_id.clone(),
            record_id: file.business_record_id.clone(),
            decision,
        }
    }
}

/// Emit one access decision on the `audit` target.
pub fn audit_access_decision(entry: &AuditEntry, display_principal: Option<&str>) {
    let login = display_principal.map(sanitize_log_message).unwrap_or_default();

    info!(
        target: "audit",
        audit_type = "file_access",
        trace_id = %entry.trace_id,
        subject_key = %entry.subject_key,
        display_principal = %login,
        principal_id = entry.principal_id.as_deref().unwrap_or(""),
        container_id = %entry.container_id,
        item_id = %entry.item_id,
        record_id = entry.record_id.as_deref().unwrap_or(""),
        decision = entry.decision.as_str(),
        allowed = entry.decision.is_allowed(),
        "Access decision"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn file() -> ResolvedFile {
        ResolvedFile {
            container_id: "b!drive".to_string(),
            item_id: "01ITEM".to_string(),
            display_name: "receipt.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            business_record_id: Some("6a1c".to_string()),
        }
    }

    #[test]
    #[traced_test]
    fn test_audit_access_decision() {
        let identity = CallerIdentity {
            subject_key: "oid-123".to_string(),
            display_principal: Some("ana.silva@contoso.com".to_string()),
        };
        let entry = AuditEntry::new("trace456", &identity, &file(), Some("u-1"), AccessDecision::Allowed);

        audit_access_decision(&entry, identity.display_principal.as_deref());

        assert!(logs_contain("oid-123"));
        assert!(logs_contain("allowed"));
        // Login names are masked in audit output
        assert!(!logs_contain("ana.silva@contoso.com"));
        assert!(logs_contain("display_principal=***@contoso.com"));
    }

    #[test]
    fn test_audit_entry_serializes_decision() {
        let identity = CallerIdentity {
            subject_key: "oid-123".to_string(),
            display_principal: None,
        };
        let entry = AuditEntry::new("t", &identity, &file(), None, AccessDecision::DeniedNoPrincipal);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["decision"], "denied_no_principal");
        assert_eq!(json["principal_id"], serde_json::Value::Null);
    }
}
