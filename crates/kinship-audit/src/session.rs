//! Builder-pattern recorder for audit entries.
//!
//! ```no_run
//! # use kinship_audit::{AuditOutcome, AuditSession};
//! # use kinship_core::{Actor, TenantId};
//! let mut session = AuditSession::new(TenantId::new(), &Actor::new("reviewer-7"), "propose_edge");
//! session.set_subject(serde_json::json!({"parent": "…", "child": "…"}));
//! session.note("cycle_check", "No ancestry cycle", serde_json::json!({"visited": 12}));
//! let entry = session.finish(AuditOutcome::Accepted);
//! assert!(entry.content_hash.is_some());
//! ```

use chrono::Utc;
use kinship_core::{Actor, TenantId};

use crate::{AuditEntry, AuditId, AuditNote, AuditOutcome};

/// Records one operation incrementally.
pub struct AuditSession {
    entry: AuditEntry,
}

impl AuditSession {
    pub fn new(tenant_id: TenantId, actor: &Actor, operation: &str) -> Self {
        Self {
            entry: AuditEntry {
                id: AuditId::new(),
                tenant_id,
                actor: actor.id.clone(),
                operation: operation.to_string(),
                subject: serde_json::Value::Null,
                notes: Vec::new(),
                outcome: None,
                started_at: Utc::now(),
                completed_at: None,
                content_hash: None,
            },
        }
    }

    pub fn set_subject(&mut self, subject: serde_json::Value) {
        self.entry.subject = subject;
    }

    pub fn note(&mut self, kind: &str, message: &str, details: serde_json::Value) {
        self.entry.notes.push(AuditNote {
            kind: kind.to_string(),
            message: message.to_string(),
            details,
            timestamp: Utc::now(),
        });
    }

    pub fn id(&self) -> AuditId {
        self.entry.id
    }

    /// Set the outcome and completion time, then seal with the content hash.
    pub fn finish(mut self, outcome: AuditOutcome) -> AuditEntry {
        self.entry.outcome = Some(outcome);
        self.entry.completed_at = Some(Utc::now());
        let hash = self.entry.compute_hash();
        self.entry.content_hash = Some(hash);
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_seals_entry() {
        let tenant = TenantId::new();
        let mut session = AuditSession::new(tenant, &Actor::new("reviewer"), "resolve_prediction");
        session.note("transition", "new -> confirmed", serde_json::json!({}));
        let id = session.id();
        let entry = session.finish(AuditOutcome::Accepted);

        assert_eq!(entry.id, id);
        assert_eq!(entry.tenant_id, tenant);
        assert_eq!(entry.actor, "reviewer");
        assert_eq!(entry.notes.len(), 1);
        assert!(entry.completed_at.is_some());
        assert!(entry.is_accepted());
        assert!(entry.verify_integrity());
    }

    #[test]
    fn rejected_outcome_is_recorded() {
        let session = AuditSession::new(TenantId::new(), &Actor::system(), "propose_edge");
        let entry = session.finish(AuditOutcome::Rejected {
            code: "cycle_detected".into(),
            reason: "would close a loop".into(),
        });
        assert!(!entry.is_accepted());
        assert!(entry.verify_integrity());
    }
}
