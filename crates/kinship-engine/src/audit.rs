//! Audit session helpers for engine operations.

use kinship_audit::{AuditEntry, AuditLog, AuditOutcome, AuditSession};
use kinship_core::{Actor, TenantId};

use crate::error::EngineError;

/// Open an audit session for one engine operation.
pub fn start_session(
    tenant_id: TenantId,
    actor: &Actor,
    operation: &str,
    subject: serde_json::Value,
) -> AuditSession {
    let mut session = AuditSession::new(tenant_id, actor, operation);
    session.set_subject(subject);
    session
}

/// How an engine result is recorded.
pub fn outcome_of<T>(result: &Result<T, EngineError>) -> AuditOutcome {
    match result {
        Ok(_) => AuditOutcome::Accepted,
        Err(EngineError::Graph(e)) => AuditOutcome::Rejected {
            code: e.code().to_string(),
            reason: e.to_string(),
        },
        Err(e) => AuditOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

/// Finalize the session and append it to the log.
///
/// A failing audit write is logged, never surfaced: the audited operation
/// has already happened.
pub fn finalize_and_store(
    session: AuditSession,
    outcome: AuditOutcome,
    log: &dyn AuditLog,
) -> AuditEntry {
    let entry = session.finish(outcome);
    match log.append(&entry) {
        Ok(()) => {
            tracing::debug!(audit_id = %entry.id, operation = %entry.operation, "Audit entry recorded");
        }
        Err(e) => {
            tracing::warn!(audit_id = %entry.id, error = %e, "Failed to store audit entry");
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_audit::{AuditQuery, MemoryAuditLog};
    use kinship_core::{GraphError, PersonId};

    #[test]
    fn test_rejection_is_recorded_with_code() {
        let log = MemoryAuditLog::new();
        let tenant = TenantId::new();
        let session = start_session(tenant, &Actor::new("u1"), "propose_edge", serde_json::json!({}));
        let person = PersonId::new();
        let result: Result<(), EngineError> =
            Err(GraphError::SelfParentage { person }.into());

        let entry = finalize_and_store(session, outcome_of(&result), &log);
        assert!(matches!(
            entry.outcome,
            Some(AuditOutcome::Rejected { ref code, .. }) if code == "self_parentage"
        ));
        assert_eq!(log.list(&AuditQuery::for_tenant(tenant)).unwrap().len(), 1);
    }
}
