//! BLAKE3 content hashing for tamper evidence.

use serde::Serialize;

use crate::{AuditEntry, AuditId, AuditNote, AuditOutcome};

/// Hashable view of an entry (excludes content_hash).
#[derive(Serialize)]
struct HashableEntry<'a> {
    id: &'a AuditId,
    tenant_id: &'a kinship_core::TenantId,
    actor: &'a str,
    operation: &'a str,
    subject: &'a serde_json::Value,
    notes: &'a [AuditNote],
    outcome: &'a Option<AuditOutcome>,
    started_at: &'a chrono::DateTime<chrono::Utc>,
    completed_at: &'a Option<chrono::DateTime<chrono::Utc>>,
}

/// Serializes all fields except `content_hash` to JSON, hashes the bytes
/// with BLAKE3 and returns the hex digest.
pub fn compute_entry_hash(entry: &AuditEntry) -> String {
    let hashable = HashableEntry {
        id: &entry.id,
        tenant_id: &entry.tenant_id,
        actor: &entry.actor,
        operation: &entry.operation,
        subject: &entry.subject,
        notes: &entry.notes,
        outcome: &entry.outcome,
        started_at: &entry.started_at,
        completed_at: &entry.completed_at,
    };

    // Plain data with string keys; serialization cannot fail.
    let json = serde_json::to_vec(&hashable).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}
