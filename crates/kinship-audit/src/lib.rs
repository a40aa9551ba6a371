//! kinship-audit: tamper-evident record of graph mutations and reviews.
//!
//! Every gated edge or union write, every prediction scan, and every reviewer
//! action produces an [`AuditEntry`]: who acted, on what, the intermediate
//! checks, and the outcome. Each entry is content-hashed with BLAKE3 so any
//! later modification is detectable.

pub mod hash;
pub mod session;
pub mod store;

pub use session::AuditSession;
pub use store::{AuditError, AuditLog, AuditQuery, FileAuditLog, MemoryAuditLog};

use chrono::{DateTime, Utc};
use kinship_core::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Core Types ───────────────────────────────────────────────────

/// Unique identifier for an audit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AuditId(pub Uuid);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An intermediate observation recorded while an operation ran
/// (e.g. "lock acquired", "cycle check passed").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditNote {
    /// Short machine-readable tag (e.g. "cycle_check", "retry").
    pub kind: String,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// How the audited operation ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuditOutcome {
    Accepted,
    /// Rejected by an integrity rule; `code` is the stable error tag.
    Rejected { code: String, reason: String },
    /// Aborted by an infrastructure failure.
    Failed { reason: String },
}

/// The complete audit record of one operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: AuditId,
    pub tenant_id: TenantId,
    /// Identity of the acting user.
    pub actor: String,
    /// Operation name (e.g. "propose_edge", "resolve_prediction").
    pub operation: String,
    /// Ids and parameters the operation acted on.
    pub subject: serde_json::Value,
    pub notes: Vec<AuditNote>,
    pub outcome: Option<AuditOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// BLAKE3 content hash (hex), set on finalization.
    pub content_hash: Option<String>,
}

impl AuditEntry {
    /// Compute the BLAKE3 hash of the entry's content.
    /// The hash covers all fields except `content_hash` itself.
    pub fn compute_hash(&self) -> String {
        hash::compute_entry_hash(self)
    }

    /// Verify that the stored content_hash matches a freshly computed hash.
    pub fn verify_integrity(&self) -> bool {
        match &self.content_hash {
            Some(stored) => stored == &self.compute_hash(),
            None => false,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Some(AuditOutcome::Accepted))
    }
}
