//! Event types published after graph mutations and analysis runs.
//!
//! Subscribers in the surrounding application use these to refresh caches
//! and notify reviewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    BatchId, EdgeId, ParentType, PersonId, PredictionId, PredictionStatus, TenantId, UnionId,
};

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by the kinship core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinshipEvent {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    /// Identity of the acting user.
    pub actor: String,
    pub payload: EventPayload,
}

impl KinshipEvent {
    pub fn new(tenant_id: TenantId, actor: &str, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            tenant_id,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            payload,
        }
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    // ── Graph mutations ───────────────────────────────────────
    /// A parent-child edge passed the integrity checks and was committed.
    EdgeCreated {
        edge_id: EdgeId,
        parent_id: PersonId,
        child_id: PersonId,
        edge_type: ParentType,
        graph_version: u64,
    },
    /// A proposed edge was rejected.
    EdgeRejected {
        parent_id: PersonId,
        child_id: PersonId,
        reason: String,
    },
    /// A union passed the integrity checks and was committed.
    UnionCreated {
        union_id: UnionId,
        members: Vec<PersonId>,
        graph_version: u64,
    },

    // ── Analysis runs ─────────────────────────────────────────
    DuplicateScanCompleted {
        candidates: usize,
        duration_ms: u64,
    },
    PredictionScanCompleted {
        batch_id: BatchId,
        created: usize,
        skipped_existing: usize,
        duration_ms: u64,
    },

    // ── Review ────────────────────────────────────────────────
    PredictionResolved {
        prediction_id: PredictionId,
        status: PredictionStatus,
        failure: Option<String>,
    },
}
