use thiserror::Error;

use crate::types::{
    EdgeId, ParentType, PersonId, PredictionId, PredictionStatus, TenantId, UnionId,
};

/// Integrity and referential outcomes of graph operations.
///
/// `CycleDetected`, `DuplicateEdge`, `DuplicateUnion` and `SelfParentage` are
/// business outcomes reported to the caller. `ConcurrentModification` is the
/// only variant worth retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Edge {parent} -> {child} would create an ancestry cycle via {}", format_path(.path))]
    CycleDetected {
        parent: PersonId,
        child: PersonId,
        /// Ancestry chain from `parent` up to `child` that the edge would close.
        path: Vec<PersonId>,
    },

    #[error("Edge {parent} -> {child} ({edge_type}) already exists as {existing}")]
    DuplicateEdge {
        existing: EdgeId,
        parent: PersonId,
        child: PersonId,
        edge_type: ParentType,
    },

    #[error("An active union {existing} already contains these members")]
    DuplicateUnion { existing: UnionId },

    #[error("Person {person} cannot be their own parent")]
    SelfParentage { person: PersonId },

    #[error("Concurrent modification of tenant {tenant} after {attempts} attempts")]
    ConcurrentModification { tenant: TenantId, attempts: u32 },

    #[error("Person not found: {person} in tenant {tenant}")]
    PersonNotFound { person: PersonId, tenant: TenantId },

    #[error("Person {person} belongs to tenant {actual}, not {expected}")]
    TenantMismatch {
        person: PersonId,
        expected: TenantId,
        actual: TenantId,
    },

    #[error("Prediction not found: {0}")]
    PredictionNotFound(PredictionId),

    #[error("Cannot {action} a prediction in status {from}")]
    InvalidTransition {
        from: PredictionStatus,
        action: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GraphError {
    /// Transient conflicts that a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::ConcurrentModification { .. })
    }

    /// Rejections that describe the state of the graph rather than a fault.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            GraphError::CycleDetected { .. }
                | GraphError::DuplicateEdge { .. }
                | GraphError::DuplicateUnion { .. }
                | GraphError::SelfParentage { .. }
        )
    }

    /// Stable machine-readable tag, used for audit records and prediction failures.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::CycleDetected { .. } => "cycle_detected",
            GraphError::DuplicateEdge { .. } => "duplicate_edge",
            GraphError::DuplicateUnion { .. } => "duplicate_union",
            GraphError::SelfParentage { .. } => "self_parentage",
            GraphError::ConcurrentModification { .. } => "concurrent_modification",
            GraphError::PersonNotFound { .. } => "person_not_found",
            GraphError::TenantMismatch { .. } => "tenant_mismatch",
            GraphError::PredictionNotFound(_) => "prediction_not_found",
            GraphError::InvalidTransition { .. } => "invalid_transition",
            GraphError::InvalidRequest(_) => "invalid_request",
        }
    }
}

fn format_path(path: &[PersonId]) -> String {
    path.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        let tenant = TenantId::new();
        let conflict = GraphError::ConcurrentModification { tenant, attempts: 3 };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_business_outcome());

        let cycle = GraphError::CycleDetected {
            parent: PersonId::new(),
            child: PersonId::new(),
            path: vec![],
        };
        assert!(cycle.is_business_outcome());
        assert!(!cycle.is_retryable());
        assert_eq!(cycle.code(), "cycle_detected");
    }

    #[test]
    fn cycle_message_names_the_path() {
        let (x, y) = (PersonId::new(), PersonId::new());
        let err = GraphError::CycleDetected {
            parent: y,
            child: x,
            path: vec![x, y],
        };
        let msg = err.to_string();
        assert!(msg.contains(&format!("{x} -> {y}")));
    }
}
