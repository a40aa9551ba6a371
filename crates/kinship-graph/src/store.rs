//! The store contract consumed by the kinship engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kinship_core::{
    ParentChildEdge, Person, PersonId, PersonLink, PredictedRelationship, PredictionId,
    PredictionStatus, TenantId, Union,
};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    /// The tenant graph changed since the caller's snapshot.
    #[error("Graph version conflict in tenant {tenant}: expected {expected}, found {actual}")]
    VersionConflict {
        tenant: TenantId,
        expected: u64,
        actual: u64,
    },

    /// A prediction was resolved by someone else in the meantime.
    #[error("Prediction {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: PredictionId,
        expected: PredictionStatus,
        actual: PredictionStatus,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything recorded for one tenant at one graph version.
///
/// Soft-deleted records are included; consumers decide what is active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantSnapshot {
    pub tenant_id: TenantId,
    pub version: u64,
    pub persons: Vec<Person>,
    pub edges: Vec<ParentChildEdge>,
    pub unions: Vec<Union>,
    /// Links where either side belongs to this tenant.
    pub links: Vec<PersonLink>,
}

/// Tenant-scoped access to the kinship graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Load the full tenant graph. The snapshot is internally consistent:
    /// all records belong to `version`.
    async fn load_snapshot(&self, tenant: TenantId) -> Result<TenantSnapshot>;

    /// Current graph version; 0 for a tenant never written to.
    async fn graph_version(&self, tenant: TenantId) -> Result<u64>;

    /// Find a person in any tenant. Soft-deleted persons are returned too.
    async fn find_person(&self, person: PersonId) -> Result<Option<Person>>;

    /// Insert an edge if the tenant is still at `expected_version`.
    /// Returns the new version.
    async fn insert_edge(&self, edge: &ParentChildEdge, expected_version: u64) -> Result<u64>;

    /// Insert a union if the tenant is still at `expected_version`.
    /// Returns the new version.
    async fn insert_union(&self, union: &Union, expected_version: u64) -> Result<u64>;

    async fn list_predictions(&self, tenant: TenantId) -> Result<Vec<PredictedRelationship>>;

    async fn get_prediction(&self, id: PredictionId) -> Result<Option<PredictedRelationship>>;

    /// Insert predictions whose key is not yet recorded; existing rows are
    /// left untouched whatever their status. Returns how many were inserted.
    async fn insert_predictions(&self, predictions: &[PredictedRelationship]) -> Result<usize>;

    /// Replace a prediction row if its stored status is still `expected`.
    async fn update_prediction(
        &self,
        prediction: &PredictedRelationship,
        expected: PredictionStatus,
    ) -> Result<()>;
}
