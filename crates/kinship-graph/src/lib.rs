//! kinship-graph: store adapter for people, edges, unions and predictions.
//!
//! Every read and write the kinship engine performs goes through the
//! [`GraphStore`] trait. Reads are tenant-scoped snapshots; edge and union
//! writes carry the graph version the caller validated against, so a write
//! based on stale data is refused with [`StoreError::VersionConflict`].
//!
//! Two backends ship: [`MemoryGraphStore`] for tests and embedding, and
//! [`Neo4jStore`] for production.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{Neo4jStore, StoreConfig};
pub use memory::MemoryGraphStore;
pub use store::{GraphStore, Result, StoreError, TenantSnapshot};
