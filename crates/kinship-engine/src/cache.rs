//! Per-tenant cache of active graphs, keyed by graph version.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use kinship_core::TenantId;
use kinship_graph::GraphStore;

use crate::error::Result;
use crate::graph::ActiveGraph;

/// Reuses the last built [`ActiveGraph`] of a tenant while the store's graph
/// version is unchanged. A version mismatch (a write by this or any other
/// process) triggers a rebuild.
#[derive(Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<TenantId, Arc<ActiveGraph>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        tenant: TenantId,
    ) -> Result<Arc<ActiveGraph>> {
        let current = store.graph_version(tenant).await?;
        if let Some(graph) = self.cached(tenant) {
            if graph.version == current {
                return Ok(graph);
            }
        }

        let snapshot = store.load_snapshot(tenant).await?;
        let graph = Arc::new(ActiveGraph::from_snapshot(&snapshot));
        tracing::debug!(tenant = %tenant, version = graph.version, "Snapshot cache refreshed");

        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let keep = entries
            .get(&tenant)
            .map(|existing| existing.version <= graph.version)
            .unwrap_or(true);
        if keep {
            entries.insert(tenant, Arc::clone(&graph));
        }
        Ok(graph)
    }

    pub fn invalidate(&self, tenant: TenantId) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(&tenant);
    }

    fn cached(&self, tenant: TenantId) -> Option<Arc<ActiveGraph>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.get(&tenant).cloned()
    }
}
