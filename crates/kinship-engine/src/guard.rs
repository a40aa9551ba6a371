//! Graph Integrity Guard: the single gate for edge and union writes.
//!
//! Each attempt holds the tenant's async lock, validates against the
//! current [`ActiveGraph`], and writes with the validated graph version as
//! the store's expected version. Lock timeouts and version conflicts are
//! retried with exponential backoff; once the attempts are spent the caller
//! receives `ConcurrentModification`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kinship_audit::AuditSession;
use kinship_core::config::GuardConfig;
use kinship_core::{
    Actor, GraphError, ParentChildEdge, ParentType, PersonId, TenantId, Union, UnionKind,
    UnionMember, UnionRole,
};
use kinship_graph::{GraphStore, StoreError};

use crate::cache::SnapshotCache;
use crate::error::{EngineError, Result};
use crate::graph::ActiveGraph;

type TenantLock = Arc<tokio::sync::Mutex<()>>;

/// Outcome of one guarded attempt.
enum Attempt<T> {
    Done(T),
    /// Lost a race; worth another attempt.
    Conflict(String),
}

/// A committed write and the graph version it produced.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub record: T,
    pub version: u64,
}

pub struct IntegrityGuard {
    config: GuardConfig,
    locks: Mutex<HashMap<TenantId, TenantLock>>,
}

impl IntegrityGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate and insert a parent → child edge.
    #[allow(clippy::too_many_arguments)]
    pub async fn propose_edge<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        cache: &SnapshotCache,
        tenant: TenantId,
        parent: PersonId,
        child: PersonId,
        edge_type: ParentType,
        actor: &Actor,
        session: &mut AuditSession,
    ) -> Result<Committed<ParentChildEdge>> {
        if parent == child {
            return Err(GraphError::SelfParentage { person: parent }.into());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self
                .try_edge(store, cache, tenant, parent, child, edge_type, actor, session)
                .await?;
            match outcome {
                Attempt::Done(committed) => return Ok(committed),
                Attempt::Conflict(reason) => self.back_off(tenant, attempt, &reason, session).await?,
            }
        }
    }

    /// Validate and insert a union of `members`.
    pub async fn propose_union<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        cache: &SnapshotCache,
        tenant: TenantId,
        members: &[PersonId],
        kind: UnionKind,
        session: &mut AuditSession,
    ) -> Result<Committed<Union>> {
        let mut distinct: Vec<PersonId> = Vec::with_capacity(members.len());
        for m in members {
            if !distinct.contains(m) {
                distinct.push(*m);
            }
        }
        if distinct.len() < 2 {
            return Err(GraphError::InvalidRequest(
                "a union needs at least two distinct members".to_string(),
            )
            .into());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_union(store, cache, tenant, &distinct, kind, session).await? {
                Attempt::Done(committed) => return Ok(committed),
                Attempt::Conflict(reason) => self.back_off(tenant, attempt, &reason, session).await?,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_edge<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        cache: &SnapshotCache,
        tenant: TenantId,
        parent: PersonId,
        child: PersonId,
        edge_type: ParentType,
        actor: &Actor,
        session: &mut AuditSession,
    ) -> Result<Attempt<Committed<ParentChildEdge>>> {
        let lock = self.tenant_lock(tenant);
        let wait = Duration::from_millis(self.config.lock_timeout_ms);
        let Ok(_held) = tokio::time::timeout(wait, lock.lock()).await else {
            return Ok(Attempt::Conflict("tenant lock timeout".to_string()));
        };

        let graph = match snapshot(store, cache, tenant).await? {
            Attempt::Done(g) => g,
            Attempt::Conflict(reason) => return Ok(Attempt::Conflict(reason)),
        };

        let pi = require_person(store, &graph, tenant, parent).await?;
        let ci = require_person(store, &graph, tenant, child).await?;

        if let Some(existing) = graph.find_edge(pi, ci, edge_type) {
            return Err(GraphError::DuplicateEdge {
                existing,
                parent,
                child,
                edge_type,
            }
            .into());
        }

        // The edge closes a loop when the child is already an ancestor of the parent.
        if let Some(chain) = graph.ancestry_path(pi, ci) {
            let path: Vec<PersonId> = chain.iter().map(|&i| graph.id_of(i)).collect();
            tracing::warn!(
                tenant = %tenant,
                parent = %parent,
                child = %child,
                depth = path.len(),
                "Edge rejected: ancestry cycle"
            );
            return Err(GraphError::CycleDetected {
                parent,
                child,
                path,
            }
            .into());
        }
        session.note(
            "cycle_check",
            "No ancestry cycle",
            serde_json::json!({ "graph_version": graph.version, "persons": graph.len() }),
        );

        let mut edge = ParentChildEdge::new(tenant, parent, child, edge_type);
        edge.created_by = Some(actor.id.clone());

        match store.insert_edge(&edge, graph.version).await {
            Ok(version) => {
                cache.invalidate(tenant);
                Ok(Attempt::Done(Committed {
                    record: edge,
                    version,
                }))
            }
            Err(StoreError::VersionConflict { expected, actual, .. }) => {
                cache.invalidate(tenant);
                Ok(Attempt::Conflict(format!(
                    "graph moved from version {expected} to {actual}"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn try_union<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        cache: &SnapshotCache,
        tenant: TenantId,
        members: &[PersonId],
        kind: UnionKind,
        session: &mut AuditSession,
    ) -> Result<Attempt<Committed<Union>>> {
        let lock = self.tenant_lock(tenant);
        let wait = Duration::from_millis(self.config.lock_timeout_ms);
        let Ok(_held) = tokio::time::timeout(wait, lock.lock()).await else {
            return Ok(Attempt::Conflict("tenant lock timeout".to_string()));
        };

        let graph = match snapshot(store, cache, tenant).await? {
            Attempt::Done(g) => g,
            Attempt::Conflict(reason) => return Ok(Attempt::Conflict(reason)),
        };

        let mut union_members = Vec::with_capacity(members.len());
        for &member in members {
            let idx = require_person(store, &graph, tenant, member).await?;
            union_members.push(UnionMember {
                person_id: member,
                role: match kind {
                    UnionKind::Marriage => UnionRole::for_sex(graph.sex_of(idx)),
                    UnionKind::Partnership => UnionRole::Partner,
                },
            });
        }

        if let Some(existing) = graph.union_containing(members) {
            return Err(GraphError::DuplicateUnion { existing }.into());
        }
        session.note(
            "union_check",
            "No existing union with these members",
            serde_json::json!({ "graph_version": graph.version, "members": members.len() }),
        );

        let union = Union::new(tenant, kind, union_members);
        match store.insert_union(&union, graph.version).await {
            Ok(version) => {
                cache.invalidate(tenant);
                Ok(Attempt::Done(Committed {
                    record: union,
                    version,
                }))
            }
            Err(StoreError::VersionConflict { expected, actual, .. }) => {
                cache.invalidate(tenant);
                Ok(Attempt::Conflict(format!(
                    "graph moved from version {expected} to {actual}"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sleep before the next attempt, or give up with `ConcurrentModification`.
    async fn back_off(
        &self,
        tenant: TenantId,
        attempt: u32,
        reason: &str,
        session: &mut AuditSession,
    ) -> Result<()> {
        let max_attempts = self.config.max_retries.max(1);
        session.note(
            "conflict",
            reason,
            serde_json::json!({ "attempt": attempt, "max_attempts": max_attempts }),
        );
        if attempt >= max_attempts {
            tracing::warn!(tenant = %tenant, attempts = attempt, reason, "Giving up after conflicts");
            return Err(GraphError::ConcurrentModification {
                tenant,
                attempts: attempt,
            }
            .into());
        }

        let factor = 1u64 << (attempt - 1).min(16);
        let delay = Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(factor));
        tracing::warn!(tenant = %tenant, attempt, reason, delay_ms = delay.as_millis() as u64, "Retrying guarded write");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn tenant_lock(&self, tenant: TenantId) -> TenantLock {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(tenant).or_default())
    }
}

/// Load the graph; a snapshot that raced a foreign write counts as a conflict.
async fn snapshot<S: GraphStore + ?Sized>(
    store: &S,
    cache: &SnapshotCache,
    tenant: TenantId,
) -> Result<Attempt<Arc<ActiveGraph>>> {
    match cache.get(store, tenant).await {
        Ok(graph) => Ok(Attempt::Done(graph)),
        Err(EngineError::Store(StoreError::VersionConflict { .. })) => {
            Ok(Attempt::Conflict("snapshot raced a write".to_string()))
        }
        Err(e) => Err(e),
    }
}

/// Resolve a person to its dense index, distinguishing a person of another
/// tenant from one that does not exist (or was deleted).
pub(crate) async fn require_person<S: GraphStore + ?Sized>(
    store: &S,
    graph: &ActiveGraph,
    tenant: TenantId,
    person: PersonId,
) -> Result<usize> {
    if let Some(idx) = graph.index_of(&person) {
        return Ok(idx);
    }
    match store.find_person(person).await? {
        Some(found) if found.tenant_id != tenant => Err(GraphError::TenantMismatch {
            person,
            expected: tenant,
            actual: found.tenant_id,
        }
        .into()),
        _ => Err(GraphError::PersonNotFound { person, tenant }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::{Person, PersonName, Sex};
    use kinship_graph::MemoryGraphStore;

    async fn seed(store: &MemoryGraphStore, tenant: TenantId, given: &str, sex: Sex) -> PersonId {
        let person = Person::new(tenant, sex, PersonName::new("en", given));
        let id = person.id;
        store.insert_person(person).await;
        id
    }

    fn session(tenant: TenantId) -> AuditSession {
        AuditSession::new(tenant, &Actor::new("tester"), "propose_edge")
    }

    fn fast_guard() -> IntegrityGuard {
        IntegrityGuard::new(GuardConfig {
            max_retries: 3,
            retry_backoff_ms: 1,
            lock_timeout_ms: 200,
        })
    }

    #[tokio::test]
    async fn test_reverse_edge_is_a_cycle() {
        let store = MemoryGraphStore::new();
        let cache = SnapshotCache::new();
        let guard = fast_guard();
        let tenant = TenantId::new();
        let x = seed(&store, tenant, "x", Sex::Male).await;
        let y = seed(&store, tenant, "y", Sex::Male).await;
        let actor = Actor::new("tester");

        guard
            .propose_edge(&store, &cache, tenant, x, y, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap();

        let err = guard
            .propose_edge(&store, &cache, tenant, y, x, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap_err();
        match err.as_graph() {
            Some(GraphError::CycleDetected { path, .. }) => assert_eq!(path, &vec![y, x]),
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_parentage_and_duplicates() {
        let store = MemoryGraphStore::new();
        let cache = SnapshotCache::new();
        let guard = fast_guard();
        let tenant = TenantId::new();
        let a = seed(&store, tenant, "a", Sex::Female).await;
        let b = seed(&store, tenant, "b", Sex::Male).await;
        let actor = Actor::new("tester");

        let err = guard
            .propose_edge(&store, &cache, tenant, a, a, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap_err();
        assert!(matches!(err.as_graph(), Some(GraphError::SelfParentage { .. })));

        let first = guard
            .propose_edge(&store, &cache, tenant, a, b, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap();
        let err = guard
            .propose_edge(&store, &cache, tenant, a, b, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap_err();
        match err.as_graph() {
            Some(GraphError::DuplicateEdge { existing, .. }) => assert_eq!(*existing, first.record.id),
            other => panic!("expected DuplicateEdge, got {other:?}"),
        }

        // A different type between the same pair is a different triple.
        guard
            .propose_edge(&store, &cache, tenant, a, b, ParentType::Guardian, &actor, &mut session(tenant))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_persons() {
        let store = MemoryGraphStore::new();
        let cache = SnapshotCache::new();
        let guard = fast_guard();
        let (tenant, other) = (TenantId::new(), TenantId::new());
        let a = seed(&store, tenant, "a", Sex::Male).await;
        let foreign = seed(&store, other, "f", Sex::Male).await;
        let actor = Actor::new("tester");

        let err = guard
            .propose_edge(&store, &cache, tenant, a, PersonId::new(), ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap_err();
        assert!(matches!(err.as_graph(), Some(GraphError::PersonNotFound { .. })));

        let err = guard
            .propose_edge(&store, &cache, tenant, a, foreign, ParentType::Biological, &actor, &mut session(tenant))
            .await
            .unwrap_err();
        match err.as_graph() {
            Some(GraphError::TenantMismatch { actual, .. }) => assert_eq!(*actual, other),
            other => panic!("expected TenantMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_union_rules() {
        let store = MemoryGraphStore::new();
        let cache = SnapshotCache::new();
        let guard = fast_guard();
        let tenant = TenantId::new();
        let h = seed(&store, tenant, "h", Sex::Male).await;
        let w = seed(&store, tenant, "w", Sex::Female).await;

        let err = guard
            .propose_union(&store, &cache, tenant, &[h, h], UnionKind::Marriage, &mut session(tenant))
            .await
            .unwrap_err();
        assert!(matches!(err.as_graph(), Some(GraphError::InvalidRequest(_))));

        let union = guard
            .propose_union(&store, &cache, tenant, &[h, w], UnionKind::Marriage, &mut session(tenant))
            .await
            .unwrap();
        assert_eq!(union.record.members[0].role, UnionRole::Husband);
        assert_eq!(union.record.members[1].role, UnionRole::Wife);

        let err = guard
            .propose_union(&store, &cache, tenant, &[w, h], UnionKind::Marriage, &mut session(tenant))
            .await
            .unwrap_err();
        assert!(matches!(err.as_graph(), Some(GraphError::DuplicateUnion { .. })));
    }

    #[tokio::test]
    async fn test_stale_writer_gets_concurrent_modification() {
        /// A store whose versioned writes always lose the race.
        struct Contended(MemoryGraphStore);

        #[async_trait::async_trait]
        impl GraphStore for Contended {
            async fn load_snapshot(&self, t: TenantId) -> kinship_graph::Result<kinship_graph::TenantSnapshot> {
                self.0.load_snapshot(t).await
            }
            async fn graph_version(&self, t: TenantId) -> kinship_graph::Result<u64> {
                self.0.graph_version(t).await
            }
            async fn find_person(&self, p: PersonId) -> kinship_graph::Result<Option<Person>> {
                self.0.find_person(p).await
            }
            async fn insert_edge(&self, e: &ParentChildEdge, v: u64) -> kinship_graph::Result<u64> {
                Err(StoreError::VersionConflict { tenant: e.tenant_id, expected: v, actual: v + 1 })
            }
            async fn insert_union(&self, u: &Union, v: u64) -> kinship_graph::Result<u64> {
                self.0.insert_union(u, v).await
            }
            async fn list_predictions(&self, t: TenantId) -> kinship_graph::Result<Vec<kinship_core::PredictedRelationship>> {
                self.0.list_predictions(t).await
            }
            async fn get_prediction(&self, id: kinship_core::PredictionId) -> kinship_graph::Result<Option<kinship_core::PredictedRelationship>> {
                self.0.get_prediction(id).await
            }
            async fn insert_predictions(&self, p: &[kinship_core::PredictedRelationship]) -> kinship_graph::Result<usize> {
                self.0.insert_predictions(p).await
            }
            async fn update_prediction(&self, p: &kinship_core::PredictedRelationship, s: kinship_core::PredictionStatus) -> kinship_graph::Result<()> {
                self.0.update_prediction(p, s).await
            }
        }

        let inner = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let a = seed(&inner, tenant, "a", Sex::Male).await;
        let b = seed(&inner, tenant, "b", Sex::Male).await;
        let store = Contended(inner);
        let cache = SnapshotCache::new();
        let guard = fast_guard();

        let mut audit = session(tenant);
        let err = guard
            .propose_edge(&store, &cache, tenant, a, b, ParentType::Biological, &Actor::new("t"), &mut audit)
            .await
            .unwrap_err();
        match err.as_graph() {
            Some(GraphError::ConcurrentModification { attempts, .. }) => assert_eq!(*attempts, 3),
            other => panic!("expected ConcurrentModification, got {other:?}"),
        }
        assert!(err.as_graph().unwrap().is_retryable());
    }
}
