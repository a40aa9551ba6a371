//! In-process graph store.
//!
//! Holds every tenant in one `RwLock`ed map. Besides the [`GraphStore`]
//! contract it exposes the record-level writes the surrounding CRUD layer
//! performs (persons, links, soft deletes), which bump the tenant version
//! like any other mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use kinship_core::{
    EdgeId, ParentChildEdge, Person, PersonId, PersonLink, PredictedRelationship, PredictionId,
    PredictionKey, PredictionStatus, TenantId, Union, UnionId,
};

use crate::store::{GraphStore, Result, StoreError, TenantSnapshot};

#[derive(Default)]
struct TenantData {
    version: u64,
    persons: Vec<Person>,
    edges: Vec<ParentChildEdge>,
    unions: Vec<Union>,
}

#[derive(Default)]
struct State {
    tenants: HashMap<TenantId, TenantData>,
    person_tenant: HashMap<PersonId, TenantId>,
    links: Vec<PersonLink>,
    predictions: Vec<PredictedRelationship>,
    prediction_keys: HashMap<PredictionKey, PredictionId>,
}

impl State {
    fn tenant_mut(&mut self, tenant: TenantId) -> &mut TenantData {
        self.tenants.entry(tenant).or_default()
    }

    fn bump(&mut self, tenant: TenantId) -> u64 {
        let data = self.tenant_mut(tenant);
        data.version += 1;
        data.version
    }

    fn check_version(&self, tenant: TenantId, expected: u64) -> Result<()> {
        let actual = self.tenants.get(&tenant).map(|t| t.version).unwrap_or(0);
        if actual != expected {
            return Err(StoreError::VersionConflict {
                tenant,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Thread-safe in-memory [`GraphStore`].
#[derive(Default)]
pub struct MemoryGraphStore {
    state: RwLock<State>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Record-level writes (CRUD layer) ─────────────────────────

    pub async fn insert_person(&self, person: Person) -> u64 {
        let mut state = self.state.write().await;
        let tenant = person.tenant_id;
        state.person_tenant.insert(person.id, tenant);
        state.tenant_mut(tenant).persons.push(person);
        state.bump(tenant)
    }

    pub async fn soft_delete_person(&self, person: PersonId) -> Result<u64> {
        let mut state = self.state.write().await;
        let tenant = *state.person_tenant.get(&person).ok_or(StoreError::NotFound {
            kind: "Person",
            id: person.to_string(),
        })?;
        let now = Utc::now();
        if let Some(p) = state
            .tenant_mut(tenant)
            .persons
            .iter_mut()
            .find(|p| p.id == person)
        {
            p.deleted_at = Some(now);
        }
        Ok(state.bump(tenant))
    }

    /// Insert an edge without any integrity check, as a bulk import would.
    pub async fn insert_edge_unchecked(&self, edge: ParentChildEdge) -> u64 {
        let mut state = self.state.write().await;
        let tenant = edge.tenant_id;
        state.tenant_mut(tenant).edges.push(edge);
        state.bump(tenant)
    }

    pub async fn soft_delete_edge(&self, tenant: TenantId, edge: EdgeId) -> Result<u64> {
        let mut state = self.state.write().await;
        let found = state
            .tenant_mut(tenant)
            .edges
            .iter_mut()
            .find(|e| e.id == edge)
            .ok_or(StoreError::NotFound {
                kind: "ParentChildEdge",
                id: edge.to_string(),
            })?;
        found.deleted_at = Some(Utc::now());
        Ok(state.bump(tenant))
    }

    /// Insert a union without any integrity check.
    pub async fn insert_union_unchecked(&self, union: Union) -> u64 {
        let mut state = self.state.write().await;
        let tenant = union.tenant_id;
        state.tenant_mut(tenant).unions.push(union);
        state.bump(tenant)
    }

    pub async fn soft_delete_union(&self, tenant: TenantId, union: UnionId) -> Result<u64> {
        let mut state = self.state.write().await;
        let found = state
            .tenant_mut(tenant)
            .unions
            .iter_mut()
            .find(|u| u.id == union)
            .ok_or(StoreError::NotFound {
                kind: "Union",
                id: union.to_string(),
            })?;
        found.deleted_at = Some(Utc::now());
        Ok(state.bump(tenant))
    }

    pub async fn insert_link(&self, link: PersonLink) {
        let mut state = self.state.write().await;
        let (source, target) = (link.source_tenant, link.target_tenant);
        state.links.push(link);
        state.bump(source);
        if target != source {
            state.bump(target);
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn load_snapshot(&self, tenant: TenantId) -> Result<TenantSnapshot> {
        let state = self.state.read().await;
        let links = state
            .links
            .iter()
            .filter(|l| l.source_tenant == tenant || l.target_tenant == tenant)
            .cloned()
            .collect();

        Ok(match state.tenants.get(&tenant) {
            Some(data) => TenantSnapshot {
                tenant_id: tenant,
                version: data.version,
                persons: data.persons.clone(),
                edges: data.edges.clone(),
                unions: data.unions.clone(),
                links,
            },
            None => TenantSnapshot {
                tenant_id: tenant,
                links,
                ..Default::default()
            },
        })
    }

    async fn graph_version(&self, tenant: TenantId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.tenants.get(&tenant).map(|t| t.version).unwrap_or(0))
    }

    async fn find_person(&self, person: PersonId) -> Result<Option<Person>> {
        let state = self.state.read().await;
        let Some(tenant) = state.person_tenant.get(&person) else {
            return Ok(None);
        };
        Ok(state
            .tenants
            .get(tenant)
            .and_then(|t| t.persons.iter().find(|p| p.id == person))
            .cloned())
    }

    async fn insert_edge(&self, edge: &ParentChildEdge, expected_version: u64) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_version(edge.tenant_id, expected_version)?;
        state.tenant_mut(edge.tenant_id).edges.push(edge.clone());
        Ok(state.bump(edge.tenant_id))
    }

    async fn insert_union(&self, union: &Union, expected_version: u64) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_version(union.tenant_id, expected_version)?;
        state.tenant_mut(union.tenant_id).unions.push(union.clone());
        Ok(state.bump(union.tenant_id))
    }

    async fn list_predictions(&self, tenant: TenantId) -> Result<Vec<PredictedRelationship>> {
        let state = self.state.read().await;
        Ok(state
            .predictions
            .iter()
            .filter(|p| p.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn get_prediction(&self, id: PredictionId) -> Result<Option<PredictedRelationship>> {
        let state = self.state.read().await;
        Ok(state.predictions.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_predictions(&self, predictions: &[PredictedRelationship]) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for prediction in predictions {
            let key = prediction.key();
            if state.prediction_keys.contains_key(&key) {
                continue;
            }
            state.prediction_keys.insert(key, prediction.id);
            state.predictions.push(prediction.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update_prediction(
        &self,
        prediction: &PredictedRelationship,
        expected: PredictionStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let row = state
            .predictions
            .iter_mut()
            .find(|p| p.id == prediction.id)
            .ok_or(StoreError::NotFound {
                kind: "Prediction",
                id: prediction.id.to_string(),
            })?;
        if row.status != expected {
            return Err(StoreError::StatusConflict {
                id: prediction.id,
                expected,
                actual: row.status,
            });
        }
        *row = prediction.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::{
        BatchId, ConfidenceLevel, ParentType, PersonName, PredictedType, RuleKind, Sex,
    };

    fn make_person(tenant: TenantId, given: &str) -> Person {
        Person::new(tenant, Sex::Male, PersonName::new("en", given))
    }

    fn make_prediction(tenant: TenantId, source: PersonId, target: PersonId) -> PredictedRelationship {
        PredictedRelationship {
            id: PredictionId::new(),
            tenant_id: tenant,
            batch_id: BatchId::new(),
            source_id: source,
            target_id: target,
            predicted_type: PredictedType::ParentChild,
            edge_type: Some(ParentType::Biological),
            rule: RuleKind::SpouseChildGap,
            confidence: 80,
            level: ConfidenceLevel::Medium,
            explanation: "test".into(),
            status: PredictionStatus::New,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
            dismiss_reason: None,
            last_failure: None,
            applied_ref: None,
        }
    }

    #[tokio::test]
    async fn test_versioned_edge_insert() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let a = make_person(tenant, "a");
        let b = make_person(tenant, "b");
        let (a_id, b_id) = (a.id, b.id);
        store.insert_person(a).await;
        let version = store.insert_person(b).await;
        assert_eq!(version, 2);

        let edge = ParentChildEdge::new(tenant, a_id, b_id, ParentType::Biological);
        assert_eq!(store.insert_edge(&edge, 2).await.unwrap(), 3);

        let stale = ParentChildEdge::new(tenant, b_id, a_id, ParentType::Biological);
        let err = store.insert_edge(&stale, 2).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 2, actual: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_soft_deleted_records() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let person = make_person(tenant, "a");
        let id = person.id;
        store.insert_person(person).await;
        store.soft_delete_person(id).await.unwrap();

        let snapshot = store.load_snapshot(tenant).await.unwrap();
        assert_eq!(snapshot.persons.len(), 1);
        assert!(!snapshot.persons[0].is_active());
        assert_eq!(snapshot.version, 2);

        let found = store.find_person(id).await.unwrap().unwrap();
        assert_eq!(found.tenant_id, tenant);
    }

    #[tokio::test]
    async fn test_links_visible_from_both_tenants() {
        let store = MemoryGraphStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        store
            .insert_link(PersonLink::new(t1, PersonId::new(), t2, PersonId::new(), "reviewer"))
            .await;

        assert_eq!(store.load_snapshot(t1).await.unwrap().links.len(), 1);
        assert_eq!(store.load_snapshot(t2).await.unwrap().links.len(), 1);
        assert!(store.load_snapshot(TenantId::new()).await.unwrap().links.is_empty());
    }

    #[tokio::test]
    async fn test_prediction_keys_are_unique() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let (s, t) = (PersonId::new(), PersonId::new());

        let first = make_prediction(tenant, s, t);
        assert_eq!(store.insert_predictions(&[first.clone()]).await.unwrap(), 1);

        let again = make_prediction(tenant, s, t);
        assert_eq!(store.insert_predictions(&[again]).await.unwrap(), 0);
        assert_eq!(store.list_predictions(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_prediction_checks_status() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let mut prediction = make_prediction(tenant, PersonId::new(), PersonId::new());
        store.insert_predictions(&[prediction.clone()]).await.unwrap();

        prediction.status = PredictionStatus::Confirmed;
        store
            .update_prediction(&prediction, PredictionStatus::New)
            .await
            .unwrap();

        prediction.status = PredictionStatus::Dismissed;
        let err = store
            .update_prediction(&prediction, PredictionStatus::New)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));
    }
}
