//! Read operations against Neo4j.
//!
//! Each record is stored with its full serde form in a `payload` property;
//! the indexed scalar properties (`tenant_id`, `id`, `status`, ...) exist for
//! matching only.

use neo4rs::query;
use serde::de::DeserializeOwned;

use kinship_core::{
    ParentChildEdge, Person, PersonId, PersonLink, PredictedRelationship, PredictionId, TenantId,
    Union,
};

use crate::client::Neo4jStore;
use crate::store::{Result, StoreError, TenantSnapshot};

/// Snapshot reads retried when a concurrent write moved the version.
const SNAPSHOT_ATTEMPTS: usize = 3;

impl Neo4jStore {
    pub(crate) async fn fetch_version(&self, tenant_id: &TenantId) -> Result<u64> {
        let q = query(
            "MATCH (g:TenantGraph {tenant_id: $tenant_id})
             RETURN g.version AS version",
        )
        .param("tenant_id", tenant_id.0.to_string());

        match self.query_one(q).await? {
            Some(row) => {
                let version: i64 = row
                    .get("version")
                    .map_err(|e| StoreError::Serialization(format!("version: {e}")))?;
                Ok(version.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    /// Read the tenant graph, re-reading when the version moved mid-read.
    pub(crate) async fn fetch_snapshot(&self, tenant_id: &TenantId) -> Result<TenantSnapshot> {
        let mut before = self.fetch_version(tenant_id).await?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let snapshot = self.read_tenant(tenant_id, before).await?;
            let after = self.fetch_version(tenant_id).await?;
            if after == before {
                tracing::debug!(
                    tenant = %tenant_id,
                    version = before,
                    persons = snapshot.persons.len(),
                    edges = snapshot.edges.len(),
                    "Snapshot loaded"
                );
                return Ok(snapshot);
            }
            tracing::debug!(tenant = %tenant_id, attempt, before, after, "Snapshot raced a write");
            if attempt == SNAPSHOT_ATTEMPTS {
                return Err(StoreError::VersionConflict {
                    tenant: *tenant_id,
                    expected: before,
                    actual: after,
                });
            }
            before = after;
        }
    }

    async fn read_tenant(&self, tenant_id: &TenantId, version: u64) -> Result<TenantSnapshot> {
        let tid = tenant_id.0.to_string();

        let persons: Vec<Person> = self
            .payloads(
                query(
                    "MATCH (n:Person {tenant_id: $tenant_id})
                     RETURN n.payload AS payload",
                )
                .param("tenant_id", tid.clone()),
            )
            .await?;

        let edges: Vec<ParentChildEdge> = self
            .payloads(
                query(
                    "MATCH (:Person {tenant_id: $tenant_id})-[r:PARENT_OF]->(:Person)
                     RETURN r.payload AS payload",
                )
                .param("tenant_id", tid.clone()),
            )
            .await?;

        let unions: Vec<Union> = self
            .payloads(
                query(
                    "MATCH (u:Union {tenant_id: $tenant_id})
                     RETURN u.payload AS payload",
                )
                .param("tenant_id", tid.clone()),
            )
            .await?;

        let links: Vec<PersonLink> = self
            .payloads(
                query(
                    "MATCH (l:PersonLink)
                     WHERE l.source_tenant = $tenant_id OR l.target_tenant = $tenant_id
                     RETURN l.payload AS payload",
                )
                .param("tenant_id", tid),
            )
            .await?;

        Ok(TenantSnapshot {
            tenant_id: *tenant_id,
            version,
            persons,
            edges,
            unions,
            links,
        })
    }

    pub(crate) async fn fetch_person(&self, person_id: &PersonId) -> Result<Option<Person>> {
        let q = query(
            "MATCH (n:Person {id: $id})
             RETURN n.payload AS payload LIMIT 1",
        )
        .param("id", person_id.0.to_string());

        match self.query_one(q).await? {
            Some(row) => Ok(Some(decode_payload(&row)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_predictions(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<PredictedRelationship>> {
        self.payloads(
            query(
                "MATCH (p:Prediction {tenant_id: $tenant_id})
                 RETURN p.payload AS payload
                 ORDER BY p.created_at",
            )
            .param("tenant_id", tenant_id.0.to_string()),
        )
        .await
    }

    pub(crate) async fn fetch_prediction(
        &self,
        id: &PredictionId,
    ) -> Result<Option<PredictedRelationship>> {
        let q = query(
            "MATCH (p:Prediction {id: $id})
             RETURN p.payload AS payload",
        )
        .param("id", id.0.to_string());

        match self.query_one(q).await? {
            Some(row) => Ok(Some(decode_payload(&row)?)),
            None => Ok(None),
        }
    }

    async fn payloads<T: DeserializeOwned>(&self, q: neo4rs::Query) -> Result<Vec<T>> {
        let rows = self.query_rows(q).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(decode_payload(&row)?);
        }
        Ok(out)
    }
}

fn decode_payload<T: DeserializeOwned>(row: &neo4rs::Row) -> Result<T> {
    let payload: String = row
        .get("payload")
        .map_err(|e| StoreError::Serialization(format!("payload column: {e}")))?;
    Ok(serde_json::from_str(&payload)?)
}
