//! Write operations against Neo4j.
//!
//! Every write bumps the tenant's `:TenantGraph` version node. Gated writes
//! (edges and unions) lock that node first and only proceed when its version
//! still equals the caller's expectation, which makes check-then-insert
//! serializable across processes.

use chrono::Utc;
use neo4rs::query;

use kinship_core::{
    ParentChildEdge, Person, PersonId, PersonLink, PredictedRelationship, PredictionStatus,
    TenantId, Union,
};

use crate::client::Neo4jStore;
use crate::store::{Result, StoreError};

impl Neo4jStore {
    // ── Schema ───────────────────────────────────────────────────

    /// Create the uniqueness constraints the store relies on.
    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT person_id IF NOT EXISTS FOR (n:Person) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT union_id IF NOT EXISTS FOR (n:Union) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT link_id IF NOT EXISTS FOR (n:PersonLink) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT prediction_id IF NOT EXISTS FOR (n:Prediction) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT tenant_graph IF NOT EXISTS FOR (n:TenantGraph) REQUIRE n.tenant_id IS UNIQUE",
            "CREATE INDEX prediction_key IF NOT EXISTS FOR (n:Prediction) ON (n.tenant_id, n.dedup_key)",
        ];
        for statement in statements {
            self.run(query(statement)).await?;
        }
        tracing::info!("Neo4j schema ensured");
        Ok(())
    }

    // ── Record writes (CRUD layer) ───────────────────────────────

    /// Upsert a person record and bump the tenant version.
    pub async fn upsert_person(&self, person: &Person) -> Result<()> {
        let q = query(
            "MERGE (n:Person {tenant_id: $tenant_id, id: $id})
             SET n.payload = $payload, n.deleted = $deleted, n.updated_at = $now
             WITH n
             MERGE (g:TenantGraph {tenant_id: $tenant_id})
             ON CREATE SET g.version = 0
             SET g.version = g.version + 1",
        )
        .param("tenant_id", person.tenant_id.0.to_string())
        .param("id", person.id.0.to_string())
        .param("payload", ser(person)?)
        .param("deleted", person.deleted_at.is_some())
        .param("now", Utc::now().to_rfc3339());

        self.run(q).await
    }

    pub async fn soft_delete_person(&self, person_id: &PersonId) -> Result<()> {
        let mut person = self.fetch_person(person_id).await?.ok_or(StoreError::NotFound {
            kind: "Person",
            id: person_id.to_string(),
        })?;
        person.deleted_at = Some(Utc::now());
        self.upsert_person(&person).await
    }

    /// Record a reviewed person link; bumps the version of both tenants.
    pub async fn upsert_link(&self, link: &PersonLink) -> Result<()> {
        let q = query(
            "MERGE (l:PersonLink {id: $id})
             SET l.source_tenant = $source_tenant, l.target_tenant = $target_tenant,
                 l.payload = $payload
             WITH l
             UNWIND [$source_tenant, $target_tenant] AS tid
             MERGE (g:TenantGraph {tenant_id: tid})
             ON CREATE SET g.version = 0
             SET g.version = g.version + 1",
        )
        .param("id", link.id.0.to_string())
        .param("source_tenant", link.source_tenant.0.to_string())
        .param("target_tenant", link.target_tenant.0.to_string())
        .param("payload", ser(link)?);

        self.run(q).await
    }

    // ── Version-gated writes ─────────────────────────────────────

    pub(crate) async fn create_edge_at_version(
        &self,
        edge: &ParentChildEdge,
        expected: u64,
    ) -> Result<u64> {
        let q = query(
            "MERGE (g:TenantGraph {tenant_id: $tenant_id})
             ON CREATE SET g.version = 0
             SET g._lock = true
             WITH g
             WHERE g.version = $expected
             MATCH (p:Person {tenant_id: $tenant_id, id: $parent_id})
             MATCH (c:Person {tenant_id: $tenant_id, id: $child_id})
             CREATE (p)-[:PARENT_OF {
               id: $id, tenant_id: $tenant_id, edge_type: $edge_type, payload: $payload
             }]->(c)
             SET g.version = g.version + 1, g._lock = false
             RETURN g.version AS version",
        )
        .param("tenant_id", edge.tenant_id.0.to_string())
        .param("expected", expected as i64)
        .param("parent_id", edge.parent_id.0.to_string())
        .param("child_id", edge.child_id.0.to_string())
        .param("id", edge.id.0.to_string())
        .param("edge_type", edge.edge_type.as_str().to_string())
        .param("payload", ser(edge)?);

        match self.query_one(q).await? {
            Some(row) => read_version(&row),
            None => Err(self.gate_failure(&edge.tenant_id, expected, "ParentChildEdge", edge.id.to_string()).await),
        }
    }

    pub(crate) async fn create_union_at_version(&self, union: &Union, expected: u64) -> Result<u64> {
        let members: Vec<String> = union
            .members
            .iter()
            .map(|m| m.person_id.0.to_string())
            .collect();

        let q = query(
            "MERGE (g:TenantGraph {tenant_id: $tenant_id})
             ON CREATE SET g.version = 0
             SET g._lock = true
             WITH g
             WHERE g.version = $expected
             CREATE (u:Union {tenant_id: $tenant_id, id: $id, kind: $kind, payload: $payload})
             WITH g, u
             UNWIND $members AS member_id
             MATCH (p:Person {tenant_id: $tenant_id, id: member_id})
             CREATE (p)-[:MEMBER_OF]->(u)
             WITH DISTINCT g
             SET g.version = g.version + 1, g._lock = false
             RETURN g.version AS version",
        )
        .param("tenant_id", union.tenant_id.0.to_string())
        .param("expected", expected as i64)
        .param("id", union.id.0.to_string())
        .param("kind", ser(&union.kind)?)
        .param("payload", ser(union)?)
        .param("members", members);

        match self.query_one(q).await? {
            Some(row) => read_version(&row),
            None => Err(self.gate_failure(&union.tenant_id, expected, "Union", union.id.to_string()).await),
        }
    }

    /// Explain why a gated write returned no row.
    async fn gate_failure(
        &self,
        tenant_id: &TenantId,
        expected: u64,
        kind: &'static str,
        id: String,
    ) -> StoreError {
        match self.fetch_version(tenant_id).await {
            Ok(actual) if actual != expected => StoreError::VersionConflict {
                tenant: *tenant_id,
                expected,
                actual,
            },
            Ok(_) => StoreError::NotFound { kind, id },
            Err(e) => e,
        }
    }

    // ── Predictions ──────────────────────────────────────────────

    pub(crate) async fn merge_predictions(
        &self,
        predictions: &[PredictedRelationship],
    ) -> Result<usize> {
        let mut created = 0;
        for prediction in predictions {
            let q = query(
                "MERGE (p:Prediction {tenant_id: $tenant_id, dedup_key: $dedup_key})
                 ON CREATE SET p.id = $id, p.status = $status, p.batch_id = $batch_id,
                               p.created_at = $created_at, p.payload = $payload
                 RETURN p.id = $id AS created",
            )
            .param("tenant_id", prediction.tenant_id.0.to_string())
            .param("dedup_key", prediction.key().to_string())
            .param("id", prediction.id.0.to_string())
            .param("status", prediction.status.as_str().to_string())
            .param("batch_id", prediction.batch_id.0.to_string())
            .param("created_at", prediction.created_at.to_rfc3339())
            .param("payload", ser(prediction)?);

            if let Some(row) = self.query_one(q).await? {
                let was_created: bool = row.get("created").unwrap_or(false);
                if was_created {
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    pub(crate) async fn replace_prediction(
        &self,
        prediction: &PredictedRelationship,
        expected: PredictionStatus,
    ) -> Result<()> {
        let q = query(
            "MATCH (p:Prediction {id: $id})
             SET p._lock = true
             WITH p
             WHERE p.status = $expected
             SET p.status = $status, p.payload = $payload, p._lock = false
             RETURN p.id AS id",
        )
        .param("id", prediction.id.0.to_string())
        .param("expected", expected.as_str().to_string())
        .param("status", prediction.status.as_str().to_string())
        .param("payload", ser(prediction)?);

        if self.query_one(q).await?.is_some() {
            return Ok(());
        }

        match self.fetch_prediction(&prediction.id).await? {
            Some(current) => Err(StoreError::StatusConflict {
                id: prediction.id,
                expected,
                actual: current.status,
            }),
            None => Err(StoreError::NotFound {
                kind: "Prediction",
                id: prediction.id.to_string(),
            }),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn read_version(row: &neo4rs::Row) -> Result<u64> {
    let version: i64 = row
        .get("version")
        .map_err(|e| StoreError::Serialization(format!("version: {e}")))?;
    Ok(version.max(0) as u64)
}

fn ser<T: serde::Serialize>(val: &T) -> Result<String> {
    Ok(serde_json::to_string(val)?)
}
