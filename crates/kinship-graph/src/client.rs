//! Neo4j connection management and the Neo4j-backed [`GraphStore`].

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;

use kinship_core::{
    ParentChildEdge, Person, PersonId, PredictedRelationship, PredictionId, PredictionStatus,
    TenantId, Union,
};

use crate::store::{GraphStore, Result, StoreError, TenantSnapshot};

/// Configuration for connecting to Neo4j (`[neo4j]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "kinship-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    500
}

/// Thread-safe Neo4j store with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Execute a write-only query.
    pub async fn run(&self, query: Query) -> Result<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Begin a transaction.
    pub async fn start_txn(&self) -> Result<neo4rs::Txn> {
        Ok(self.graph.start_txn().await?)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn load_snapshot(&self, tenant: TenantId) -> Result<TenantSnapshot> {
        self.fetch_snapshot(&tenant).await
    }

    async fn graph_version(&self, tenant: TenantId) -> Result<u64> {
        self.fetch_version(&tenant).await
    }

    async fn find_person(&self, person: PersonId) -> Result<Option<Person>> {
        self.fetch_person(&person).await
    }

    async fn insert_edge(&self, edge: &ParentChildEdge, expected_version: u64) -> Result<u64> {
        self.create_edge_at_version(edge, expected_version).await
    }

    async fn insert_union(&self, union: &Union, expected_version: u64) -> Result<u64> {
        self.create_union_at_version(union, expected_version).await
    }

    async fn list_predictions(&self, tenant: TenantId) -> Result<Vec<PredictedRelationship>> {
        self.fetch_predictions(&tenant).await
    }

    async fn get_prediction(&self, id: PredictionId) -> Result<Option<PredictedRelationship>> {
        self.fetch_prediction(&id).await
    }

    async fn insert_predictions(&self, predictions: &[PredictedRelationship]) -> Result<usize> {
        self.merge_predictions(predictions).await
    }

    async fn update_prediction(
        &self,
        prediction: &PredictedRelationship,
        expected: PredictionStatus,
    ) -> Result<()> {
        self.replace_prediction(prediction, expected).await
    }
}
