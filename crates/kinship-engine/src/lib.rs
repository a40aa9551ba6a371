//! kinship-engine: integrity-guarded writes and analysis for kinship graphs.
//!
//! Loads a tenant's graph through a [`GraphStore`], builds an in-memory
//! [`ActiveGraph`], and runs the four engine components against it:
//! the integrity guard (edge and union writes), the kinship resolver,
//! the duplicate candidate detector and the relationship prediction engine.
//! Every write and scan is recorded in the audit trail and announced on the
//! event channel.

pub mod audit;
pub mod cache;
pub mod control;
pub mod duplicates;
pub mod error;
pub mod graph;
pub mod guard;
pub mod kinship;
pub mod labels;
pub mod names;
pub mod predict;
pub mod types;

pub use control::ScanControl;
pub use error::{EngineError, Result};
pub use graph::ActiveGraph;
pub use kinship::{ClassifyOutcome, KinshipLabel, KinshipResolver};
pub use labels::Relationship;
pub use types::{DetectionMode, DuplicateRequest, DuplicateScope, Page, ScanSummary};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use kinship_audit::{AuditLog, MemoryAuditLog};
use kinship_core::events::{EventPayload, KinshipEvent};
use kinship_core::{
    Actor, AppliedRef, BatchId, ConfidenceLevel, DuplicateCandidate, GraphError, KinshipConfig,
    ParentChildEdge, ParentType, PersonId, PredictedRelationship, PredictedType, PredictionId,
    PredictionStatus, ReviewAction, TenantId, Union, UnionKind,
};
use kinship_graph::{GraphStore, StoreError};

use crate::cache::SnapshotCache;
use crate::guard::IntegrityGuard;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The kinship engine for one store.
pub struct KinshipEngine<S: GraphStore> {
    store: Arc<S>,
    cache: SnapshotCache,
    guard: IntegrityGuard,
    resolver: KinshipResolver,
    audit_log: Arc<dyn AuditLog>,
    events: broadcast::Sender<KinshipEvent>,
    config: KinshipConfig,
}

impl<S: GraphStore> KinshipEngine<S> {
    /// Create an engine with default configuration and an in-memory audit log.
    pub fn new(store: Arc<S>) -> Self {
        let config = KinshipConfig::default();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            cache: SnapshotCache::new(),
            guard: IntegrityGuard::new(config.guard.clone()),
            resolver: KinshipResolver::new(config.resolver.clone()),
            audit_log: Arc::new(MemoryAuditLog::new()),
            events,
            config,
        }
    }

    pub fn with_config(mut self, config: KinshipConfig) -> Self {
        self.guard = IntegrityGuard::new(config.guard.clone());
        self.resolver = KinshipResolver::new(config.resolver.clone());
        self.config = config;
        self
    }

    pub fn with_audit_log(mut self, log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = log;
        self
    }

    pub fn config(&self) -> &KinshipConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Receive events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<KinshipEvent> {
        self.events.subscribe()
    }

    /// The tenant's active graph at the store's current version.
    pub async fn snapshot(&self, tenant: TenantId) -> Result<Arc<ActiveGraph>> {
        self.cache.get(self.store.as_ref(), tenant).await
    }

    // ── Graph Integrity Guard ─────────────────────────────────────

    /// Create a parent → child edge if it keeps the graph consistent.
    pub async fn propose_edge(
        &self,
        tenant: TenantId,
        parent: PersonId,
        child: PersonId,
        edge_type: ParentType,
        actor: &Actor,
    ) -> Result<ParentChildEdge> {
        let mut session = audit::start_session(
            tenant,
            actor,
            "propose_edge",
            serde_json::json!({
                "parent_id": parent,
                "child_id": child,
                "edge_type": edge_type,
            }),
        );

        let result = self
            .guard
            .propose_edge(
                self.store.as_ref(),
                &self.cache,
                tenant,
                parent,
                child,
                edge_type,
                actor,
                &mut session,
            )
            .await;
        audit::finalize_and_store(session, audit::outcome_of(&result), self.audit_log.as_ref());

        match result {
            Ok(committed) => {
                let edge = committed.record;
                tracing::info!(
                    tenant = %tenant,
                    edge = %edge.id,
                    parent = %parent,
                    child = %child,
                    version = committed.version,
                    "Edge created"
                );
                self.publish(KinshipEvent::new(
                    tenant,
                    &actor.id,
                    EventPayload::EdgeCreated {
                        edge_id: edge.id,
                        parent_id: parent,
                        child_id: child,
                        edge_type,
                        graph_version: committed.version,
                    },
                ));
                Ok(edge)
            }
            Err(e) => {
                if let Some(rejection) = e.as_graph() {
                    tracing::warn!(tenant = %tenant, parent = %parent, child = %child, code = rejection.code(), "Edge rejected");
                    self.publish(KinshipEvent::new(
                        tenant,
                        &actor.id,
                        EventPayload::EdgeRejected {
                            parent_id: parent,
                            child_id: child,
                            reason: rejection.code().to_string(),
                        },
                    ));
                }
                Err(e)
            }
        }
    }

    /// Create a union of `members` unless an active one already holds them.
    pub async fn propose_union(
        &self,
        tenant: TenantId,
        members: &[PersonId],
        kind: UnionKind,
        actor: &Actor,
    ) -> Result<Union> {
        let mut session = audit::start_session(
            tenant,
            actor,
            "propose_union",
            serde_json::json!({ "members": members, "kind": kind }),
        );
        let result = self
            .guard
            .propose_union(self.store.as_ref(), &self.cache, tenant, members, kind, &mut session)
            .await;
        audit::finalize_and_store(session, audit::outcome_of(&result), self.audit_log.as_ref());

        let committed = result?;
        let union = committed.record;
        tracing::info!(tenant = %tenant, union = %union.id, members = union.members.len(), "Union created");
        self.publish(KinshipEvent::new(
            tenant,
            &actor.id,
            EventPayload::UnionCreated {
                union_id: union.id,
                members: union.members.iter().map(|m| m.person_id).collect(),
                graph_version: committed.version,
            },
        ));
        Ok(union)
    }

    // ── Kinship Resolver ──────────────────────────────────────────

    /// Name the relationship of `b` to `a`.
    pub async fn classify_relationship(
        &self,
        tenant: TenantId,
        a: PersonId,
        b: PersonId,
        max_depth: Option<usize>,
    ) -> Result<ClassifyOutcome> {
        let graph = self.snapshot(tenant).await?;
        for person in [a, b] {
            guard::require_person(self.store.as_ref(), &graph, tenant, person).await?;
        }
        Ok(self.resolver.classify(&graph, a, b, max_depth)?)
    }

    // ── Duplicate Candidate Detector ──────────────────────────────

    /// Rank likely duplicate records and return the requested page.
    pub async fn detect_duplicates(
        &self,
        request: DuplicateRequest,
        control: ScanControl,
    ) -> Result<Page<DuplicateCandidate>> {
        let start = Instant::now();
        let settings = self.config.duplicates.clone();
        let control = control
            .or_timeout(Duration::from_secs(settings.scan_timeout_secs))
            .for_operation("detect_duplicates");

        let (source, target) = match request.scope {
            DuplicateScope::Tenant { tenant_id } => (self.snapshot(tenant_id).await?, None),
            DuplicateScope::CrossTenant { source, target } => {
                if source == target {
                    return Err(GraphError::InvalidRequest(
                        "cross-tenant scope needs two different tenants".to_string(),
                    )
                    .into());
                }
                (self.snapshot(source).await?, Some(self.snapshot(target).await?))
            }
        };

        let mode = request.mode;
        let min_confidence = request.min_confidence.unwrap_or(0);
        let ranked = {
            let settings = settings.clone();
            tokio::task::spawn_blocking(move || {
                duplicates::detect(
                    &source,
                    target.as_deref(),
                    mode,
                    min_confidence,
                    &settings,
                    &control,
                )
            })
            .await??
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let tenant = request.scope.primary_tenant();
        tracing::info!(tenant = %tenant, candidates = ranked.len(), duration_ms, "Duplicate scan completed");
        self.publish(KinshipEvent::new(
            tenant,
            &Actor::system().id,
            EventPayload::DuplicateScanCompleted {
                candidates: ranked.len(),
                duration_ms,
            },
        ));

        Ok(Page::slice(
            ranked,
            request.page.unwrap_or(1),
            request.per_page.unwrap_or(settings.default_page_size),
        ))
    }

    // ── Relationship Prediction Engine ────────────────────────────

    /// Run the prediction rules and store new predictions as one batch.
    ///
    /// Keys already stored by an earlier scan are skipped whatever their
    /// status, so a rescan never duplicates or resurrects a prediction.
    pub async fn scan_predictions(
        &self,
        tenant: TenantId,
        actor: &Actor,
        control: ScanControl,
    ) -> Result<ScanSummary> {
        let start = Instant::now();
        let settings = self.config.predictions.clone();
        let control = control
            .or_timeout(Duration::from_secs(settings.scan_timeout_secs))
            .for_operation("scan_predictions");
        let batch_id = BatchId::new();

        let mut session = audit::start_session(
            tenant,
            actor,
            "scan_predictions",
            serde_json::json!({ "batch_id": batch_id, "rules": settings.rules }),
        );

        let result = self
            .run_scan(tenant, batch_id, settings, control, &mut session)
            .await;
        let result = result.map(|mut summary| {
            summary.computation_ms = start.elapsed().as_millis() as u64;
            summary
        });
        audit::finalize_and_store(session, audit::outcome_of(&result), self.audit_log.as_ref());

        let summary = result?;
        tracing::info!(
            tenant = %tenant,
            batch = %batch_id,
            created = summary.total,
            skipped = summary.skipped_existing,
            anomalies = summary.anomalies.len(),
            "Prediction scan completed"
        );
        self.publish(KinshipEvent::new(
            tenant,
            &actor.id,
            EventPayload::PredictionScanCompleted {
                batch_id,
                created: summary.total,
                skipped_existing: summary.skipped_existing,
                duration_ms: summary.computation_ms,
            },
        ));
        Ok(summary)
    }

    async fn run_scan(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        settings: kinship_core::config::PredictionConfig,
        control: ScanControl,
        session: &mut kinship_audit::AuditSession,
    ) -> Result<ScanSummary> {
        let graph = self.snapshot(tenant).await?;
        let version = graph.version;
        let evaluation = tokio::task::spawn_blocking(move || {
            predict::evaluate(&graph, &settings, batch_id, &control)
        })
        .await??;

        let existing: HashSet<_> = self
            .store
            .list_predictions(tenant)
            .await?
            .iter()
            .map(PredictedRelationship::key)
            .collect();
        let proposed = evaluation.predictions.len();
        let fresh: Vec<PredictedRelationship> = evaluation
            .predictions
            .into_iter()
            .filter(|p| !existing.contains(&p.key()))
            .collect();
        let inserted = self.store.insert_predictions(&fresh).await?;
        session.note(
            "predictions",
            "Stored new predictions",
            serde_json::json!({
                "graph_version": version,
                "proposed": proposed,
                "inserted": inserted,
            }),
        );

        let mut summary = ScanSummary {
            tenant_id: tenant,
            batch_id,
            total: inserted,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            skipped_existing: proposed.saturating_sub(inserted),
            by_rule: BTreeMap::new(),
            anomalies: evaluation.anomalies,
            computation_ms: 0,
        };
        // Level and rule counts cover the rows offered to the store; a racing
        // scan may have claimed a few of them first.
        for p in &fresh {
            match p.level {
                ConfidenceLevel::High => summary.high_count += 1,
                ConfidenceLevel::Medium => summary.medium_count += 1,
                ConfidenceLevel::Low => summary.low_count += 1,
            }
            *summary.by_rule.entry(p.rule).or_default() += 1;
        }
        Ok(summary)
    }

    /// Confirm, dismiss or apply a prediction.
    ///
    /// Apply claims the row first, then goes through the integrity guard. A
    /// rejected apply restores the status, records the reason on the
    /// prediction and returns the rejection.
    pub async fn resolve_prediction(
        &self,
        id: PredictionId,
        action: ReviewAction,
        actor: &Actor,
    ) -> Result<PredictedRelationship> {
        let prediction = self
            .store
            .get_prediction(id)
            .await?
            .ok_or(GraphError::PredictionNotFound(id))?;
        predict::review::check_transition(prediction.status, &action)?;
        let tenant = prediction.tenant_id;

        let (next, expected) = match &action {
            ReviewAction::Confirm => (
                predict::review::confirmed(&prediction, actor),
                prediction.status,
            ),
            ReviewAction::Dismiss { reason } => (
                predict::review::dismissed(&prediction, reason.clone(), actor),
                prediction.status,
            ),
            ReviewAction::Apply => {
                // Applied is terminal, so once claimed no other review can
                // resolve the row while the record is created.
                let claim = predict::review::claimed(&prediction, actor);
                self.persist(&claim, prediction.status, &action).await?;

                match self.apply(&prediction, actor).await {
                    Ok(record) => (
                        predict::review::applied(&prediction, record, actor),
                        claim.status,
                    ),
                    Err(EngineError::Graph(rejection)) => {
                        let failed = predict::review::apply_failed(&prediction, &rejection);
                        self.persist(&failed, claim.status, &action).await?;
                        tracing::warn!(
                            tenant = %tenant,
                            prediction = %id,
                            code = rejection.code(),
                            "Prediction apply rejected"
                        );
                        self.publish(KinshipEvent::new(
                            tenant,
                            &actor.id,
                            EventPayload::PredictionResolved {
                                prediction_id: id,
                                status: failed.status,
                                failure: failed.last_failure.clone(),
                            },
                        ));
                        return Err(rejection.into());
                    }
                    Err(e) => {
                        if let Err(release) = self.persist(&prediction, claim.status, &action).await {
                            tracing::error!(
                                tenant = %tenant,
                                prediction = %id,
                                error = %release,
                                "Failed to release claimed prediction"
                            );
                        }
                        return Err(e);
                    }
                }
            }
        };

        self.persist(&next, expected, &action).await?;
        tracing::info!(tenant = %tenant, prediction = %id, status = %next.status, "Prediction resolved");
        self.publish(KinshipEvent::new(
            tenant,
            &actor.id,
            EventPayload::PredictionResolved {
                prediction_id: id,
                status: next.status,
                failure: None,
            },
        ));
        Ok(next)
    }

    /// Create the record a prediction proposes. An identical record that
    /// already exists counts as the applied record.
    async fn apply(&self, prediction: &PredictedRelationship, actor: &Actor) -> Result<AppliedRef> {
        let tenant = prediction.tenant_id;
        match prediction.predicted_type {
            PredictedType::ParentChild => {
                let edge_type = prediction.edge_type.unwrap_or(ParentType::Biological);
                match self
                    .propose_edge(tenant, prediction.source_id, prediction.target_id, edge_type, actor)
                    .await
                {
                    Ok(edge) => Ok(AppliedRef::Edge(edge.id)),
                    Err(EngineError::Graph(GraphError::DuplicateEdge { existing, .. })) => {
                        Ok(AppliedRef::Edge(existing))
                    }
                    Err(e) => Err(e),
                }
            }
            PredictedType::Union => {
                let members = [prediction.source_id, prediction.target_id];
                match self
                    .propose_union(tenant, &members, UnionKind::Marriage, actor)
                    .await
                {
                    Ok(union) => Ok(AppliedRef::Union(union.id)),
                    Err(EngineError::Graph(GraphError::DuplicateUnion { existing })) => {
                        Ok(AppliedRef::Union(existing))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Store `next` if the row still has the `expected` status.
    async fn persist(
        &self,
        next: &PredictedRelationship,
        expected: PredictionStatus,
        action: &ReviewAction,
    ) -> Result<()> {
        match self.store.update_prediction(next, expected).await {
            Ok(()) => Ok(()),
            Err(StoreError::StatusConflict { actual, .. }) => Err(GraphError::InvalidTransition {
                from: actual,
                action: action.as_str(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    fn publish(&self, event: KinshipEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
