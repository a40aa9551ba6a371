//! Relationship prediction.
//!
//! Rules are pure functions over an [`ActiveGraph`] registered in
//! [`REGISTRY`]. A scan runs the configured rules in order, keeps the
//! highest-confidence proposal per prediction key and turns the survivors
//! into [`PredictedRelationship`] rows.

pub mod review;
pub mod rules;

use std::collections::HashMap;

use chrono::Utc;

use kinship_core::config::PredictionConfig;
use kinship_core::{
    BatchId, ParentType, PredictedRelationship, PredictedType, PredictionId, PredictionKey,
    PredictionStatus, RuleKind, Sex,
};

use crate::control::{ScanControl, CHECK_INTERVAL};
use crate::error::Result;
use crate::graph::ActiveGraph;
use crate::types::{AgeAnomaly, AnomalyKind};

/// Parent ages (at the child's birth) that earn a small bonus.
const TYPICAL_PARENT_AGE: std::ops::RangeInclusive<i32> = 18..=45;
const TYPICAL_AGE_BONUS: i32 = 5;
const IMPLAUSIBLE_AGE_PENALTY: i32 = -40;

/// One relationship a rule wants reviewed.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Proposed parent for parent-child proposals; first partner for unions.
    pub source: usize,
    pub target: usize,
    pub predicted_type: PredictedType,
    pub edge_type: Option<ParentType>,
    pub rule: RuleKind,
    /// Unclamped score.
    pub confidence: i32,
    pub explanation: String,
}

impl Proposal {
    pub fn parent_child(
        rule: RuleKind,
        parent: usize,
        child: usize,
        confidence: i32,
        explanation: String,
    ) -> Self {
        Self {
            source: parent,
            target: child,
            predicted_type: PredictedType::ParentChild,
            edge_type: Some(ParentType::Biological),
            rule,
            confidence,
            explanation,
        }
    }

    /// A union proposal; the pair is ordered by person id so rescans produce
    /// the same key.
    pub fn union(
        graph: &ActiveGraph,
        rule: RuleKind,
        a: usize,
        b: usize,
        confidence: i32,
        explanation: String,
    ) -> Self {
        let (source, target) = if graph.id_of(a) <= graph.id_of(b) {
            (a, b)
        } else {
            (b, a)
        };
        Self {
            source,
            target,
            predicted_type: PredictedType::Union,
            edge_type: None,
            rule,
            confidence,
            explanation,
        }
    }
}

/// Read-only input shared by every rule.
pub struct RuleContext<'a> {
    pub graph: &'a ActiveGraph,
    pub config: &'a PredictionConfig,
    control: &'a ScanControl,
}

impl<'a> RuleContext<'a> {
    pub fn new(graph: &'a ActiveGraph, config: &'a PredictionConfig, control: &'a ScanControl) -> Self {
        Self {
            graph,
            config,
            control,
        }
    }

    /// Rules poll this in their outer loop and stop early when it is true.
    /// The scan surfaces the cancellation or timeout afterwards.
    pub fn interrupted(&self, step: usize) -> bool {
        step % CHECK_INTERVAL == 0 && self.control.check().is_err()
    }

    /// Display name used in explanations.
    pub fn name(&self, index: usize) -> String {
        let person = self.graph.person(index);
        match person.given_name() {
            "" => person.id.to_string(),
            given => given.to_string(),
        }
    }

    /// Parent's age at the child's birth, when both years are known.
    pub fn parent_age(&self, parent: usize, child: usize) -> Option<i32> {
        let p = self.graph.person(parent).birth_year()?;
        let c = self.graph.person(child).birth_year()?;
        Some(c - p)
    }

    /// Oldest plausible parent age for the given sex.
    pub fn max_parent_age(&self, sex: Sex) -> i32 {
        match sex {
            Sex::Male => self.config.max_father_age,
            Sex::Female => self.config.max_mother_age,
            Sex::Unknown => self.config.max_father_age.max(self.config.max_mother_age),
        }
    }

    pub fn plausible_parent_age(&self, age: i32, sex: Sex) -> bool {
        age >= self.config.min_parent_age && age <= self.max_parent_age(sex)
    }

    /// Score adjustment for a proposed parent given both birth years.
    pub fn age_gap_adjustment(&self, parent: usize, child: usize) -> i32 {
        let Some(age) = self.parent_age(parent, child) else {
            return 0;
        };
        if !self.plausible_parent_age(age, self.graph.sex_of(parent)) {
            IMPLAUSIBLE_AGE_PENALTY
        } else if TYPICAL_PARENT_AGE.contains(&age) {
            TYPICAL_AGE_BONUS
        } else {
            0
        }
    }

    /// Whether `candidate` may become a parent of `child` without closing a cycle.
    pub fn may_parent(&self, candidate: usize, child: usize) -> bool {
        candidate != child && !self.graph.is_ancestor(child, candidate)
    }
}

/// A registered rule.
pub struct RuleEntry {
    pub kind: RuleKind,
    pub apply: fn(&RuleContext<'_>) -> Vec<Proposal>,
}

pub static REGISTRY: [RuleEntry; 5] = [
    RuleEntry {
        kind: RuleKind::SpouseChildGap,
        apply: rules::spouse_child_gap,
    },
    RuleEntry {
        kind: RuleKind::MissingUnion,
        apply: rules::missing_union,
    },
    RuleEntry {
        kind: RuleKind::SiblingParentGap,
        apply: rules::sibling_parent_gap,
    },
    RuleEntry {
        kind: RuleKind::PatronymicName,
        apply: rules::patronymic_name,
    },
    RuleEntry {
        kind: RuleKind::AgeFamily,
        apply: rules::age_family,
    },
];

pub fn rule_entry(kind: RuleKind) -> Option<&'static RuleEntry> {
    REGISTRY.iter().find(|e| e.kind == kind)
}

/// Biological edges whose birth years make the pairing implausible.
pub fn age_anomalies(ctx: &RuleContext<'_>) -> Vec<AgeAnomaly> {
    let graph = ctx.graph;
    let mut out = Vec::new();
    for child in 0..graph.len() {
        for link in graph.parents[child]
            .iter()
            .filter(|l| l.edge_type == ParentType::Biological)
        {
            let Some(age) = ctx.parent_age(link.index, child) else {
                continue;
            };
            let kind = if age < ctx.config.min_parent_age {
                AnomalyKind::ParentTooYoung
            } else if age > ctx.max_parent_age(graph.sex_of(link.index)) {
                AnomalyKind::ParentTooOld
            } else {
                continue;
            };
            out.push(AgeAnomaly {
                parent_id: graph.id_of(link.index),
                child_id: graph.id_of(child),
                edge_type: link.edge_type,
                parent_age: age,
                kind,
            });
        }
    }
    out
}

/// Result of evaluating the rules against one snapshot.
pub struct Evaluation {
    /// One row per prediction key, ordered by confidence then key.
    pub predictions: Vec<PredictedRelationship>,
    pub anomalies: Vec<AgeAnomaly>,
}

/// Run the configured rules and build prediction rows for `batch_id`.
pub fn evaluate(
    graph: &ActiveGraph,
    config: &PredictionConfig,
    batch_id: BatchId,
    control: &ScanControl,
) -> Result<Evaluation> {
    let ctx = RuleContext::new(graph, config, control);
    let mut best: HashMap<PredictionKey, PredictedRelationship> = HashMap::new();

    for kind in &config.rules {
        control.check()?;
        let Some(entry) = rule_entry(*kind) else {
            continue;
        };
        let proposals = (entry.apply)(&ctx);
        control.check()?;
        tracing::debug!(rule = %entry.kind, proposals = proposals.len(), "Rule evaluated");

        for proposal in proposals {
            let row = to_prediction(graph, config, batch_id, proposal);
            match best.get(&row.key()) {
                Some(existing) if existing.confidence >= row.confidence => {}
                _ => {
                    best.insert(row.key(), row);
                }
            }
        }
    }

    let anomalies = age_anomalies(&ctx);
    let mut predictions: Vec<PredictedRelationship> = best.into_values().collect();
    predictions.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.key().cmp(&b.key()))
    });

    Ok(Evaluation {
        predictions,
        anomalies,
    })
}

fn to_prediction(
    graph: &ActiveGraph,
    config: &PredictionConfig,
    batch_id: BatchId,
    proposal: Proposal,
) -> PredictedRelationship {
    let confidence = proposal.confidence.clamp(0, 100) as u8;
    PredictedRelationship {
        id: PredictionId::new(),
        tenant_id: graph.tenant_id,
        batch_id,
        source_id: graph.id_of(proposal.source),
        target_id: graph.id_of(proposal.target),
        predicted_type: proposal.predicted_type,
        edge_type: proposal.edge_type,
        rule: proposal.rule,
        confidence,
        level: config.level_for(confidence),
        explanation: proposal.explanation,
        status: PredictionStatus::New,
        created_at: Utc::now(),
        resolved_at: None,
        resolved_by: None,
        dismiss_reason: None,
        last_failure: None,
        applied_ref: None,
    }
}
