//! Request and response types for engine operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kinship_core::{BatchId, MatchStrategy, ParentType, PersonId, RuleKind, TenantId};

/// Which records a duplicate scan compares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DuplicateScope {
    /// Every pair within one tree.
    Tenant { tenant_id: TenantId },
    /// Every record of `source` against every record of `target`.
    CrossTenant { source: TenantId, target: TenantId },
}

impl DuplicateScope {
    pub fn primary_tenant(&self) -> TenantId {
        match self {
            DuplicateScope::Tenant { tenant_id } => *tenant_id,
            DuplicateScope::CrossTenant { source, .. } => *source,
        }
    }
}

/// How wide a net a duplicate scan casts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Exact composite names and shared parents only.
    Exact,
    /// Adds fuzzy composites and same given + father names.
    Fuzzy,
    /// Adds given-name-only matches.
    #[default]
    All,
}

impl DetectionMode {
    pub fn includes(self, strategy: MatchStrategy) -> bool {
        match strategy {
            MatchStrategy::ExactComposite | MatchStrategy::SharedParent => true,
            MatchStrategy::FuzzyComposite | MatchStrategy::SameGivenFather => {
                matches!(self, DetectionMode::Fuzzy | DetectionMode::All)
            }
            MatchStrategy::GivenNameOnly => self == DetectionMode::All,
        }
    }
}

/// Request to detect duplicate person records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRequest {
    pub scope: DuplicateScope,
    #[serde(default)]
    pub mode: DetectionMode,
    /// Candidates below this confidence are dropped (default: 0).
    pub min_confidence: Option<u8>,
    /// 1-based page number (default: 1).
    pub page: Option<usize>,
    /// Page size (default: `DuplicateConfig.default_page_size`).
    pub per_page: Option<usize>,
}

impl DuplicateRequest {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            scope: DuplicateScope::Tenant { tenant_id },
            mode: DetectionMode::default(),
            min_confidence: None,
            page: None,
            per_page: None,
        }
    }
}

/// One page of a ranked result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the full ranked list.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Slice `all` into the requested page; out-of-range pages are empty.
    pub fn slice(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}

/// Why an existing parent-child pairing looks implausible.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ParentTooYoung,
    ParentTooOld,
}

/// An existing edge whose birth years do not fit a parent-child pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgeAnomaly {
    pub parent_id: PersonId,
    pub child_id: PersonId,
    pub edge_type: ParentType,
    /// Parent's age in years at the child's birth (may be negative).
    pub parent_age: i32,
    pub kind: AnomalyKind,
}

/// Result of one prediction scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    /// Predictions newly stored by this scan.
    pub total: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    /// Proposals whose key was already stored by an earlier scan.
    pub skipped_existing: usize,
    pub by_rule: BTreeMap<RuleKind, usize>,
    pub anomalies: Vec<AgeAnomaly>,
    pub computation_ms: u64,
}
