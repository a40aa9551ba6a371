//! Core domain types for the kinship graph.
//!
//! People are nodes; parent-child edges and unions are the relationships.
//! Every record belongs to a tenant (one family tree) and may be soft-deleted
//! by the surrounding CRUD layer, in which case it is retained for audit but
//! invisible to the graph algorithms.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Every entity in the system belongs to a tenant (one family tree).
    TenantId
);
uuid_id!(
    /// Unique identifier for a person record.
    PersonId
);
uuid_id!(
    /// Unique identifier for a parent-child edge.
    EdgeId
);
uuid_id!(
    /// Unique identifier for a union (marriage or partnership).
    UnionId
);
uuid_id!(
    /// Unique identifier for a reviewed person link.
    LinkId
);
uuid_id!(
    /// Unique identifier for a predicted relationship.
    PredictionId
);
uuid_id!(
    /// Groups the predictions produced by a single scan run.
    BatchId
);

/// The user (or service) on whose behalf an operation runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: String,
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    /// Identity used for operations started by the core itself.
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

// ── People ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    pub fn is_known(self) -> bool {
        !matches!(self, Sex::Unknown)
    }
}

/// How much of a date is actually known.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Exact,
    Month,
    #[default]
    Year,
    About,
    Before,
    After,
}

/// A possibly incomplete calendar date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub precision: DatePrecision,
}

impl PartialDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
            precision: DatePrecision::Year,
        }
    }

    pub fn exact(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
            precision: DatePrecision::Exact,
        }
    }

    pub fn about(year: i32) -> Self {
        Self {
            precision: DatePrecision::About,
            ..Self::year(year)
        }
    }
}

/// One localized rendering of a person's name.
///
/// `patronymic` and `grandfather` hold the father's and grandfather's given
/// names as typed by the contributor. They are free text and may disagree
/// with the linked parents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonName {
    pub locale: String,
    pub given: String,
    #[serde(default)]
    pub patronymic: Option<String>,
    #[serde(default)]
    pub grandfather: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
}

impl PersonName {
    pub fn new(locale: &str, given: &str) -> Self {
        Self {
            locale: locale.to_string(),
            given: given.to_string(),
            patronymic: None,
            grandfather: None,
            family: None,
        }
    }

    pub fn with_patronymic(mut self, father: &str) -> Self {
        self.patronymic = Some(father.to_string());
        self
    }

    pub fn with_grandfather(mut self, grandfather: &str) -> Self {
        self.grandfather = Some(grandfather.to_string());
        self
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.family = Some(family.to_string());
        self
    }
}

/// A person in a family tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub tenant_id: TenantId,
    pub sex: Sex,
    pub birth: Option<PartialDate>,
    pub death: Option<PartialDate>,
    /// The first entry is the primary name.
    pub names: Vec<PersonName>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Person {
    pub fn new(tenant_id: TenantId, sex: Sex, name: PersonName) -> Self {
        Self {
            id: PersonId::new(),
            tenant_id,
            sex,
            birth: None,
            death: None,
            names: vec![name],
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_birth(mut self, birth: PartialDate) -> Self {
        self.birth = Some(birth);
        self
    }

    pub fn primary_name(&self) -> Option<&PersonName> {
        self.names.first()
    }

    /// Primary given name, or an empty string when no name was recorded.
    pub fn given_name(&self) -> &str {
        self.primary_name().map(|n| n.given.as_str()).unwrap_or("")
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth.map(|d| d.year)
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

// ── Parent-child edges ────────────────────────────────────────────

/// The nature of a parent-child relationship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Biological,
    Adoptive,
    Step,
    Foster,
    Guardian,
}

impl ParentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParentType::Biological => "biological",
            ParentType::Adoptive => "adoptive",
            ParentType::Step => "step",
            ParentType::Foster => "foster",
            ParentType::Guardian => "guardian",
        }
    }

    /// Biological and adoptive parents define sibling sets; step, foster
    /// and guardian relationships do not.
    pub fn defines_siblings(self) -> bool {
        matches!(self, ParentType::Biological | ParentType::Adoptive)
    }
}

impl fmt::Display for ParentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed Parent → Child edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentChildEdge {
    pub id: EdgeId,
    pub tenant_id: TenantId,
    pub parent_id: PersonId,
    pub child_id: PersonId,
    pub edge_type: ParentType,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ParentChildEdge {
    pub fn new(
        tenant_id: TenantId,
        parent_id: PersonId,
        child_id: PersonId,
        edge_type: ParentType,
    ) -> Self {
        Self {
            id: EdgeId::new(),
            tenant_id,
            parent_id,
            child_id,
            edge_type,
            created_at: Utc::now(),
            created_by: None,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

// ── Unions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnionKind {
    #[default]
    Marriage,
    Partnership,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnionRole {
    Husband,
    Wife,
    Partner,
}

impl UnionRole {
    pub fn for_sex(sex: Sex) -> Self {
        match sex {
            Sex::Male => UnionRole::Husband,
            Sex::Female => UnionRole::Wife,
            Sex::Unknown => UnionRole::Partner,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnionMember {
    pub person_id: PersonId,
    pub role: UnionRole,
}

/// A marriage or partnership. May have more than two members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Union {
    pub id: UnionId,
    pub tenant_id: TenantId,
    pub kind: UnionKind,
    /// Ordered as recorded.
    pub members: Vec<UnionMember>,
    pub start: Option<PartialDate>,
    pub end: Option<PartialDate>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Union {
    pub fn new(tenant_id: TenantId, kind: UnionKind, members: Vec<UnionMember>) -> Self {
        Self {
            id: UnionId::new(),
            tenant_id,
            kind,
            members,
            start: None,
            end: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn contains(&self, person: &PersonId) -> bool {
        self.members.iter().any(|m| &m.person_id == person)
    }

    /// Members other than `person`.
    pub fn partners_of<'a>(&'a self, person: &'a PersonId) -> impl Iterator<Item = PersonId> + 'a {
        self.members
            .iter()
            .filter(move |m| &m.person_id != person)
            .map(|m| m.person_id)
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

// ── Person links ──────────────────────────────────────────────────

/// A reviewer decision that two person records were already examined as a
/// duplicate pair. Linked pairs are excluded from duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonLink {
    pub id: LinkId,
    pub source_tenant: TenantId,
    pub source_person: PersonId,
    pub target_tenant: TenantId,
    pub target_person: PersonId,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PersonLink {
    pub fn new(
        source_tenant: TenantId,
        source_person: PersonId,
        target_tenant: TenantId,
        target_person: PersonId,
        created_by: &str,
    ) -> Self {
        Self {
            id: LinkId::new(),
            source_tenant,
            source_person,
            target_tenant,
            target_person,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

// ── Kinship paths ─────────────────────────────────────────────────

/// The kind of edge taken by one step of a kinship path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Moved from a child to one of its parents.
    Parent,
    /// Moved from a parent to one of its children.
    Child,
    /// Moved between union partners.
    Spouse,
}

impl EdgeKind {
    pub fn reverse(self) -> Self {
        match self {
            EdgeKind::Parent => EdgeKind::Child,
            EdgeKind::Child => EdgeKind::Parent,
            EdgeKind::Spouse => EdgeKind::Spouse,
        }
    }
}

/// One step of a kinship path: the person reached and how.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathStep {
    pub person_id: PersonId,
    pub via: EdgeKind,
}

/// A route through the graph from one person to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KinshipPath {
    pub from: PersonId,
    pub steps: Vec<PathStep>,
    pub common_ancestor: Option<PersonId>,
}

impl KinshipPath {
    pub fn new(from: PersonId, steps: Vec<PathStep>) -> Self {
        Self {
            from,
            steps,
            common_ancestor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to(&self) -> PersonId {
        self.steps.last().map(|s| s.person_id).unwrap_or(self.from)
    }

    /// Every person on the path, starting with `from`.
    pub fn person_ids(&self) -> Vec<PersonId> {
        std::iter::once(self.from)
            .chain(self.steps.iter().map(|s| s.person_id))
            .collect()
    }

    /// The same route walked from the other end.
    pub fn reversed(&self) -> Self {
        let people = self.person_ids();
        let mut steps = Vec::with_capacity(self.steps.len());
        for i in (0..self.steps.len()).rev() {
            steps.push(PathStep {
                person_id: people[i],
                via: self.steps[i].via.reverse(),
            });
        }
        Self {
            from: self.to(),
            steps,
            common_ancestor: self.common_ancestor,
        }
    }
}

// ── Duplicate candidates ──────────────────────────────────────────

/// Which matching strategy produced a duplicate candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactComposite,
    FuzzyComposite,
    SameGivenFather,
    SharedParent,
    GivenNameOnly,
}

impl MatchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::ExactComposite => "exact_composite",
            MatchStrategy::FuzzyComposite => "fuzzy_composite",
            MatchStrategy::SameGivenFather => "same_given_father",
            MatchStrategy::SharedParent => "shared_parent",
            MatchStrategy::GivenNameOnly => "given_name_only",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NamePart {
    Given,
    Father,
    Grandfather,
}

/// Why two records were flagged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MatchEvidence {
    pub matched_parts: Vec<NamePart>,
    pub shared_parents: Vec<PersonId>,
    pub similarity: Option<f64>,
    pub shared_siblings: usize,
    pub composite_a: String,
    pub composite_b: String,
}

/// A pair of person records that probably describe the same individual.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCandidate {
    pub person_a: PersonId,
    pub tenant_a: TenantId,
    pub person_b: PersonId,
    pub tenant_b: TenantId,
    pub strategy: MatchStrategy,
    /// 0–100.
    pub confidence: u8,
    pub evidence: MatchEvidence,
}

impl DuplicateCandidate {
    /// Order-independent identity of the pair.
    pub fn pair_key(&self) -> (PersonId, PersonId) {
        if self.person_a <= self.person_b {
            (self.person_a, self.person_b)
        } else {
            (self.person_b, self.person_a)
        }
    }
}

// ── Predicted relationships ───────────────────────────────────────

/// The inference rule that produced a prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    SpouseChildGap,
    MissingUnion,
    SiblingParentGap,
    PatronymicName,
    AgeFamily,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::SpouseChildGap,
        RuleKind::MissingUnion,
        RuleKind::SiblingParentGap,
        RuleKind::PatronymicName,
        RuleKind::AgeFamily,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::SpouseChildGap => "spouse_child_gap",
            RuleKind::MissingUnion => "missing_union",
            RuleKind::SiblingParentGap => "sibling_parent_gap",
            RuleKind::PatronymicName => "patronymic_name",
            RuleKind::AgeFamily => "age_family",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of relationship a prediction proposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PredictedType {
    /// `source` is proposed as a parent of `target`.
    ParentChild,
    /// `source` and `target` are proposed as union partners.
    Union,
}

/// Banded view of a 0–100 confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub const DEFAULT_HIGH: u8 = 85;
    pub const DEFAULT_MEDIUM: u8 = 60;

    pub fn from_score(score: u8, high: u8, medium: u8) -> Self {
        if score >= high {
            ConfidenceLevel::High
        } else if score >= medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    New,
    Confirmed,
    Dismissed,
    Applied,
}

impl PredictionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::New => "new",
            PredictionStatus::Confirmed => "confirmed",
            PredictionStatus::Dismissed => "dismissed",
            PredictionStatus::Applied => "applied",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PredictionStatus::Dismissed | PredictionStatus::Applied)
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's decision on a prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    Confirm,
    Dismiss { reason: Option<String> },
    Apply,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Confirm => "confirm",
            ReviewAction::Dismiss { .. } => "dismiss",
            ReviewAction::Apply => "apply",
        }
    }
}

/// The graph record created when a prediction was applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AppliedRef {
    Edge(EdgeId),
    Union(UnionId),
}

/// Uniqueness key of a prediction within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredictionKey {
    pub tenant_id: TenantId,
    pub source_id: PersonId,
    pub target_id: PersonId,
    pub predicted_type: PredictedType,
}

impl fmt::Display for PredictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.predicted_type {
            PredictedType::ParentChild => "parent_child",
            PredictedType::Union => "union",
        };
        write!(
            f,
            "{}:{}:{}:{}",
            self.tenant_id, self.source_id, self.target_id, kind
        )
    }
}

/// A proposed edge or union awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictedRelationship {
    pub id: PredictionId,
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub source_id: PersonId,
    pub target_id: PersonId,
    pub predicted_type: PredictedType,
    /// Edge type to create on apply (parent-child predictions only).
    pub edge_type: Option<ParentType>,
    pub rule: RuleKind,
    pub confidence: u8,
    pub level: ConfidenceLevel,
    pub explanation: String,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub dismiss_reason: Option<String>,
    /// Why the most recent apply attempt was rejected.
    pub last_failure: Option<String>,
    pub applied_ref: Option<AppliedRef>,
}

impl PredictedRelationship {
    pub fn key(&self) -> PredictionKey {
        PredictionKey {
            tenant_id: self.tenant_id,
            source_id: self.source_id,
            target_id: self.target_id,
            predicted_type: self.predicted_type,
        }
    }
}
