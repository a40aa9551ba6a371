//! Configuration management for the kinship core.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (KINSHIP__ prefix, `__` between sections)
//! 2. Config file (kinship.toml)
//! 3. Defaults
//!
//! Every component receives its section explicitly; nothing reads ambient
//! settings at call time.

use serde::Deserialize;

use crate::types::{ConfidenceLevel, RuleKind};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KinshipConfig {
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub duplicates: DuplicateConfig,
    #[serde(default)]
    pub predictions: PredictionConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl KinshipConfig {
    /// Load from `{file_prefix}.toml` (optional) and `KINSHIP__*` variables.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("KINSHIP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: KinshipConfig = cfg.try_deserialize()?;
        tracing::debug!(?loaded, "Loaded kinship configuration");
        Ok(loaded)
    }
}

/// Graph Integrity Guard settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Attempts before a conflict surfaces as `ConcurrentModification`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between attempts; doubled on every retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How long one attempt waits for the tenant lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Kinship Resolver settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,
    /// Upper bound applied to caller-supplied depths.
    #[serde(default = "default_max_depth_cap")]
    pub max_depth_cap: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            max_depth_cap: default_max_depth_cap(),
        }
    }
}

/// Duplicate Candidate Detector settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateConfig {
    /// Minimum composite-name similarity (0.0–1.0) for a fuzzy match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_exact_confidence")]
    pub exact_confidence: u8,
    #[serde(default = "default_fuzzy_cap")]
    pub fuzzy_confidence_cap: u8,
    #[serde(default = "default_same_given_father_base")]
    pub same_given_father_base: u8,
    #[serde(default = "default_same_given_father_cap")]
    pub same_given_father_cap: u8,
    /// Added per sibling given name both records share.
    #[serde(default = "default_sibling_boost")]
    pub sibling_boost: u8,
    #[serde(default = "default_shared_parent_confidence")]
    pub shared_parent_confidence: u8,
    #[serde(default = "default_given_only_confidence")]
    pub given_only_confidence: u8,
    /// Birth years further apart than this rule out a given-name-only match.
    #[serde(default = "default_birth_year_window")]
    pub birth_year_window: i32,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Wall-clock limit for one detection run.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            exact_confidence: default_exact_confidence(),
            fuzzy_confidence_cap: default_fuzzy_cap(),
            same_given_father_base: default_same_given_father_base(),
            same_given_father_cap: default_same_given_father_cap(),
            sibling_boost: default_sibling_boost(),
            shared_parent_confidence: default_shared_parent_confidence(),
            given_only_confidence: default_given_only_confidence(),
            birth_year_window: default_birth_year_window(),
            default_page_size: default_page_size(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

/// Relationship Prediction Engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u8,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: u8,
    /// Rules the scan runs, in order.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleKind>,
    #[serde(default = "default_min_parent_age")]
    pub min_parent_age: i32,
    #[serde(default = "default_max_father_age")]
    pub max_father_age: i32,
    #[serde(default = "default_max_mother_age")]
    pub max_mother_age: i32,
    /// Children of one family are expected within this many years of each other.
    #[serde(default = "default_sibling_birth_span")]
    pub sibling_birth_span: i32,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

impl PredictionConfig {
    pub fn level_for(&self, confidence: u8) -> ConfidenceLevel {
        ConfidenceLevel::from_score(confidence, self.high_threshold, self.medium_threshold)
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            rules: default_rules(),
            min_parent_age: default_min_parent_age(),
            max_father_age: default_max_father_age(),
            max_mother_age: default_max_mother_age(),
            sibling_birth_span: default_sibling_birth_span(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditConfig {
    /// Directory for file-backed audit entries. In-memory when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_max_depth() -> usize {
    12
}

fn default_max_depth_cap() -> usize {
    30
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

fn default_exact_confidence() -> u8 {
    95
}

fn default_fuzzy_cap() -> u8 {
    90
}

fn default_same_given_father_base() -> u8 {
    60
}

fn default_same_given_father_cap() -> u8 {
    95
}

fn default_sibling_boost() -> u8 {
    10
}

fn default_shared_parent_confidence() -> u8 {
    92
}

fn default_given_only_confidence() -> u8 {
    55
}

fn default_birth_year_window() -> i32 {
    5
}

fn default_page_size() -> usize {
    50
}

fn default_scan_timeout_secs() -> u64 {
    120
}

fn default_high_threshold() -> u8 {
    ConfidenceLevel::DEFAULT_HIGH
}

fn default_medium_threshold() -> u8 {
    ConfidenceLevel::DEFAULT_MEDIUM
}

fn default_rules() -> Vec<RuleKind> {
    RuleKind::ALL.to_vec()
}

fn default_min_parent_age() -> i32 {
    14
}

fn default_max_father_age() -> i32 {
    75
}

fn default_max_mother_age() -> i32 {
    55
}

fn default_sibling_birth_span() -> i32 {
    25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KinshipConfig::default();
        assert_eq!(config.guard.max_retries, 3);
        assert_eq!(config.resolver.default_max_depth, 12);
        assert_eq!(config.duplicates.exact_confidence, 95);
        assert_eq!(config.duplicates.birth_year_window, 5);
        assert_eq!(config.predictions.rules.len(), 5);
        assert!(config.audit.dir.is_none());
    }

    #[test]
    fn test_level_for_uses_thresholds() {
        let config = PredictionConfig {
            high_threshold: 90,
            ..Default::default()
        };
        assert_eq!(config.level_for(88), ConfidenceLevel::Medium);
        assert_eq!(config.level_for(90), ConfidenceLevel::High);
    }

    #[test]
    fn test_load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("kinship");
        std::fs::write(
            prefix.with_extension("toml"),
            "[duplicates]\nfuzzy_threshold = 0.9\n\n[predictions]\nrules = [\"missing_union\"]\n",
        )
        .unwrap();

        let config = KinshipConfig::load(prefix.to_str().unwrap()).unwrap();
        assert!((config.duplicates.fuzzy_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.duplicates.exact_confidence, 95);
        assert_eq!(config.predictions.rules, vec![RuleKind::MissingUnion]);
        assert_eq!(config.guard.lock_timeout_ms, 2_000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = KinshipConfig::load("/nonexistent/kinship-config").unwrap();
        assert_eq!(config.resolver.max_depth_cap, 30);
    }
}
