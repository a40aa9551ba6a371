//! Duplicate candidate detection.
//!
//! Every person gets a profile holding the normalized composite name (given,
//! father's given, grandfather's given) taken from the parent edges, or from
//! the recorded patronymic fields where no father is linked. Profiles are then
//! compared pairwise under the strategies the detection mode enables.

use std::collections::{BTreeSet, HashMap};

use kinship_core::config::DuplicateConfig;
use kinship_core::{
    DuplicateCandidate, MatchEvidence, MatchStrategy, NamePart, PersonId, Sex, TenantId,
};

use crate::control::{ScanControl, CHECK_INTERVAL};
use crate::error::Result;
use crate::graph::{ordered_pair, ActiveGraph};
use crate::names::{composite, normalize, similarity};
use crate::types::DetectionMode;

/// Comparable view of one person.
#[derive(Debug, Clone)]
struct Profile {
    id: PersonId,
    tenant_id: TenantId,
    sex: Sex,
    given: String,
    father: Option<String>,
    grandfather: Option<String>,
    composite: String,
    /// Every parent, any edge type.
    parents: BTreeSet<PersonId>,
    /// Normalized given names of the person's siblings.
    sibling_names: BTreeSet<String>,
    birth_year: Option<i32>,
}

impl Profile {
    fn has_ancestry_names(&self) -> bool {
        self.father.is_some() || self.grandfather.is_some()
    }

    fn has_parent_linkage(&self) -> bool {
        !self.parents.is_empty()
    }
}

fn non_empty(name: String) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn recorded(field: Option<&String>) -> Option<String> {
    field.map(|s| normalize(s)).and_then(non_empty)
}

fn profiles(graph: &ActiveGraph) -> Vec<Profile> {
    (0..graph.len())
        .map(|i| {
            let person = graph.person(i);
            let name = person.primary_name();
            let given = normalize(person.given_name());

            let (father, grandfather) = match graph.father_of(i) {
                Some(f) => {
                    let father = non_empty(normalize(graph.person(f).given_name()));
                    let grandfather = match graph.father_of(f) {
                        Some(gf) => non_empty(normalize(graph.person(gf).given_name())),
                        None => recorded(
                            graph
                                .person(f)
                                .primary_name()
                                .and_then(|n| n.patronymic.as_ref()),
                        )
                        .or_else(|| recorded(name.and_then(|n| n.grandfather.as_ref()))),
                    };
                    (father, grandfather)
                }
                None => (
                    recorded(name.and_then(|n| n.patronymic.as_ref())),
                    recorded(name.and_then(|n| n.grandfather.as_ref())),
                ),
            };

            let sibling_names = graph
                .siblings_of(i)
                .into_iter()
                .map(|s| normalize(graph.person(s).given_name()))
                .filter(|n| !n.is_empty())
                .collect();

            Profile {
                id: person.id,
                tenant_id: person.tenant_id,
                sex: person.sex,
                composite: composite(&given, father.as_deref(), grandfather.as_deref()),
                given,
                father,
                grandfather,
                parents: graph
                    .parent_indexes(i)
                    .into_iter()
                    .map(|p| graph.id_of(p))
                    .collect(),
                sibling_names,
                birth_year: person.birth_year(),
            }
        })
        .collect()
}

/// Pairwise comparison settings for one run.
struct Matcher<'a> {
    config: &'a DuplicateConfig,
    mode: DetectionMode,
    cross_tenant: bool,
}

impl Matcher<'_> {
    fn enabled(&self, strategy: MatchStrategy) -> bool {
        if self.cross_tenant && strategy == MatchStrategy::SharedParent {
            return false;
        }
        self.mode.includes(strategy)
    }

    /// Every strategy that matches the pair.
    fn compare(&self, x: &Profile, y: &Profile) -> Vec<DuplicateCandidate> {
        let mut out = Vec::new();
        if x.given.is_empty() && y.given.is_empty() {
            return out;
        }
        let same_sex = x.sex == y.sex;
        let same_given = !x.given.is_empty() && x.given == y.given;
        let base = |x: &Profile, y: &Profile| MatchEvidence {
            composite_a: x.composite.clone(),
            composite_b: y.composite.clone(),
            ..Default::default()
        };

        if same_sex && !x.composite.is_empty() {
            if x.composite == y.composite {
                if self.enabled(MatchStrategy::ExactComposite) && x.has_ancestry_names() {
                    let mut evidence = base(x, y);
                    evidence.matched_parts = matched_parts(x);
                    evidence.similarity = Some(1.0);
                    out.push(candidate(
                        x,
                        y,
                        MatchStrategy::ExactComposite,
                        self.config.exact_confidence,
                        evidence,
                    ));
                }
            } else if self.enabled(MatchStrategy::FuzzyComposite) {
                let score = similarity(&x.composite, &y.composite);
                if score >= self.config.fuzzy_threshold {
                    let confidence =
                        ((score * 100.0).round() as u8).min(self.config.fuzzy_confidence_cap);
                    let mut evidence = base(x, y);
                    evidence.similarity = Some(score);
                    out.push(candidate(
                        x,
                        y,
                        MatchStrategy::FuzzyComposite,
                        confidence,
                        evidence,
                    ));
                }
            }
        }

        let sexes_compatible = same_sex || !x.sex.is_known() || !y.sex.is_known();
        if self.enabled(MatchStrategy::SameGivenFather)
            && same_given
            && sexes_compatible
            && x.father.is_some()
            && x.father == y.father
            && x.grandfather != y.grandfather
        {
            let shared = x.sibling_names.intersection(&y.sibling_names).count();
            let boost = u32::from(self.config.sibling_boost) * shared as u32;
            let confidence = (u32::from(self.config.same_given_father_base) + boost)
                .min(u32::from(self.config.same_given_father_cap)) as u8;
            let mut evidence = base(x, y);
            evidence.matched_parts = vec![NamePart::Given, NamePart::Father];
            evidence.shared_siblings = shared;
            out.push(candidate(
                x,
                y,
                MatchStrategy::SameGivenFather,
                confidence,
                evidence,
            ));
        }

        if self.enabled(MatchStrategy::SharedParent) && same_given && same_sex {
            let shared: Vec<PersonId> = x.parents.intersection(&y.parents).copied().collect();
            if !shared.is_empty() {
                let mut evidence = base(x, y);
                evidence.matched_parts = vec![NamePart::Given];
                evidence.shared_parents = shared;
                out.push(candidate(
                    x,
                    y,
                    MatchStrategy::SharedParent,
                    self.config.shared_parent_confidence,
                    evidence,
                ));
            }
        }

        if self.enabled(MatchStrategy::GivenNameOnly)
            && same_given
            && same_sex
            && !x.has_parent_linkage()
            && !y.has_parent_linkage()
        {
            let years_fit = match (x.birth_year, y.birth_year) {
                (Some(a), Some(b)) => (a - b).abs() <= self.config.birth_year_window,
                _ => true,
            };
            if years_fit {
                let mut evidence = base(x, y);
                evidence.matched_parts = vec![NamePart::Given];
                out.push(candidate(
                    x,
                    y,
                    MatchStrategy::GivenNameOnly,
                    self.config.given_only_confidence,
                    evidence,
                ));
            }
        }

        out
    }
}

fn matched_parts(p: &Profile) -> Vec<NamePart> {
    let mut parts = vec![NamePart::Given];
    if p.father.is_some() {
        parts.push(NamePart::Father);
    }
    if p.grandfather.is_some() {
        parts.push(NamePart::Grandfather);
    }
    parts
}

fn candidate(
    x: &Profile,
    y: &Profile,
    strategy: MatchStrategy,
    confidence: u8,
    evidence: MatchEvidence,
) -> DuplicateCandidate {
    DuplicateCandidate {
        person_a: x.id,
        tenant_a: x.tenant_id,
        person_b: y.id,
        tenant_b: y.tenant_id,
        strategy,
        confidence: confidence.min(100),
        evidence,
    }
}

/// Whether `new` should replace `current` as the pair's reported match.
fn outranks(new: &DuplicateCandidate, current: &DuplicateCandidate) -> bool {
    new.confidence > current.confidence
        || (new.confidence == current.confidence
            && new.strategy.as_str() < current.strategy.as_str())
}

/// Detect duplicates within `source`, or between `source` and `target`.
///
/// Returns the full ranked list: best match per pair, linked pairs dropped,
/// `min_confidence` applied, ordered by confidence then pair ids.
pub fn detect(
    source: &ActiveGraph,
    target: Option<&ActiveGraph>,
    mode: DetectionMode,
    min_confidence: u8,
    config: &DuplicateConfig,
    control: &ScanControl,
) -> Result<Vec<DuplicateCandidate>> {
    let left = profiles(source);
    let right = target.map(profiles);
    let matcher = Matcher {
        config,
        mode,
        cross_tenant: target.is_some(),
    };

    let mut best: HashMap<(PersonId, PersonId), DuplicateCandidate> = HashMap::new();
    let mut comparisons = 0usize;
    let mut offer = |found: Vec<DuplicateCandidate>| {
        for c in found {
            match best.get(&c.pair_key()) {
                Some(current) if !outranks(&c, current) => {}
                _ => {
                    best.insert(c.pair_key(), c);
                }
            }
        }
    };

    match &right {
        None => {
            for (i, x) in left.iter().enumerate() {
                for y in &left[i + 1..] {
                    if comparisons % CHECK_INTERVAL == 0 {
                        control.check()?;
                    }
                    comparisons += 1;
                    offer(matcher.compare(x, y));
                }
            }
        }
        Some(right) => {
            for x in &left {
                for y in right {
                    if comparisons % CHECK_INTERVAL == 0 {
                        control.check()?;
                    }
                    comparisons += 1;
                    offer(matcher.compare(x, y));
                }
            }
        }
    }

    let is_linked = |a: PersonId, b: PersonId| {
        source.is_linked(a, b) || target.map(|t| t.is_linked(a, b)).unwrap_or(false)
    };

    let mut ranked: Vec<DuplicateCandidate> = best
        .into_values()
        .filter(|c| !is_linked(c.person_a, c.person_b))
        .filter(|c| c.confidence >= min_confidence)
        .collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| ordered_pair(a.person_a, a.person_b).cmp(&ordered_pair(b.person_a, b.person_b)))
    });

    tracing::debug!(
        tenant = %source.tenant_id,
        comparisons,
        candidates = ranked.len(),
        "Duplicate comparison finished"
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::graph::fixtures::Fixture;
    use kinship_core::{PartialDate, Person, PersonLink, PersonName};

    fn named(fx: &mut Fixture, given: &str, father: &str, grandfather: &str, sex: Sex) -> PersonId {
        let tenant = fx.tenant();
        fx.add(Person::new(
            tenant,
            sex,
            PersonName::new("ar", given)
                .with_patronymic(father)
                .with_grandfather(grandfather),
        ))
    }

    fn run(fx: &Fixture, mode: DetectionMode) -> Vec<DuplicateCandidate> {
        detect(
            &fx.graph(),
            None,
            mode,
            0,
            &DuplicateConfig::default(),
            &ScanControl::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_exact_composite_from_recorded_names() {
        let mut fx = Fixture::new();
        named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);
        named(&mut fx, "ali", "OMAR", "Hassan", Sex::Male);

        let found = run(&fx, DetectionMode::All);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::ExactComposite);
        assert_eq!(found[0].confidence, 95);
        assert_eq!(found[0].evidence.composite_a, "ali omar hassan");
        assert_eq!(
            found[0].evidence.matched_parts,
            vec![NamePart::Given, NamePart::Father, NamePart::Grandfather]
        );
    }

    #[test]
    fn test_composite_prefers_linked_father() {
        let mut fx = Fixture::new();
        let gf = fx.person("Hassan", Sex::Male);
        let father = fx.person("Omar", Sex::Male);
        let linked = fx.person("Ali", Sex::Male);
        fx.edge(gf, father);
        fx.edge(father, linked);
        named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);

        let found = run(&fx, DetectionMode::Exact);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence, 95);
    }

    #[test]
    fn test_arabic_spelling_variants_match_exactly() {
        let mut fx = Fixture::new();
        named(&mut fx, "أحمد", "مصطفى", "حمزة", Sex::Male);
        named(&mut fx, "احمد", "مصطفي", "حمزه", Sex::Male);

        let found = run(&fx, DetectionMode::Exact);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::ExactComposite);
    }

    #[test]
    fn test_fuzzy_composite_is_capped() {
        let mut fx = Fixture::new();
        named(&mut fx, "Mohammed", "Abdullah", "Hassan", Sex::Male);
        named(&mut fx, "Mohamed", "Abdullah", "Hassan", Sex::Male);

        let found = run(&fx, DetectionMode::Fuzzy);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::FuzzyComposite);
        assert!(found[0].confidence <= 90 && found[0].confidence >= 85);
        assert!(run(&fx, DetectionMode::Exact).is_empty());
    }

    #[test]
    fn test_different_sex_never_matches_by_composite() {
        let mut fx = Fixture::new();
        named(&mut fx, "Nour", "Omar", "Hassan", Sex::Male);
        named(&mut fx, "Nour", "Omar", "Hassan", Sex::Female);
        assert!(run(&fx, DetectionMode::Exact).is_empty());
    }

    #[test]
    fn test_same_given_father_boosted_by_siblings() {
        let mut fx = Fixture::new();
        let f1 = fx.person("Omar", Sex::Male);
        let f2 = fx.person("Omar", Sex::Male);
        let g1 = fx.person("Hassan", Sex::Male);
        let g2 = fx.person("Khalid", Sex::Male);
        fx.edge(g1, f1);
        fx.edge(g2, f2);
        let a = fx.person("Ali", Sex::Male);
        let b = fx.person("Ali", Sex::Male);
        let sa = fx.person("Zainab", Sex::Female);
        let sb = fx.person("Zainab", Sex::Female);
        fx.edge(f1, a);
        fx.edge(f1, sa);
        fx.edge(f2, b);
        fx.edge(f2, sb);

        let config = DuplicateConfig {
            fuzzy_threshold: 0.99,
            ..Default::default()
        };
        let found = detect(&fx.graph(), None, DetectionMode::Fuzzy, 0, &config, &ScanControl::new()).unwrap();
        let ali = found
            .iter()
            .find(|c| c.pair_key() == ordered_pair(a, b))
            .expect("ali pair");
        assert_eq!(ali.strategy, MatchStrategy::SameGivenFather);
        assert_eq!(ali.confidence, 70);
        assert_eq!(ali.evidence.shared_siblings, 1);
    }

    #[test]
    fn test_shared_parent_and_tie_break() {
        let mut fx = Fixture::new();
        let p = fx.person("Omar", Sex::Male);
        let a = fx.person("Ali", Sex::Male);
        let b = fx.person("Ali", Sex::Male);
        fx.edge(p, a);
        fx.edge(p, b);

        let found = run(&fx, DetectionMode::Exact);
        assert_eq!(found.len(), 1);
        // Identical composites score 95 and outrank the 92 shared-parent match.
        assert_eq!(found[0].strategy, MatchStrategy::ExactComposite);

        let config = DuplicateConfig {
            exact_confidence: 92,
            ..Default::default()
        };
        let tied = detect(&fx.graph(), None, DetectionMode::Exact, 0, &config, &ScanControl::new()).unwrap();
        assert_eq!(tied[0].strategy, MatchStrategy::ExactComposite);

        let config = DuplicateConfig {
            exact_confidence: 80,
            ..Default::default()
        };
        let lower = detect(&fx.graph(), None, DetectionMode::Exact, 0, &config, &ScanControl::new()).unwrap();
        assert_eq!(lower[0].strategy, MatchStrategy::SharedParent);
        assert_eq!(lower[0].evidence.shared_parents, vec![p]);
    }

    #[test]
    fn test_given_name_only_respects_birth_window() {
        let mut fx = Fixture::new();
        let tenant = fx.tenant();
        fx.add(Person::new(tenant, Sex::Female, PersonName::new("ar", "Maryam")).with_birth(PartialDate::year(1900)));
        fx.add(Person::new(tenant, Sex::Female, PersonName::new("ar", "Maryam")).with_birth(PartialDate::year(1904)));
        fx.add(Person::new(tenant, Sex::Female, PersonName::new("ar", "Maryam")).with_birth(PartialDate::year(1950)));

        let found = run(&fx, DetectionMode::All);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::GivenNameOnly);
        assert_eq!(found[0].confidence, 55);
        assert!(run(&fx, DetectionMode::Fuzzy).is_empty());
    }

    #[test]
    fn test_linked_pairs_and_min_confidence() {
        let mut fx = Fixture::new();
        let a = named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);
        let b = named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);
        named(&mut fx, "Yusuf", "Omar", "Hassan", Sex::Male);
        named(&mut fx, "Yousef", "Omar", "Hassan", Sex::Male);

        let all = run(&fx, DetectionMode::All);
        assert_eq!(all.len(), 2);
        assert!(all[0].confidence >= all[1].confidence);

        let tenant = fx.tenant();
        fx.snapshot.links.push(PersonLink::new(tenant, b, tenant, a, "reviewer"));
        let remaining = run(&fx, DetectionMode::All);
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].pair_key(), ordered_pair(a, b));

        let strict = detect(&fx.graph(), None, DetectionMode::All, 95, &DuplicateConfig::default(), &ScanControl::new()).unwrap();
        assert!(strict.is_empty());
    }

    #[test]
    fn test_cross_tenant_skips_shared_parent() {
        let mut left = Fixture::new();
        let mut right = Fixture::new();
        named(&mut left, "Ali", "Omar", "Hassan", Sex::Male);
        named(&mut right, "Ali", "Omar", "Hassan", Sex::Male);
        named(&mut right, "Fatima", "Omar", "Hassan", Sex::Female);

        let found = detect(
            &left.graph(),
            Some(&right.graph()),
            DetectionMode::All,
            0,
            &DuplicateConfig::default(),
            &ScanControl::new(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tenant_a, left.tenant());
        assert_eq!(found[0].tenant_b, right.tenant());
    }

    #[test]
    fn test_cancelled_scan_stops() {
        let mut fx = Fixture::new();
        named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);
        named(&mut fx, "Ali", "Omar", "Hassan", Sex::Male);
        let control = ScanControl::new().for_operation("detect_duplicates");
        control.cancel();

        let err = detect(&fx.graph(), None, DetectionMode::All, 0, &DuplicateConfig::default(), &control)
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled { .. }));
    }
}
