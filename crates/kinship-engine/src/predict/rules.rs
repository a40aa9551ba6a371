//! The prediction rules.
//!
//! Each rule reads the graph through a [`RuleContext`] and returns unclamped
//! proposals; the scan merges and scores them.

use std::collections::{BTreeMap, HashMap};

use kinship_core::{ParentType, RuleKind, Sex, Union, UnionKind};

use super::{Proposal, RuleContext};
use crate::graph::ActiveGraph;
use crate::names::normalize;

/// `candidate` could fill a missing parent slot of `child`.
fn missing_parent(graph: &ActiveGraph, candidate: usize, child: usize) -> bool {
    if graph.is_parent_of(candidate, child) {
        return false;
    }
    match graph.sex_of(candidate) {
        Sex::Unknown => graph.parent_indexes(child).len() < 2,
        sex => !graph.has_parent_of_sex(child, sex),
    }
}

fn union_kind(union: &Union) -> &'static str {
    match union.kind {
        UnionKind::Marriage => "marriage",
        UnionKind::Partnership => "partnership",
    }
}

/// +10 when the birth falls inside the union's dates, -20 when it precedes them.
fn union_timing(union: &Union, birth_year: Option<i32>) -> i32 {
    let (Some(birth), Some(start)) = (birth_year, union.start.map(|d| d.year)) else {
        return 0;
    };
    if birth < start {
        return -20;
    }
    match union.end.map(|d| d.year) {
        Some(end) if birth > end => 0,
        _ => 10,
    }
}

/// A union partner of a child's parent is proposed as the child's other parent.
pub fn spouse_child_gap(ctx: &RuleContext<'_>) -> Vec<Proposal> {
    let graph = ctx.graph;
    let mut out = Vec::new();

    for (step, union) in graph.unions.iter().enumerate() {
        if ctx.interrupted(step) {
            break;
        }
        let members: Vec<usize> = union
            .members
            .iter()
            .filter_map(|m| graph.index_of(&m.person_id))
            .collect();

        for &x in &members {
            for z in graph.sibling_children(x) {
                let candidates: Vec<usize> = members
                    .iter()
                    .copied()
                    .filter(|&y| y != x && missing_parent(graph, y, z) && ctx.may_parent(y, z))
                    .collect();
                let rivals = candidates.len().saturating_sub(1) as i32;

                for &y in &candidates {
                    let mut score = 70;
                    if graph.parent_indexes(z).len() == 1 {
                        score += 15;
                    }
                    score += union_timing(union, graph.person(z).birth_year());
                    score -= 15 * rivals;
                    score += ctx.age_gap_adjustment(y, z);

                    let explanation = format!(
                        "{} is in {} {} with {}, a parent of {}, but is not recorded as {}'s parent",
                        ctx.name(y),
                        union_kind(union),
                        union.id,
                        ctx.name(x),
                        ctx.name(z),
                        ctx.name(z),
                    );
                    out.push(Proposal::parent_child(
                        RuleKind::SpouseChildGap,
                        y,
                        z,
                        score,
                        explanation,
                    ));
                }
            }
        }
    }
    out
}

/// Two people who co-parent a child but share no union.
///
/// Only sibling-defining edges make co-parents: a step or foster parent is
/// partnered with the other side, not with the biological parent.
pub fn missing_union(ctx: &RuleContext<'_>) -> Vec<Proposal> {
    let graph = ctx.graph;
    let mut co_parents: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();

    for child in 0..graph.len() {
        if ctx.interrupted(child) {
            break;
        }
        let parents: Vec<usize> = graph.sibling_parents(child).into_iter().collect();
        for (i, &p) in parents.iter().enumerate() {
            for &q in &parents[i + 1..] {
                co_parents.entry((p, q)).or_default().push(child);
            }
        }
    }

    let mut out = Vec::new();
    for ((p, q), children) in co_parents {
        if graph.share_union(p, q) || graph.is_parent_of(p, q) || graph.is_parent_of(q, p) {
            continue;
        }
        let shared = children.len() as i32;
        let mut score = (70 + 10 * (shared - 1)).min(95);
        let non_biological = children.iter().any(|&c| {
            graph.parents[c]
                .iter()
                .any(|l| (l.index == p || l.index == q) && l.edge_type != ParentType::Biological)
        });
        if non_biological {
            score -= 20;
        }

        let names: Vec<String> = children.iter().map(|&c| ctx.name(c)).collect();
        let explanation = format!(
            "{} and {} are both recorded parents of {} but share no union",
            ctx.name(p),
            ctx.name(q),
            names.join(", "),
        );
        out.push(Proposal::union(
            graph,
            RuleKind::MissingUnion,
            p,
            q,
            score,
            explanation,
        ));
    }
    out
}

/// A sibling's other parent is proposed for a person missing that parent.
///
/// Every shared parent P1 is scored and the best-supported one is kept.
pub fn sibling_parent_gap(ctx: &RuleContext<'_>) -> Vec<Proposal> {
    let graph = ctx.graph;
    // (p2, s2) -> (score, p1, s1, siblings already with p2)
    let mut best: BTreeMap<(usize, usize), (i32, usize, usize, usize)> = BTreeMap::new();

    for s2 in 0..graph.len() {
        if ctx.interrupted(s2) {
            break;
        }
        let siblings = graph.siblings_of(s2);
        for p1 in graph.sibling_parents(s2) {
            for s1 in graph.sibling_children(p1) {
                if s1 == s2 {
                    continue;
                }
                for p2 in graph.sibling_parents(s1) {
                    if p2 == p1 || !missing_parent(graph, p2, s2) || !ctx.may_parent(p2, s2) {
                        continue;
                    }

                    let mut score = 55;
                    if graph.share_union(p1, p2) {
                        score += 20;
                    }
                    let with_p2 = siblings
                        .iter()
                        .filter(|&&s| graph.is_parent_of(p2, s))
                        .count();
                    if with_p2 >= 2 {
                        score += 10;
                    }
                    score += ctx.age_gap_adjustment(p2, s2);

                    match best.get(&(p2, s2)) {
                        Some(&(kept, ..)) if kept >= score => {}
                        _ => {
                            best.insert((p2, s2), (score, p1, s1, with_p2));
                        }
                    }
                }
            }
        }
    }

    best.into_iter()
        .map(|((p2, s2), (score, p1, s1, with_p2))| {
            let explanation = format!(
                "{} shares parent {} with {}, whose other parent {} is not recorded for {} ({} sibling(s) already have {})",
                ctx.name(s2),
                ctx.name(p1),
                ctx.name(s1),
                ctx.name(p2),
                ctx.name(s2),
                with_p2,
                ctx.name(p2),
            );
            Proposal::parent_child(RuleKind::SiblingParentGap, p2, s2, score, explanation)
        })
        .collect()
}

/// A recorded patronymic names a person in the tree who could be the father.
pub fn patronymic_name(ctx: &RuleContext<'_>) -> Vec<Proposal> {
    let graph = ctx.graph;

    let mut by_given: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..graph.len() {
        if graph.sex_of(i) == Sex::Female {
            continue;
        }
        let given = normalize(graph.person(i).given_name());
        if !given.is_empty() {
            by_given.entry(given).or_default().push(i);
        }
    }

    let mut out = Vec::new();
    for x in 0..graph.len() {
        if ctx.interrupted(x) {
            break;
        }
        if graph.has_parent_of_sex(x, Sex::Male) {
            continue;
        }
        let Some(name) = graph.person(x).primary_name() else {
            continue;
        };
        let Some(patronymic) = name.patronymic.as_deref().map(normalize).filter(|p| !p.is_empty())
        else {
            continue;
        };
        let grandfather = name
            .grandfather
            .as_deref()
            .map(normalize)
            .filter(|g| !g.is_empty());

        let candidates: Vec<usize> = by_given
            .get(&patronymic)
            .map(|c| {
                c.iter()
                    .copied()
                    .filter(|&c| !graph.is_parent_of(c, x) && ctx.may_parent(c, x))
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            continue;
        }
        let share = candidates.len() as i32;

        for &c in &candidates {
            let grandfather_matches = match (&grandfather, graph.father_of(c)) {
                (Some(recorded), Some(f)) => normalize(graph.person(f).given_name()) == *recorded,
                _ => false,
            };
            let mut score = 50;
            if grandfather_matches {
                score += 30;
            }
            score /= share;
            score += ctx.age_gap_adjustment(c, x);

            let mut explanation = format!(
                "{}'s recorded father name \"{}\" matches {}",
                ctx.name(x),
                patronymic,
                ctx.name(c),
            );
            if grandfather_matches {
                explanation.push_str(", whose own father matches the recorded grandfather");
            }
            if share > 1 {
                explanation.push_str(&format!(" (one of {share} candidates)"));
            }
            out.push(Proposal::parent_child(
                RuleKind::PatronymicName,
                c,
                x,
                score,
                explanation,
            ));
        }
    }
    out
}

/// A parentless person whose family name and birth year fit exactly one man.
pub fn age_family(ctx: &RuleContext<'_>) -> Vec<Proposal> {
    let graph = ctx.graph;
    let span = ctx.config.sibling_birth_span;

    let family_of = |i: usize| {
        graph
            .person(i)
            .primary_name()
            .and_then(|n| n.family.as_deref())
            .map(normalize)
            .filter(|f| !f.is_empty())
    };

    let mut men: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..graph.len() {
        if graph.sex_of(i) != Sex::Male || graph.person(i).birth_year().is_none() {
            continue;
        }
        if let Some(family) = family_of(i) {
            men.entry(family).or_default().push(i);
        }
    }

    let mut out = Vec::new();
    for x in 0..graph.len() {
        if ctx.interrupted(x) {
            break;
        }
        if !graph.parents[x].is_empty() {
            continue;
        }
        let (Some(family), Some(born)) = (family_of(x), graph.person(x).birth_year()) else {
            continue;
        };
        let Some(pool) = men.get(&family) else {
            continue;
        };

        let fitting: Vec<(usize, usize)> = pool
            .iter()
            .copied()
            .filter(|&m| m != x && ctx.may_parent(m, x))
            .filter(|&m| {
                ctx.parent_age(m, x)
                    .map(|age| ctx.plausible_parent_age(age, Sex::Male))
                    .unwrap_or(false)
            })
            .filter_map(|m| {
                let years: Vec<i32> = graph
                    .child_indexes(m)
                    .into_iter()
                    .filter_map(|c| graph.person(c).birth_year())
                    .collect();
                years
                    .iter()
                    .all(|y| (y - born).abs() <= span)
                    .then_some((m, years.len()))
            })
            .collect();

        let &[(father, siblings)] = fitting.as_slice() else {
            continue;
        };
        let score = (65 + 5 * siblings as i32).min(85);
        let explanation = format!(
            "{} is the only {} man of plausible age at {}'s birth in {} ({} child(ren) born within {} years)",
            ctx.name(father),
            family,
            ctx.name(x),
            born,
            siblings,
            span,
        );
        out.push(Proposal::parent_child(
            RuleKind::AgeFamily,
            father,
            x,
            score,
            explanation,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ScanControl;
    use crate::graph::fixtures::Fixture;
    use kinship_core::config::PredictionConfig;
    use kinship_core::{PartialDate, Person, PersonId, PersonName, PredictedType};

    fn proposals(fx: &Fixture, rule: fn(&RuleContext<'_>) -> Vec<Proposal>) -> Vec<(PersonId, PersonId, i32, String)> {
        let g = fx.graph();
        let config = PredictionConfig::default();
        let control = ScanControl::new();
        let ctx = RuleContext::new(&g, &config, &control);
        rule(&ctx)
            .into_iter()
            .map(|p| (g.id_of(p.source), g.id_of(p.target), p.confidence, p.explanation))
            .collect()
    }

    #[test]
    fn test_spouse_child_gap_proposes_partner() {
        let mut fx = Fixture::new();
        let x = fx.person("Omar", Sex::Male);
        let y = fx.person("Huda", Sex::Female);
        let z = fx.person("Ali", Sex::Male);
        let union_id = fx.union(x, y).id;
        fx.edge(x, z);

        let found = proposals(&fx, spouse_child_gap);
        assert_eq!(found.len(), 1);
        let (source, target, score, explanation) = &found[0];
        assert_eq!((*source, *target), (y, z));
        assert_eq!(*score, 85);
        assert!(explanation.contains(&union_id.to_string()));
    }

    #[test]
    fn test_spouse_child_gap_timing_and_polygamy() {
        let mut fx = Fixture::new();
        let x = fx.person("Omar", Sex::Male);
        let w1 = fx.person("Huda", Sex::Female);
        let w2 = fx.person("Amal", Sex::Female);
        let z = fx.person_born("Ali", Sex::Male, 1970);
        let union = fx.union(x, w1);
        union.start = Some(PartialDate::year(1975));
        let wife = kinship_core::UnionMember {
            person_id: w2,
            role: kinship_core::UnionRole::Wife,
        };
        union.members.push(wife);
        fx.edge(x, z);

        let found = proposals(&fx, spouse_child_gap);
        assert_eq!(found.len(), 2);
        // 70 + 15 single parent - 20 born before union - 15 rival partner
        assert!(found.iter().all(|(_, _, score, _)| *score == 50));
    }

    #[test]
    fn test_spouse_child_gap_skips_filled_slot() {
        let mut fx = Fixture::new();
        let x = fx.person("Omar", Sex::Male);
        let y = fx.person("Huda", Sex::Female);
        let other_mum = fx.person("Amal", Sex::Female);
        let z = fx.person("Ali", Sex::Male);
        fx.union(x, y);
        fx.edge(x, z);
        fx.edge(other_mum, z);

        assert!(proposals(&fx, spouse_child_gap).is_empty());
    }

    #[test]
    fn test_missing_union_scores_shared_children() {
        let mut fx = Fixture::new();
        let p = fx.person("Omar", Sex::Male);
        let q = fx.person("Huda", Sex::Female);
        let kids: Vec<PersonId> = (0..3).map(|i| fx.person(&format!("kid{i}"), Sex::Male)).collect();
        for &k in &kids {
            fx.edge(p, k);
            fx.edge(q, k);
        }

        let found = proposals(&fx, missing_union);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].2, 90);
        let pair = if p <= q { (p, q) } else { (q, p) };
        assert_eq!((found[0].0, found[0].1), pair);

        fx.typed_edge(p, kids[0], ParentType::Step);
        let g = fx.graph();
        let config = PredictionConfig::default();
        let control = ScanControl::new();
        let ctx = RuleContext::new(&g, &config, &control);
        let again = missing_union(&ctx);
        assert_eq!(again[0].confidence, 70);
        assert_eq!(again[0].predicted_type, PredictedType::Union);
    }

    #[test]
    fn test_missing_union_ignores_step_parent() {
        let mut fx = Fixture::new();
        let omar = fx.person("Omar", Sex::Male);
        let huda = fx.person("Huda", Sex::Female);
        let khalid = fx.person("Khalid", Sex::Male);
        let ali = fx.person("Ali", Sex::Male);
        fx.edge(omar, ali);
        fx.edge(huda, ali);
        fx.typed_edge(khalid, ali, ParentType::Step);
        fx.union(huda, khalid);

        let found = proposals(&fx, missing_union);
        assert_eq!(found.len(), 1);
        let pair = if omar <= huda { (omar, huda) } else { (huda, omar) };
        assert_eq!((found[0].0, found[0].1), pair);
        assert!(!found[0].3.contains("Khalid"));
    }

    #[test]
    fn test_sibling_parent_gap_keeps_best_shared_parent() {
        let mut fx = Fixture::new();
        let omar = fx.person("Omar", Sex::Male);
        let yusuf = fx.person("Yusuf", Sex::Male);
        let huda = fx.person("Huda", Sex::Female);
        let ali = fx.person("Ali", Sex::Male);
        let sara = fx.person("Sara", Sex::Female);
        let zaid = fx.person("Zaid", Sex::Male);
        // Zaid's fathers: Omar (no union with Huda) and Yusuf (married to Huda).
        fx.edge(omar, zaid);
        fx.typed_edge(yusuf, zaid, ParentType::Adoptive);
        fx.edge(omar, ali);
        fx.edge(huda, ali);
        fx.edge(yusuf, sara);
        fx.edge(huda, sara);
        fx.union(yusuf, huda);

        let found = proposals(&fx, sibling_parent_gap);
        assert_eq!(found.len(), 1);
        let (source, target, score, explanation) = &found[0];
        assert_eq!((*source, *target), (huda, zaid));
        // 55 + 20 shared union + 10 two siblings with Huda
        assert_eq!(*score, 85);
        assert!(explanation.contains("shares parent Yusuf"));
    }

    #[test]
    fn test_sibling_parent_gap() {
        let mut fx = Fixture::new();
        let p1 = fx.person("Omar", Sex::Male);
        let p2 = fx.person("Huda", Sex::Female);
        let s1 = fx.person("Ali", Sex::Male);
        let s3 = fx.person("Sara", Sex::Female);
        let s2 = fx.person("Zaid", Sex::Male);
        fx.union(p1, p2);
        for s in [s1, s3] {
            fx.edge(p1, s);
            fx.edge(p2, s);
        }
        fx.edge(p1, s2);

        let found = proposals(&fx, sibling_parent_gap);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].0, found[0].1), (p2, s2));
        assert_eq!(found[0].2, 85);
    }

    #[test]
    fn test_patronymic_name_divides_between_candidates() {
        let mut fx = Fixture::new();
        let tenant = fx.tenant();
        let hassan = fx.person("Hassan", Sex::Male);
        let omar1 = fx.person("Omar", Sex::Male);
        let omar2 = fx.person("Omar", Sex::Male);
        fx.edge(hassan, omar1);
        let ali = fx.add(Person::new(
            tenant,
            Sex::Male,
            PersonName::new("ar", "Ali")
                .with_patronymic("omar")
                .with_grandfather("Hassan"),
        ));

        let found = proposals(&fx, patronymic_name);
        assert_eq!(found.len(), 2);
        let score_of = |c| found.iter().find(|f| f.0 == c && f.1 == ali).map(|f| f.2);
        assert_eq!(score_of(omar1), Some(40));
        assert_eq!(score_of(omar2), Some(25));
    }

    #[test]
    fn test_patronymic_never_proposes_descendant() {
        let mut fx = Fixture::new();
        let tenant = fx.tenant();
        let ali = fx.add(Person::new(
            tenant,
            Sex::Male,
            PersonName::new("ar", "Ali").with_patronymic("Omar"),
        ));
        let grandson = fx.person("Omar", Sex::Male);
        fx.edge(ali, grandson);

        assert!(proposals(&fx, patronymic_name).is_empty());
    }

    #[test]
    fn test_age_family_needs_a_single_fit() {
        let mut fx = Fixture::new();
        let tenant = fx.tenant();
        let family = |given: &str, sex, year| {
            Person::new(tenant, sex, PersonName::new("en", given).with_family("Haddad"))
                .with_birth(PartialDate::year(year))
        };
        let father = fx.add(family("Elias", Sex::Male, 1900));
        let brother = fx.add(family("Tony", Sex::Male, 1930));
        fx.edge(father, brother);
        let orphan = fx.add(family("Rita", Sex::Female, 1934));
        // Too young to be a father in 1934.
        let karim = fx.add(family("Karim", Sex::Male, 1925));
        let nabil = fx.person("Nabil", Sex::Male);
        fx.edge(nabil, karim);

        let found = proposals(&fx, age_family);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].0, found[0].1), (father, orphan));
        assert_eq!(found[0].2, 70);

        fx.add(family("Jamil", Sex::Male, 1898));
        assert!(proposals(&fx, age_family).is_empty());
    }
}
