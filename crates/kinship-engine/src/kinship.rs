//! Kinship classification between two people.
//!
//! Resolution runs in tiers: direct patterns (parent, spouse, close blood
//! relatives through a common ancestor), then step and in-law relations,
//! then extended blood relations, and finally a bounded breadth-first search
//! over every parent, child and union edge.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use kinship_core::config::ResolverConfig;
use kinship_core::{EdgeKind, GraphError, KinshipPath, ParentType, PathStep, PersonId};

use crate::graph::{ActiveGraph, Link};
use crate::labels::{describe, ParentOverlap, Relationship, SiblingKind};

/// What person B is to person A, with the route that establishes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KinshipLabel {
    pub relationship: Relationship,
    pub text: String,
    /// Translation key, e.g. `kinship.father`.
    pub key: String,
    pub path: KinshipPath,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassifyOutcome {
    Related(KinshipLabel),
    /// The search exhausted A's connected component.
    Unrelated { explored: usize },
    /// Unexplored frontier remained at the depth bound.
    SearchDepthExceeded { max_depth: usize, explored: usize },
}

impl ClassifyOutcome {
    pub fn label(&self) -> Option<&KinshipLabel> {
        match self {
            ClassifyOutcome::Related(label) => Some(label),
            _ => None,
        }
    }

    pub fn relationship(&self) -> Option<Relationship> {
        self.label().map(|l| l.relationship)
    }
}

/// A hop of a route under construction: the person reached and how.
type Hop = (usize, EdgeKind);

pub struct KinshipResolver {
    config: ResolverConfig,
}

impl KinshipResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Requested depth, defaulted and clamped to the configured cap.
    pub fn effective_depth(&self, requested: Option<usize>) -> usize {
        let cap = self.config.max_depth_cap.max(1);
        requested
            .unwrap_or(self.config.default_max_depth)
            .clamp(1, cap)
    }

    /// Classify what `b` is to `a`.
    pub fn classify(
        &self,
        graph: &ActiveGraph,
        a: PersonId,
        b: PersonId,
        max_depth: Option<usize>,
    ) -> Result<ClassifyOutcome, GraphError> {
        let ai = locate(graph, a)?;
        let bi = locate(graph, b)?;
        let depth = self.effective_depth(max_depth);

        let outcome = classify_indexes(graph, ai, bi, depth);
        tracing::debug!(
            tenant = %graph.tenant_id,
            a = %a,
            b = %b,
            depth,
            relationship = ?outcome.relationship(),
            "Classified relationship"
        );
        Ok(outcome)
    }
}

fn locate(graph: &ActiveGraph, person: PersonId) -> Result<usize, GraphError> {
    graph.index_of(&person).ok_or(GraphError::PersonNotFound {
        person,
        tenant: graph.tenant_id,
    })
}

fn classify_indexes(graph: &ActiveGraph, a: usize, b: usize, depth: usize) -> ClassifyOutcome {
    if a == b {
        return related(graph, Relationship::SelfPerson, a, b, Vec::new(), None);
    }

    if let Some(edge_type) = closest_edge(&graph.parents[a], b) {
        let hops = vec![(b, EdgeKind::Parent)];
        return related(graph, Relationship::Parent { edge_type }, a, b, hops, None);
    }
    if let Some(edge_type) = closest_edge(&graph.children[a], b) {
        let hops = vec![(b, EdgeKind::Child)];
        return related(graph, Relationship::Child { edge_type }, a, b, hops, None);
    }
    if graph.share_union(a, b) {
        let hops = vec![(b, EdgeKind::Spouse)];
        return related(graph, Relationship::Spouse, a, b, hops, None);
    }

    let blood = common_ancestor(graph, a, b, depth);
    if let Some(found) = &blood {
        if let Some(rel) = close_blood(graph, a, b, found.up, found.down) {
            return related(graph, rel, a, b, found.hops.clone(), Some(found.ancestor));
        }
    }

    if let Some((rel, hops)) = step_or_in_law(graph, a, b) {
        if hops.len() <= depth {
            return related(graph, rel, a, b, hops, None);
        }
    }

    if let Some(found) = blood {
        let rel = Relationship::from_generations(found.up as u32, found.down as u32);
        return related(graph, rel, a, b, found.hops, Some(found.ancestor));
    }

    fallback(graph, a, b, depth)
}

fn related(
    graph: &ActiveGraph,
    relationship: Relationship,
    a: usize,
    b: usize,
    hops: Vec<Hop>,
    common_ancestor: Option<usize>,
) -> ClassifyOutcome {
    let (text, key) = describe(relationship, graph.sex_of(b));
    let mut path = to_path(graph, a, &hops);
    path.common_ancestor = common_ancestor.map(|i| graph.id_of(i));
    ClassifyOutcome::Related(KinshipLabel {
        relationship,
        text,
        key,
        path,
    })
}

fn to_path(graph: &ActiveGraph, from: usize, hops: &[Hop]) -> KinshipPath {
    KinshipPath::new(
        graph.id_of(from),
        hops.iter()
            .map(|&(index, via)| PathStep {
                person_id: graph.id_of(index),
                via,
            })
            .collect(),
    )
}

/// The most specific edge type linking to `target`, biological first.
fn closest_edge(links: &[Link], target: usize) -> Option<ParentType> {
    links
        .iter()
        .filter(|l| l.index == target)
        .map(|l| l.edge_type)
        .min()
}

// ── Blood relations ───────────────────────────────────────────────

struct CommonAncestor {
    ancestor: usize,
    /// Generations from A up to the ancestor.
    up: usize,
    /// Generations from B up to the ancestor.
    down: usize,
    hops: Vec<Hop>,
}

/// Sibling-defining ancestors of `start` (itself included at depth 0), with
/// the child each was reached from.
fn blood_ancestors(
    graph: &ActiveGraph,
    start: usize,
    max_depth: usize,
) -> HashMap<usize, (usize, Option<usize>)> {
    let mut seen = HashMap::new();
    seen.insert(start, (0, None));
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((node, d)) = queue.pop_front() {
        if d >= max_depth {
            continue;
        }
        for link in graph.parents[node]
            .iter()
            .filter(|l| l.edge_type.defines_siblings())
        {
            if seen.contains_key(&link.index) {
                continue;
            }
            seen.insert(link.index, (d + 1, Some(node)));
            queue.push_back((link.index, d + 1));
        }
    }
    seen
}

/// Chain `[ancestor, ..., start]` following the recorded children.
fn descent(map: &HashMap<usize, (usize, Option<usize>)>, ancestor: usize) -> Vec<usize> {
    let mut chain = vec![ancestor];
    let mut cur = ancestor;
    while let Some(&(_, Some(child))) = map.get(&cur) {
        chain.push(child);
        cur = child;
    }
    chain
}

/// The nearest shared blood ancestor within `depth` total generations.
///
/// Ties on distance prefer the most balanced pair, then the smallest
/// ancestor id, so the choice is the same from either side.
fn common_ancestor(graph: &ActiveGraph, a: usize, b: usize, depth: usize) -> Option<CommonAncestor> {
    let up_a = blood_ancestors(graph, a, depth);
    let up_b = blood_ancestors(graph, b, depth);

    let (ancestor, up, down) = up_a
        .iter()
        .filter_map(|(&anc, &(da, _))| up_b.get(&anc).map(|&(db, _)| (anc, da, db)))
        .filter(|&(_, da, db)| da + db <= depth)
        .min_by_key(|&(anc, da, db)| (da + db, da.abs_diff(db), graph.id_of(anc)))?;

    let mut hops: Vec<Hop> = descent(&up_a, ancestor)
        .into_iter()
        .rev()
        .skip(1)
        .map(|i| (i, EdgeKind::Parent))
        .collect();
    hops.extend(
        descent(&up_b, ancestor)
            .into_iter()
            .skip(1)
            .map(|i| (i, EdgeKind::Child)),
    );

    Some(CommonAncestor {
        ancestor,
        up,
        down,
        hops,
    })
}

/// Relationships resolved by the direct tier.
fn close_blood(graph: &ActiveGraph, a: usize, b: usize, up: usize, down: usize) -> Option<Relationship> {
    match (up, down) {
        (1, 1) => Some(sibling(graph, a, b)),
        (2, 0) => Some(Relationship::Grandparent),
        (0, 2) => Some(Relationship::Grandchild),
        (2, 1) => Some(Relationship::AuntUncle),
        (1, 2) => Some(Relationship::NieceNephew),
        (2, 2) => Some(Relationship::FirstCousin),
        _ => None,
    }
}

fn sibling(graph: &ActiveGraph, a: usize, b: usize) -> Relationship {
    let pa = graph.sibling_parents(a);
    let pb = graph.sibling_parents(b);
    let overlap = if pa == pb {
        ParentOverlap::Equal
    } else if pa.is_subset(&pb) {
        ParentOverlap::Subset
    } else if pa.is_superset(&pb) {
        ParentOverlap::Superset
    } else {
        ParentOverlap::Partial
    };
    let sibling = if overlap == ParentOverlap::Equal {
        SiblingKind::Full
    } else {
        SiblingKind::Half
    };
    Relationship::Sibling { sibling, overlap }
}

// ── Step and in-law relations ─────────────────────────────────────

/// Step and in-law relation of `b` to `a`.
///
/// Reciprocal shapes (each partners the other's parent) match more than one
/// pattern, so the pair is always resolved from the smaller id and mirrored.
fn step_or_in_law(graph: &ActiveGraph, a: usize, b: usize) -> Option<(Relationship, Vec<Hop>)> {
    if graph.id_of(a) <= graph.id_of(b) {
        step_or_in_law_from(graph, a, b)
    } else {
        step_or_in_law_from(graph, b, a).map(|(rel, hops)| (rel.mirror(), reverse_hops(b, &hops)))
    }
}

/// The same route walked from its far end.
fn reverse_hops(start: usize, hops: &[Hop]) -> Vec<Hop> {
    let mut nodes: Vec<usize> = std::iter::once(start)
        .chain(hops.iter().map(|&(node, _)| node))
        .collect();
    nodes.pop();
    nodes
        .into_iter()
        .rev()
        .zip(hops.iter().rev().map(|&(_, via)| via.reverse()))
        .collect()
}

fn step_or_in_law_from(graph: &ActiveGraph, a: usize, b: usize) -> Option<(Relationship, Vec<Hop>)> {
    // B partners one of A's parents without being A's parent.
    if !graph.is_parent_of(b, a) {
        for p in graph.sibling_parents(a) {
            if graph.spouses_of(p).contains(&b) {
                let hops = vec![(p, EdgeKind::Parent), (b, EdgeKind::Spouse)];
                return Some((Relationship::StepParent, hops));
            }
        }
    }

    // A partners one of B's parents without being B's parent.
    if !graph.is_parent_of(a, b) {
        for p in graph.sibling_parents(b) {
            if graph.spouses_of(a).contains(&p) {
                let hops = vec![(p, EdgeKind::Spouse), (b, EdgeKind::Child)];
                return Some((Relationship::StepChild, hops));
            }
        }
    }

    let shares_parent = !graph
        .parent_indexes(a)
        .is_disjoint(&graph.parent_indexes(b));
    if !shares_parent {
        let b_parents = graph.sibling_parents(b);
        for p in graph.sibling_parents(a) {
            for s in graph.spouses_of(p) {
                if b_parents.contains(&s) {
                    let hops = vec![
                        (p, EdgeKind::Parent),
                        (s, EdgeKind::Spouse),
                        (b, EdgeKind::Child),
                    ];
                    return Some((Relationship::StepSibling, hops));
                }
            }
        }
    }

    let spouses = graph.spouses_of(a);
    for &s in &spouses {
        if graph.sibling_parents(s).contains(&b) {
            let hops = vec![(s, EdgeKind::Spouse), (b, EdgeKind::Parent)];
            return Some((Relationship::ParentInLaw, hops));
        }
    }

    for c in graph.sibling_children(a) {
        if graph.spouses_of(c).contains(&b) {
            let hops = vec![(c, EdgeKind::Child), (b, EdgeKind::Spouse)];
            return Some((Relationship::ChildInLaw, hops));
        }
    }

    // B is a sibling of A's partner.
    for &s in &spouses {
        if let Some(p) = shared_sibling_parent(graph, s, b) {
            let hops = vec![
                (s, EdgeKind::Spouse),
                (p, EdgeKind::Parent),
                (b, EdgeKind::Child),
            ];
            return Some((Relationship::SiblingInLaw, hops));
        }
    }

    // B partners one of A's siblings.
    for s in graph.siblings_of(a) {
        if graph.spouses_of(s).contains(&b) {
            if let Some(p) = shared_sibling_parent(graph, a, s) {
                let hops = vec![
                    (p, EdgeKind::Parent),
                    (s, EdgeKind::Child),
                    (b, EdgeKind::Spouse),
                ];
                return Some((Relationship::SiblingInLaw, hops));
            }
        }
    }

    None
}

fn shared_sibling_parent(graph: &ActiveGraph, x: usize, y: usize) -> Option<usize> {
    if x == y {
        return None;
    }
    let py = graph.sibling_parents(y);
    graph
        .sibling_parents(x)
        .into_iter()
        .find(|p| py.contains(p))
}

// ── Breadth-first fallback ────────────────────────────────────────

enum Search {
    Found(Vec<Hop>),
    Exhausted { explored: usize },
    Bounded { explored: usize },
}

fn neighbours(graph: &ActiveGraph, node: usize) -> impl Iterator<Item = Hop> + '_ {
    let up = graph.parents[node].iter().map(|l| (l.index, EdgeKind::Parent));
    let down = graph.children[node].iter().map(|l| (l.index, EdgeKind::Child));
    let partners = graph
        .spouses_of(node)
        .into_iter()
        .map(|i| (i, EdgeKind::Spouse));
    up.chain(down).chain(partners)
}

fn search(graph: &ActiveGraph, start: usize, target: usize, depth: usize) -> Search {
    let mut visited = HashSet::from([start]);
    let mut predecessor: HashMap<usize, Hop> = HashMap::new();
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut bounded = false;

    while let Some((node, d)) = queue.pop_front() {
        if d >= depth {
            if neighbours(graph, node).any(|(n, _)| !visited.contains(&n)) {
                bounded = true;
            }
            continue;
        }
        for (next, via) in neighbours(graph, node) {
            if !visited.insert(next) {
                continue;
            }
            predecessor.insert(next, (node, via));
            if next == target {
                let mut hops = Vec::new();
                let mut cur = target;
                while let Some(&(prev, via)) = predecessor.get(&cur) {
                    hops.push((cur, via));
                    cur = prev;
                }
                hops.reverse();
                return Search::Found(hops);
            }
            queue.push_back((next, d + 1));
        }
    }

    let explored = visited.len();
    if bounded {
        Search::Bounded { explored }
    } else {
        Search::Exhausted { explored }
    }
}

fn fallback(graph: &ActiveGraph, a: usize, b: usize, depth: usize) -> ClassifyOutcome {
    let hops = match search(graph, a, b, depth) {
        Search::Found(hops) => hops,
        Search::Exhausted { explored } => return ClassifyOutcome::Unrelated { explored },
        Search::Bounded { explored } => {
            return ClassifyOutcome::SearchDepthExceeded {
                max_depth: depth,
                explored,
            }
        }
    };

    // Describe the route walked from the smaller id so both directions
    // see the same path.
    let path = if graph.id_of(a) <= graph.id_of(b) {
        to_path(graph, a, &hops)
    } else {
        match search(graph, b, a, depth) {
            Search::Found(back) => to_path(graph, b, &back).reversed(),
            _ => to_path(graph, a, &hops),
        }
    };

    let (relationship, turning_point) = describe_route(&path);
    let (text, key) = describe(relationship, graph.sex_of(b));
    let mut path = path;
    path.common_ancestor = turning_point;
    ClassifyOutcome::Related(KinshipLabel {
        relationship,
        text,
        key,
        path,
    })
}

/// Name a mixed route, falling back to a plain step count.
fn describe_route(path: &KinshipPath) -> (Relationship, Option<PersonId>) {
    let steps = path.steps.len();
    let ups = path
        .steps
        .iter()
        .take_while(|s| s.via == EdgeKind::Parent)
        .count();
    let downs = path.steps[ups..]
        .iter()
        .take_while(|s| s.via == EdgeKind::Child)
        .count();

    if ups + downs == steps {
        let rel = Relationship::from_generations(ups as u32, downs as u32);
        let extended = matches!(
            rel,
            Relationship::Ancestor { .. }
                | Relationship::Descendant { .. }
                | Relationship::Cousin { .. }
                | Relationship::Collateral { .. }
        );
        if extended {
            let turning = (ups > 0 && downs > 0).then(|| path.steps[ups - 1].person_id);
            return (rel, turning);
        }
    }
    (
        Relationship::Related {
            steps: steps as u32,
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::Fixture;
    use kinship_core::Sex;

    fn resolver() -> KinshipResolver {
        KinshipResolver::new(ResolverConfig::default())
    }

    fn rel(fx: &Fixture, a: PersonId, b: PersonId) -> Option<Relationship> {
        resolver()
            .classify(&fx.graph(), a, b, None)
            .unwrap()
            .relationship()
    }

    fn text(fx: &Fixture, a: PersonId, b: PersonId) -> String {
        resolver()
            .classify(&fx.graph(), a, b, None)
            .unwrap()
            .label()
            .map(|l| l.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_parent_and_child_labels() {
        let mut fx = Fixture::new();
        let father = fx.person("omar", Sex::Male);
        let child = fx.person("ali", Sex::Male);
        fx.edge(father, child);

        assert_eq!(text(&fx, child, father), "Father");
        assert_eq!(text(&fx, father, child), "Son");
        let outcome = resolver().classify(&fx.graph(), child, father, None).unwrap();
        let label = outcome.label().unwrap();
        assert_eq!(label.key, "kinship.father");
        assert_eq!(label.path.person_ids(), vec![child, father]);
    }

    #[test]
    fn test_step_edge_labels_reflect_type() {
        let mut fx = Fixture::new();
        let mother = fx.person("huda", Sex::Female);
        let child = fx.person("sara", Sex::Unknown);
        fx.typed_edge(mother, child, ParentType::Foster);

        assert_eq!(text(&fx, child, mother), "Foster Mother");
        assert_eq!(text(&fx, mother, child), "Foster Child");
    }

    #[test]
    fn test_full_and_half_siblings() {
        let mut fx = Fixture::new();
        let p1 = fx.person("p1", Sex::Male);
        let p2 = fx.person("p2", Sex::Female);
        let a = fx.person("a", Sex::Male);
        let b = fx.person("b", Sex::Female);
        let c = fx.person("c", Sex::Male);
        fx.edge(p1, a);
        fx.edge(p1, b);
        fx.edge(p2, b);
        fx.edge(p1, c);
        fx.edge(p2, c);

        assert_eq!(
            rel(&fx, b, c),
            Some(Relationship::Sibling {
                sibling: SiblingKind::Full,
                overlap: ParentOverlap::Equal
            })
        );
        assert_eq!(
            rel(&fx, a, b),
            Some(Relationship::Sibling {
                sibling: SiblingKind::Half,
                overlap: ParentOverlap::Subset
            })
        );
        assert_eq!(text(&fx, a, b), "Half-sister");
        assert_eq!(text(&fx, b, a), "Half-brother");
    }

    #[test]
    fn test_extended_family() {
        let mut fx = Fixture::new();
        let ggp = fx.person("ggp", Sex::Male);
        let gp = fx.person("gp", Sex::Male);
        let gu = fx.person("great_uncle", Sex::Male);
        let p = fx.person("p", Sex::Male);
        let aunt = fx.person("aunt", Sex::Female);
        let me = fx.person("me", Sex::Male);
        let cousin = fx.person("cousin", Sex::Female);
        let second = fx.person("second", Sex::Male);
        let gu_child = fx.person("gu_child", Sex::Female);
        fx.edge(ggp, gp);
        fx.edge(ggp, gu);
        fx.edge(gp, p);
        fx.edge(gp, aunt);
        fx.edge(p, me);
        fx.edge(aunt, cousin);
        fx.edge(gu, gu_child);
        fx.edge(gu_child, second);

        assert_eq!(rel(&fx, me, gp), Some(Relationship::Grandparent));
        assert_eq!(text(&fx, me, ggp), "Great-grandfather");
        assert_eq!(text(&fx, me, aunt), "Aunt");
        assert_eq!(text(&fx, aunt, me), "Nephew");
        assert_eq!(rel(&fx, me, cousin), Some(Relationship::FirstCousin));
        assert_eq!(text(&fx, me, gu), "Great-uncle");
        assert_eq!(
            rel(&fx, me, second),
            Some(Relationship::Cousin { degree: 2, removed: 0 })
        );
        assert_eq!(text(&fx, me, gu_child), "First cousin once removed");

        let outcome = resolver().classify(&fx.graph(), me, cousin, None).unwrap();
        let path = &outcome.label().unwrap().path;
        assert_eq!(path.person_ids(), vec![me, p, gp, aunt, cousin]);
        assert_eq!(path.common_ancestor, Some(gp));
    }

    #[test]
    fn test_step_and_in_law_tier() {
        let mut fx = Fixture::new();
        let dad = fx.person("dad", Sex::Male);
        let mum = fx.person("mum", Sex::Female);
        let stepmum = fx.person("stepmum", Sex::Female);
        let me = fx.person("me", Sex::Male);
        let stepsis = fx.person("stepsis", Sex::Female);
        let wife = fx.person("wife", Sex::Female);
        let wife_dad = fx.person("wife_dad", Sex::Male);
        let wife_bro = fx.person("wife_bro", Sex::Male);
        fx.edge(dad, me);
        fx.edge(mum, me);
        fx.union(dad, stepmum);
        fx.edge(stepmum, stepsis);
        fx.union(me, wife);
        fx.edge(wife_dad, wife);
        fx.edge(wife_dad, wife_bro);

        assert_eq!(text(&fx, me, stepmum), "Stepmother");
        assert_eq!(rel(&fx, stepmum, me), Some(Relationship::StepChild));
        assert_eq!(text(&fx, me, stepsis), "Stepsister");
        assert_eq!(text(&fx, me, wife), "Wife");
        assert_eq!(text(&fx, me, wife_dad), "Father-in-law");
        assert_eq!(text(&fx, wife_dad, me), "Son-in-law");
        assert_eq!(text(&fx, me, wife_bro), "Brother-in-law");
        assert_eq!(rel(&fx, wife_bro, me), Some(Relationship::SiblingInLaw));
    }

    #[test]
    fn test_reciprocal_step_parents_mirror() {
        // Each of x and y is married to the other's father.
        let mut fx = Fixture::new();
        let x = fx.person("x", Sex::Female);
        let x_dad = fx.person("x_dad", Sex::Male);
        let y = fx.person("y", Sex::Female);
        let y_dad = fx.person("y_dad", Sex::Male);
        fx.edge(x_dad, x);
        fx.edge(y_dad, y);
        fx.union(y, x_dad);
        fx.union(x, y_dad);

        let forward = rel(&fx, x, y).unwrap();
        let backward = rel(&fx, y, x).unwrap();
        assert_eq!(forward.mirror(), backward);
        assert!(matches!(
            forward,
            Relationship::StepParent | Relationship::StepChild
        ));

        let outcome = resolver().classify(&fx.graph(), x, y, None).unwrap();
        let path = &outcome.label().unwrap().path;
        assert_eq!(path.person_ids().first(), Some(&x));
        assert_eq!(path.person_ids().last(), Some(&y));
        assert_eq!(path.person_ids().len(), 3);
    }

    #[test]
    fn test_shared_parent_blocks_step_sibling() {
        let mut fx = Fixture::new();
        let dad = fx.person("dad", Sex::Male);
        let other = fx.person("other", Sex::Female);
        let a = fx.person("a", Sex::Male);
        let b = fx.person("b", Sex::Female);
        fx.union(dad, other);
        fx.edge(dad, a);
        fx.edge(dad, b);
        fx.edge(other, b);

        assert!(matches!(rel(&fx, a, b), Some(Relationship::Sibling { .. })));
    }

    #[test]
    fn test_unrelated_and_depth_bound() {
        let mut fx = Fixture::new();
        let people: Vec<PersonId> = (0..8).map(|i| fx.person(&format!("p{i}"), Sex::Male)).collect();
        for pair in people.windows(2) {
            fx.union(pair[0], pair[1]);
        }
        let stranger = fx.person("stranger", Sex::Female);
        let g = fx.graph();
        let r = resolver();

        assert!(matches!(
            r.classify(&g, people[0], stranger, None).unwrap(),
            ClassifyOutcome::Unrelated { explored: 8 }
        ));
        assert!(matches!(
            r.classify(&g, people[0], people[7], Some(3)).unwrap(),
            ClassifyOutcome::SearchDepthExceeded { max_depth: 3, .. }
        ));
        assert_eq!(
            r.classify(&g, people[0], people[7], None).unwrap().relationship(),
            Some(Relationship::Related { steps: 7 })
        );
    }

    #[test]
    fn test_direct_pattern_respects_depth() {
        let mut fx = Fixture::new();
        let gp = fx.person("gp", Sex::Male);
        let p = fx.person("p", Sex::Male);
        let c = fx.person("c", Sex::Male);
        fx.edge(gp, p);
        fx.edge(p, c);

        let g = fx.graph();
        assert!(matches!(
            resolver().classify(&g, c, gp, Some(1)).unwrap(),
            ClassifyOutcome::SearchDepthExceeded { max_depth: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_person() {
        let mut fx = Fixture::new();
        let a = fx.person("a", Sex::Male);
        let err = resolver()
            .classify(&fx.graph(), a, PersonId::new(), None)
            .unwrap_err();
        assert_eq!(err.code(), "person_not_found");
    }

    #[test]
    fn test_every_pair_is_mirrored() {
        let mut fx = Fixture::new();
        let gp = fx.person("gp", Sex::Male);
        let gm = fx.person("gm", Sex::Female);
        let dad = fx.person("dad", Sex::Male);
        let uncle = fx.person("uncle", Sex::Male);
        let mum = fx.person("mum", Sex::Female);
        let step = fx.person("step", Sex::Female);
        let me = fx.person("me", Sex::Unknown);
        let sis = fx.person("sis", Sex::Female);
        let half = fx.person("half", Sex::Male);
        let cousin = fx.person("cousin", Sex::Male);
        let cousin_kid = fx.person("cousin_kid", Sex::Female);
        let in_law = fx.person("in_law", Sex::Male);
        fx.union(gp, gm);
        fx.edge(gp, dad);
        fx.edge(gm, dad);
        fx.edge(gp, uncle);
        fx.union(dad, mum);
        fx.union(dad, step);
        fx.edge(dad, me);
        fx.edge(mum, me);
        fx.edge(dad, sis);
        fx.edge(mum, sis);
        fx.edge(step, half);
        fx.typed_edge(dad, half, ParentType::Adoptive);
        fx.edge(uncle, cousin);
        fx.edge(cousin, cousin_kid);
        fx.union(sis, in_law);

        let g = fx.graph();
        let r = resolver();
        let everyone = [gp, gm, dad, uncle, mum, step, me, sis, half, cousin, cousin_kid, in_law];
        for &a in &everyone {
            for &b in &everyone {
                let ab = r.classify(&g, a, b, None).unwrap().relationship();
                let ba = r.classify(&g, b, a, None).unwrap().relationship();
                assert_eq!(ab.map(Relationship::mirror), ba, "{a} vs {b}");
            }
        }
    }
}
