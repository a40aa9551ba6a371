//! In-memory view of a tenant's active kinship graph.
//!
//! Converts a [`TenantSnapshot`] into dense adjacency lists for cheap
//! traversal. This is the only place soft-deleted records are filtered out:
//! every algorithm downstream sees active people, edges and unions only.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use kinship_core::{
    EdgeId, ParentType, Person, PersonId, Sex, TenantId, Union, UnionId,
};
use kinship_graph::TenantSnapshot;

/// One parent-child edge as seen from either end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Dense index of the person at the other end.
    pub index: usize,
    pub edge_id: EdgeId,
    pub edge_type: ParentType,
}

/// The active graph of one tenant at one version.
pub struct ActiveGraph {
    pub tenant_id: TenantId,
    pub version: u64,
    /// Active persons, indexed by dense index.
    pub persons: Vec<Person>,
    /// Map from person ID → dense index.
    pub person_index: HashMap<PersonId, usize>,
    /// `parents[i]` = edges from person `i` up to its parents.
    pub parents: Vec<Vec<Link>>,
    /// `children[i]` = edges from person `i` down to its children.
    pub children: Vec<Vec<Link>>,
    /// Active unions with at least two active members.
    pub unions: Vec<Union>,
    /// `person_unions[i]` = indexes into `unions`.
    pub person_unions: Vec<Vec<usize>>,
    edge_triples: HashMap<(usize, usize, ParentType), EdgeId>,
    links: HashSet<(PersonId, PersonId)>,
}

impl ActiveGraph {
    pub fn from_snapshot(snapshot: &TenantSnapshot) -> Self {
        let persons: Vec<Person> = snapshot
            .persons
            .iter()
            .filter(|p| p.is_active() && p.tenant_id == snapshot.tenant_id)
            .cloned()
            .collect();

        let person_index: HashMap<PersonId, usize> =
            persons.iter().enumerate().map(|(i, p)| (p.id, i)).collect();

        let mut parents = vec![Vec::new(); persons.len()];
        let mut children = vec![Vec::new(); persons.len()];
        let mut edge_triples = HashMap::new();

        for edge in snapshot.edges.iter().filter(|e| e.is_active()) {
            let (Some(&p), Some(&c)) = (
                person_index.get(&edge.parent_id),
                person_index.get(&edge.child_id),
            ) else {
                continue;
            };
            if edge_triples.insert((p, c, edge.edge_type), edge.id).is_some() {
                continue;
            }
            parents[c].push(Link {
                index: p,
                edge_id: edge.id,
                edge_type: edge.edge_type,
            });
            children[p].push(Link {
                index: c,
                edge_id: edge.id,
                edge_type: edge.edge_type,
            });
        }

        let mut unions = Vec::new();
        let mut person_unions = vec![Vec::new(); persons.len()];
        for union in snapshot.unions.iter().filter(|u| u.is_active()) {
            let mut active = union.clone();
            active
                .members
                .retain(|m| person_index.contains_key(&m.person_id));
            if active.members.len() < 2 {
                continue;
            }
            let slot = unions.len();
            for member in &active.members {
                if let Some(&i) = person_index.get(&member.person_id) {
                    if !person_unions[i].contains(&slot) {
                        person_unions[i].push(slot);
                    }
                }
            }
            unions.push(active);
        }

        let links = snapshot
            .links
            .iter()
            .filter(|l| l.is_active())
            .map(|l| ordered_pair(l.source_person, l.target_person))
            .collect();

        tracing::debug!(
            tenant = %snapshot.tenant_id,
            version = snapshot.version,
            persons = persons.len(),
            edges = edge_triples.len(),
            unions = unions.len(),
            "Built active graph"
        );

        Self {
            tenant_id: snapshot.tenant_id,
            version: snapshot.version,
            persons,
            person_index,
            parents,
            children,
            unions,
            person_unions,
            edge_triples,
            links,
        }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_triples.len()
    }

    pub fn index_of(&self, id: &PersonId) -> Option<usize> {
        self.person_index.get(id).copied()
    }

    pub fn person(&self, index: usize) -> &Person {
        &self.persons[index]
    }

    pub fn id_of(&self, index: usize) -> PersonId {
        self.persons[index].id
    }

    pub fn sex_of(&self, index: usize) -> Sex {
        self.persons[index].sex
    }

    /// The active edge with exactly this (parent, child, type) triple.
    pub fn find_edge(&self, parent: usize, child: usize, edge_type: ParentType) -> Option<EdgeId> {
        self.edge_triples.get(&(parent, child, edge_type)).copied()
    }

    pub fn is_parent_of(&self, parent: usize, child: usize) -> bool {
        self.parents[child].iter().any(|l| l.index == parent)
    }

    /// Distinct parent indexes of `index`, any edge type.
    pub fn parent_indexes(&self, index: usize) -> BTreeSet<usize> {
        self.parents[index].iter().map(|l| l.index).collect()
    }

    /// Parents that define sibling sets (biological and adoptive).
    pub fn sibling_parents(&self, index: usize) -> BTreeSet<usize> {
        self.parents[index]
            .iter()
            .filter(|l| l.edge_type.defines_siblings())
            .map(|l| l.index)
            .collect()
    }

    /// Children reached through sibling-defining edges.
    pub fn sibling_children(&self, index: usize) -> BTreeSet<usize> {
        self.children[index]
            .iter()
            .filter(|l| l.edge_type.defines_siblings())
            .map(|l| l.index)
            .collect()
    }

    pub fn child_indexes(&self, index: usize) -> BTreeSet<usize> {
        self.children[index].iter().map(|l| l.index).collect()
    }

    /// People sharing at least one sibling-defining parent with `index`.
    pub fn siblings_of(&self, index: usize) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for parent in self.sibling_parents(index) {
            out.extend(self.sibling_children(parent));
        }
        out.remove(&index);
        out
    }

    /// The male parent, preferring a biological edge.
    pub fn father_of(&self, index: usize) -> Option<usize> {
        self.parent_of_sex(index, Sex::Male)
    }

    /// The parent of the given sex, preferring a biological edge.
    pub fn parent_of_sex(&self, index: usize, sex: Sex) -> Option<usize> {
        let mut candidates: Vec<&Link> = self.parents[index]
            .iter()
            .filter(|l| self.persons[l.index].sex == sex)
            .collect();
        candidates.sort_by_key(|l| l.edge_type);
        candidates.first().map(|l| l.index)
    }

    pub fn has_parent_of_sex(&self, index: usize, sex: Sex) -> bool {
        self.parents[index]
            .iter()
            .any(|l| self.persons[l.index].sex == sex)
    }

    pub fn unions_of(&self, index: usize) -> impl Iterator<Item = &Union> + '_ {
        self.person_unions[index].iter().map(|&u| &self.unions[u])
    }

    /// Distinct union partners of `index`.
    pub fn spouses_of(&self, index: usize) -> BTreeSet<usize> {
        let id = self.id_of(index);
        self.unions_of(index)
            .flat_map(|u| u.partners_of(&id).collect::<Vec<_>>())
            .filter_map(|p| self.index_of(&p))
            .collect()
    }

    pub fn share_union(&self, a: usize, b: usize) -> bool {
        self.person_unions[a]
            .iter()
            .any(|u| self.person_unions[b].contains(u))
    }

    /// An active union containing every listed member.
    pub fn union_containing(&self, members: &[PersonId]) -> Option<UnionId> {
        self.unions
            .iter()
            .find(|u| members.iter().all(|m| u.contains(m)))
            .map(|u| u.id)
    }

    /// Walk upward from `start` breadth-first looking for `target`.
    ///
    /// Returns the chain `start, parent, ..., target` when `target` is
    /// `start` itself or one of its ancestors.
    pub fn ancestry_path(&self, start: usize, target: usize) -> Option<Vec<usize>> {
        if start == target {
            return Some(vec![start]);
        }

        let mut visited = HashSet::new();
        let mut predecessor: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for link in &self.parents[node] {
                if !visited.insert(link.index) {
                    continue;
                }
                predecessor.insert(link.index, node);
                if link.index == target {
                    let mut path = vec![target];
                    let mut cur = target;
                    while let Some(&prev) = predecessor.get(&cur) {
                        path.push(prev);
                        cur = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(link.index);
            }
        }
        None
    }

    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        ancestor != descendant && self.ancestry_path(descendant, ancestor).is_some()
    }

    /// Ancestors of `index` keyed by generation distance (nearest first).
    pub fn ancestors_with_depth(&self, index: usize, max_depth: usize) -> HashMap<usize, usize> {
        let mut depth = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((index, 0usize));
        while let Some((node, d)) = queue.pop_front() {
            if d >= max_depth {
                continue;
            }
            for link in &self.parents[node] {
                if depth.contains_key(&link.index) || link.index == index {
                    continue;
                }
                depth.insert(link.index, d + 1);
                queue.push_back((link.index, d + 1));
            }
        }
        depth
    }

    /// Whether a reviewer already linked these two records.
    pub fn is_linked(&self, a: PersonId, b: PersonId) -> bool {
        self.links.contains(&ordered_pair(a, b))
    }
}

pub(crate) fn ordered_pair(a: PersonId, b: PersonId) -> (PersonId, PersonId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::Fixture;
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_soft_deleted_records_are_invisible() {
        let mut fx = Fixture::new();
        let a = fx.person("a", Sex::Male);
        let b = fx.person("b", Sex::Male);
        let c = fx.person("c", Sex::Female);
        fx.edge(a, b);
        fx.edge(a, c);
        fx.snapshot.persons[2].deleted_at = Some(Utc::now());
        fx.snapshot.edges[0].deleted_at = Some(Utc::now());

        let g = fx.graph();
        assert_eq!(g.len(), 2);
        assert_eq!(g.edge_count(), 0);
        assert!(g.index_of(&c).is_none());
    }

    #[test]
    fn test_ancestry_path_walks_upward() {
        let mut fx = Fixture::new();
        let gp = fx.person("gp", Sex::Male);
        let p = fx.person("p", Sex::Male);
        let c = fx.person("c", Sex::Male);
        fx.edge(gp, p);
        fx.edge(p, c);

        let g = fx.graph();
        let (gi, pi, ci) = (g.index_of(&gp).unwrap(), g.index_of(&p).unwrap(), g.index_of(&c).unwrap());
        assert_eq!(g.ancestry_path(ci, gi), Some(vec![ci, pi, gi]));
        assert!(g.ancestry_path(gi, ci).is_none());
        assert!(g.is_ancestor(gi, ci));
        assert!(!g.is_ancestor(ci, gi));
    }

    #[test]
    fn test_father_prefers_biological_edge() {
        let mut fx = Fixture::new();
        let step = fx.person("step", Sex::Male);
        let bio = fx.person("bio", Sex::Male);
        let child = fx.person("child", Sex::Female);
        fx.typed_edge(step, child, ParentType::Step);
        fx.edge(bio, child);

        let g = fx.graph();
        let ci = g.index_of(&child).unwrap();
        assert_eq!(g.father_of(ci), g.index_of(&bio));
        assert_eq!(g.sibling_parents(ci).len(), 1);
    }

    #[test]
    fn test_union_with_one_active_member_is_dropped() {
        let mut fx = Fixture::new();
        let a = fx.person("a", Sex::Male);
        let b = fx.person("b", Sex::Female);
        fx.union(a, b);
        fx.snapshot.persons[1].deleted_at = Some(Utc::now());

        let g = fx.graph();
        assert!(g.unions.is_empty());
        assert!(g.spouses_of(g.index_of(&a).unwrap()).is_empty());
    }
}
