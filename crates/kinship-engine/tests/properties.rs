//! Property tests: arbitrary edge proposals never produce an ancestry cycle,
//! and relationship labels mirror when the pair is swapped.

use std::sync::Arc;

use proptest::prelude::*;

use kinship_core::config::ResolverConfig;
use kinship_core::{Actor, ParentType, Person, PersonId, PersonName, Sex, TenantId, UnionKind};
use kinship_engine::{ActiveGraph, KinshipEngine, KinshipResolver};
use kinship_graph::MemoryGraphStore;

const PEOPLE: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Edge(usize, usize, ParentType),
    Union(usize, usize),
}

/// Biological edges only, so every relationship is a blood relationship.
fn blood_edge() -> impl Strategy<Value = Op> {
    (0..PEOPLE, 0..PEOPLE).prop_map(|(p, c)| Op::Edge(p, c, ParentType::Biological))
}

fn op() -> impl Strategy<Value = Op> {
    let edge_type = prop_oneof![
        4 => Just(ParentType::Biological),
        1 => Just(ParentType::Adoptive),
        1 => Just(ParentType::Step),
    ];
    prop_oneof![
        4 => (0..PEOPLE, 0..PEOPLE, edge_type).prop_map(|(p, c, t)| Op::Edge(p, c, t)),
        1 => (0..PEOPLE, 0..PEOPLE).prop_map(|(a, b)| Op::Union(a, b)),
    ]
}

/// Apply `ops` through the engine and return the resulting graph.
fn build(ops: &[Op]) -> Arc<ActiveGraph> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let store = Arc::new(MemoryGraphStore::new());
        let tenant = TenantId::new();
        let mut ids: Vec<PersonId> = Vec::new();
        for i in 0..PEOPLE {
            let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
            let person = Person::new(tenant, sex, PersonName::new("en", &format!("p{i}")));
            ids.push(person.id);
            store.insert_person(person).await;
        }

        let engine = KinshipEngine::new(store);
        let actor = Actor::new("prop");
        for op in ops {
            // Rejections are expected; the invariant is checked afterwards.
            let _ = match *op {
                Op::Edge(p, c, t) => engine
                    .propose_edge(tenant, ids[p], ids[c], t, &actor)
                    .await
                    .map(|_| ()),
                Op::Union(a, b) => engine
                    .propose_union(tenant, &[ids[a], ids[b]], UnionKind::Marriage, &actor)
                    .await
                    .map(|_| ()),
            };
        }
        engine.snapshot(tenant).await.unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_guarded_edges_stay_acyclic(ops in prop::collection::vec(op(), 0..40)) {
        let graph = build(&ops);
        for child in 0..graph.len() {
            for link in &graph.parents[child] {
                prop_assert!(
                    !graph.is_ancestor(child, link.index),
                    "cycle through {} and {}", graph.id_of(child), graph.id_of(link.index)
                );
            }
        }
    }

    #[test]
    fn prop_blood_labels_mirror(ops in prop::collection::vec(blood_edge(), 0..24)) {
        assert_labels_mirror(&build(&ops))?;
    }

    #[test]
    fn prop_step_and_in_law_labels_mirror(ops in prop::collection::vec(op(), 0..32)) {
        assert_labels_mirror(&build(&ops))?;
    }
}

fn assert_labels_mirror(graph: &ActiveGraph) -> Result<(), TestCaseError> {
    let resolver = KinshipResolver::new(ResolverConfig::default());
    for a in 0..graph.len() {
        for b in 0..graph.len() {
            let (ia, ib) = (graph.id_of(a), graph.id_of(b));
            let forward = resolver.classify(graph, ia, ib, None).unwrap();
            let backward = resolver.classify(graph, ib, ia, None).unwrap();
            prop_assert_eq!(
                forward.relationship().map(|r| r.mirror()),
                backward.relationship(),
                "{} -> {}", ia, ib
            );
        }
    }
    Ok(())
}
