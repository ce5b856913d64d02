mod helpers;

use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, Utc};
use cortex::causal::{CausalTraverser, Direction, SectionKind, TraversalOptions};
use cortex::memory::store::{MemoryReader, MemoryStore};
use cortex::memory::types::{CausalRelation, Memory};
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn three_cycle_terminates_with_each_node_once() {
    let store = helpers::test_store();
    let ids = helpers::insert_nodes(&store, 3);
    helpers::chain(&store, &ids, 0.9);
    helpers::link(&store, &ids[2], &ids[0], 0.9);

    let t = CausalTraverser::new(&store);
    for direction in [Direction::Origins, Direction::Effects, Direction::Bidirectional] {
        let chain = t.trace(&ids[0], direction, &TraversalOptions::default()).unwrap();
        let unique: HashSet<&str> = chain.nodes.iter().map(|n| n.memory.id.as_str()).collect();
        assert_eq!(unique.len(), chain.nodes.len());
        assert_eq!(chain.nodes.len(), 2);
        assert!(!chain.contains(&ids[0]));
    }
}

#[test]
fn self_loop_is_harmless() {
    let store = helpers::test_store();
    let ids = helpers::insert_nodes(&store, 1);
    helpers::link(&store, &ids[0], &ids[0], 0.5);

    let chain = CausalTraverser::new(&store)
        .trace_effects(&ids[0], &TraversalOptions::default().with_confidence())
        .unwrap();
    assert!(chain.nodes.is_empty());
    assert_eq!(chain.edges.len(), 1);
    assert_eq!(chain.chain_confidence, Some(1.0));
}

#[test]
fn depth_cap_on_four_hop_chain() {
    let store = helpers::test_store();
    let ids = helpers::insert_nodes(&store, 5);
    helpers::chain(&store, &ids, 0.9);

    let chain = CausalTraverser::new(&store)
        .trace_origins(&ids[4], &TraversalOptions::default().with_max_depth(2))
        .unwrap();
    assert!(chain.max_depth_reached <= 2);
    assert!(chain.nodes.iter().all(|n| n.depth <= 2));
    assert_eq!(chain.direction, Direction::Origins);
}

#[test]
fn strength_filter_excludes_weak_edges() {
    let store = helpers::test_store();
    let ids = helpers::insert_nodes(&store, 3);
    helpers::link(&store, &ids[0], &ids[1], 0.9);
    helpers::link(&store, &ids[1], &ids[2], 0.2);

    let chain = CausalTraverser::new(&store)
        .trace_origins(&ids[2], &TraversalOptions::default().with_min_strength(0.5))
        .unwrap();
    assert!(chain.edges.iter().all(|e| e.strength >= 0.5));
    assert!(!chain.edges.iter().any(|e| e.strength == 0.2));
}

#[test]
fn neighbors_scenario() {
    let store = helpers::test_store();
    let center = helpers::insert_semantic(&store, "center", "center");
    let in1 = helpers::insert_semantic(&store, "in", "in1");
    let in2 = helpers::insert_semantic(&store, "in", "in2");
    let out1 = helpers::insert_semantic(&store, "out", "out1");
    helpers::link(&store, &in1, &center, 0.5);
    helpers::link(&store, &in2, &center, 0.5);
    helpers::link(&store, &center, &out1, 0.5);

    let n = CausalTraverser::new(&store).get_neighbors(&center).unwrap();
    assert_eq!(n.incoming.len(), 2);
    assert_eq!(n.outgoing.len(), 1);
}

#[test]
fn traversal_does_not_write() {
    let store = helpers::test_store();
    let ids = helpers::insert_nodes(&store, 3);
    helpers::chain(&store, &ids, 0.7);
    let before = store.stats().unwrap();

    let t = CausalTraverser::new(&store);
    t.trace_bidirectional(&ids[1], &TraversalOptions::default()).unwrap();
    t.narrative(&ids[1]).unwrap();

    let after = store.stats().unwrap();
    assert_eq!(before.total_memories, after.total_memories);
    assert_eq!(before.causal_edges, after.causal_edges);
    assert_eq!(store.read(&ids[1]).unwrap().unwrap().access_count, 0);
}

#[test]
fn dangling_endpoint_in_file_store() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("cortex.db");
    let store = cortex::memory::store::SqliteStore::open(&db_path).unwrap();
    let ids = helpers::insert_nodes(&store, 2);
    helpers::link(&store, &ids[0], &ids[1], 0.9);

    // Simulate an integrity problem left by an external writer.
    let raw = rusqlite::Connection::open(&db_path).unwrap();
    raw.execute(
        "INSERT INTO causal_edges (id, source_id, target_id, relation, strength, created_at) \
         VALUES ('orphan', 'ghost', ?1, 'caused', 0.6, '2026-01-01T00:00:00.000000Z')",
        [&ids[0]],
    )
    .unwrap();
    drop(raw);

    let t = CausalTraverser::new(&store);
    let chain = t
        .trace_origins(&ids[1], &TraversalOptions::default().with_confidence())
        .unwrap();
    assert_eq!(chain.nodes.len(), 1);
    assert_eq!(chain.missing, vec!["ghost".to_string()]);
    assert_eq!(chain.edges.len(), 2);
    assert!(chain.chain_confidence.is_some());

    let narrative = t.narrative(&ids[0]).unwrap();
    assert_eq!(narrative.key_points.len(), 1);
}

#[test]
fn scoped_view_hides_later_edges() {
    let store = helpers::test_store();
    let now = Utc::now();
    let ids = helpers::insert_nodes(&store, 2);
    helpers::link(&store, &ids[0], &ids[1], 0.9);

    let past = store.as_of(now - Duration::days(1));
    let chain = CausalTraverser::new(&past)
        .trace_effects(&ids[0], &TraversalOptions::default())
        .unwrap();
    assert_eq!(chain.total_memories, 0);

    let present = store.as_of(now + Duration::seconds(1));
    let chain = CausalTraverser::new(&present)
        .trace_effects(&ids[0], &TraversalOptions::default())
        .unwrap();
    assert_eq!(chain.nodes.len(), 1);
}

#[test]
fn expired_endpoint_is_out_of_scope_not_missing() {
    let store = helpers::test_store();
    let now = Utc::now();
    let current = helpers::insert_semantic(&store, "cache", "cache lives in redis");
    let expired = store
        .create(
            &Memory::semantic("cache", "cache lived in memcached")
                .valid_between(now - Duration::days(10), Some(now - Duration::days(5))),
        )
        .unwrap();
    helpers::link(&store, &current, &expired, 0.8);

    let view = store.valid_at(Utc::now());
    assert!(view.read(&current).unwrap().is_some());
    let t = CausalTraverser::new(&view);
    for direction in [Direction::Effects, Direction::Bidirectional] {
        let chain = t.trace(&current, direction, &TraversalOptions::default()).unwrap();
        assert!(chain.nodes.is_empty());
        assert!(chain.edges.is_empty());
        assert!(chain.missing.is_empty());
    }

    let chain = CausalTraverser::new(&store)
        .trace_effects(&current, &TraversalOptions::default())
        .unwrap();
    assert_eq!(chain.nodes.len(), 1);
    assert!(chain.missing.is_empty());
}

#[test]
fn narrative_support_section() {
    let store = helpers::test_store();
    let claim = helpers::insert_semantic(&store, "perf", "the cache halves latency");
    let bench = helpers::insert_semantic(&store, "perf", "benchmarks show 48% lower p99");
    store
        .add_relationship(&bench, &claim, CausalRelation::Supports, 0.9, &["bench/run-12".into()])
        .unwrap();

    let n = CausalTraverser::new(&store).narrative(&claim).unwrap();
    let support = n.section(SectionKind::Support).unwrap();
    assert_eq!(support.entries.len(), 1);
    assert!(support.entries[0].contains("supports"));
    assert_eq!(n.evidence_refs, vec!["bench/run-12"]);
}

fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize, f64)>> {
    proptest::collection::vec((0usize..8, 0usize..8, 0.0f64..=1.0), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn traversal_respects_caps_and_union(
        edges in edges_strategy(),
        root in 0usize..8,
        max_depth in 0usize..5,
        max_nodes in 1usize..8,
        min_strength in 0.0f64..=1.0,
    ) {
        let store = helpers::test_store();
        let ids = helpers::insert_nodes(&store, 8);
        for (s, t, w) in &edges {
            store
                .add_relationship(&ids[*s], &ids[*t], CausalRelation::Caused, *w, &[])
                .unwrap();
        }
        let t = CausalTraverser::new(&store);

        let capped = TraversalOptions::default()
            .with_max_depth(max_depth)
            .with_max_nodes(max_nodes)
            .with_min_strength(min_strength)
            .with_confidence();
        for direction in [Direction::Origins, Direction::Effects, Direction::Bidirectional] {
            let chain = t.trace(&ids[root], direction, &capped).unwrap();
            prop_assert!(chain.max_depth_reached <= max_depth);
            prop_assert!(chain.nodes.len() <= max_nodes);
            prop_assert!(chain.edges.iter().all(|e| e.strength >= min_strength));
            let c = chain.chain_confidence.unwrap();
            prop_assert!(c > 0.0 && c <= 1.0);
        }

        let open = TraversalOptions::default().with_min_strength(min_strength);
        let origins = t.trace_origins(&ids[root], &open).unwrap();
        let effects = t.trace_effects(&ids[root], &open).unwrap();
        let both = t.trace_bidirectional(&ids[root], &open).unwrap();
        let expected: BTreeSet<&str> = origins
            .nodes
            .iter()
            .chain(&effects.nodes)
            .map(|n| n.memory.id.as_str())
            .collect();
        let got: BTreeSet<&str> = both.nodes.iter().map(|n| n.memory.id.as_str()).collect();
        prop_assert_eq!(got, expected);

        let again = t.trace_bidirectional(&ids[root], &open).unwrap();
        prop_assert_eq!(again, both);
    }
}
