mod helpers;

use chrono::{Duration, Utc};
use cortex::config::CortexConfig;
use cortex::memory::store::MemoryStore;
use cortex::memory::types::{Importance, Memory, Severity};
use cortex::retrieval::{
    rank, BudgetManager, DetailLevel, Intent, RelevanceScorer, RetrievalContext, ScoredMemory,
};
use proptest::prelude::*;

fn sample(now: chrono::DateTime<Utc>) -> Memory {
    Memory::semantic("release process", "tag the release after the changelog is merged")
        .recorded_at(now)
        .with_confidence(0.6)
        .with_access_count(10)
}

#[test]
fn scorer_orderings() {
    let now = Utc::now();
    let scorer = RelevanceScorer::new().at(now);
    let ctx = RetrievalContext::new("release process");

    let score = |m: &Memory| scorer.score(m, &ctx);
    assert!(score(&sample(now).with_confidence(0.9)) > score(&sample(now).with_confidence(0.3)));
    assert!(
        score(&sample(now).with_importance(Importance::Critical))
            > score(&sample(now).with_importance(Importance::Normal))
    );
    assert!(score(&sample(now)) > score(&sample(now).recorded_at(now - Duration::days(90))));
    assert!(score(&sample(now).with_access_count(100)) > score(&sample(now).with_access_count(1)));

    let unrelated = Memory::semantic("onboarding", "tag the release after the changelog is merged")
        .recorded_at(now)
        .with_confidence(0.6)
        .with_access_count(10);
    assert!(score(&sample(now)) > score(&unrelated));
}

#[test]
fn degenerate_inputs_stay_in_range() {
    let now = Utc::now();
    let scorer = RelevanceScorer::new().at(now);
    let ancient = Memory::semantic("", "")
        .with_summary("")
        .recorded_at(now - Duration::days(365 * 40))
        .with_access_count(0)
        .with_confidence(0.0);
    for ctx in [RetrievalContext::new(""), RetrievalContext::new("   ")] {
        let s = scorer.score(&ancient, &ctx);
        assert!((0.0..=1.0).contains(&s));
    }
}

#[test]
fn ranked_budget_keeps_scores() {
    let now = Utc::now();
    let scorer = RelevanceScorer::new().at(now);
    let ctx = RetrievalContext::new("release");
    let memories = vec![
        sample(now),
        sample(now).with_importance(Importance::Critical),
        Memory::tribal("release", "never release on a holiday", Severity::Critical),
    ];
    let ranked = rank(&scorer, memories, &ctx);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

    let bm = BudgetManager::default();
    let selection = bm.fit_to_budget(&ranked, 10_000);
    assert_eq!(selection.len(), 3);
    for (sel, item) in selection.iter().zip(&ranked) {
        assert_eq!(sel.relevance_score, item.score);
        assert_eq!(sel.memory_id, item.memory.id);
    }
    assert!(selection.iter().filter(|s| s.level != DetailLevel::Summary).count() >= 2);
}

#[test]
fn retrieval_engine_from_config() {
    let store = helpers::test_store();
    for i in 0..20 {
        store
            .create(&Memory::semantic(
                format!("module {i}"),
                format!("module {i} owns the {i}th shard of the index"),
            ))
            .unwrap();
    }
    let hot = store
        .create(
            &Memory::tribal("index sharding", "resharding requires a full rebuild", Severity::Warning)
                .with_importance(Importance::Critical),
        )
        .unwrap();

    let config = CortexConfig::default();
    let engine = config.retrieval_engine();
    let ctx = RetrievalContext::new("index sharding")
        .with_intent(Intent::FixBug)
        .with_max_tokens(120);
    let result = engine.retrieve(&store, &ctx).unwrap();

    assert_eq!(result.candidates, 21);
    assert_eq!(result.memories[0].selection.memory_id, hot);
    assert!(result.tokens_used <= 120);
    assert!(result.memories.len() < 21);
    assert_eq!(
        result.tokens_used,
        result.memories.iter().map(|m| m.selection.tokens).sum::<usize>()
    );
}

proptest! {
    #[test]
    fn budget_conservation(
        sizes in proptest::collection::vec(0usize..400, 0..15),
        budget in 0usize..2_000,
    ) {
        let ranked: Vec<ScoredMemory> = sizes
            .iter()
            .enumerate()
            .map(|(i, n)| ScoredMemory {
                memory: Memory::semantic("t", "k".repeat(*n)).with_summary("s".repeat(*n / 4)),
                score: 1.0 / (i as f64 + 1.0),
            })
            .collect();
        let bm = BudgetManager::default();
        let selection = bm.fit_to_budget(&ranked, budget);
        prop_assert!(selection.iter().map(|s| s.tokens).sum::<usize>() <= budget);
        if budget == 0 {
            prop_assert!(selection.is_empty());
        }
        for (sel, item) in selection.iter().zip(&ranked) {
            prop_assert_eq!(sel.relevance_score, item.score);
        }
    }
}
