mod helpers;

use chrono::{Duration, Utc};
use cortex::config::CortexConfig;
use cortex::memory::store::{MemoryReader, MemoryStore};
use cortex::memory::types::{EpisodicContext, Interaction, Memory, Severity};
use cortex::validation::{ContradictionDetector, IssueKind, Validator};

#[test]
fn detect_never_fails_on_degenerate_input() {
    let detector = ContradictionDetector::new();
    let store = helpers::test_store();
    let m = Memory::semantic("logging", "always log to stderr");

    // Empty store.
    assert!(detector.detect(&store, &m).unwrap().is_empty());

    // Only memory in the store.
    store.create(&m).unwrap();
    assert!(detector.detect(&store, &m).unwrap().is_empty());

    // No topic at all.
    let episode = Memory::episodic(
        "session-1",
        EpisodicContext::default(),
        Interaction {
            user_query: "where do logs go".into(),
            agent_response: "stderr".into(),
            outcome: None,
        },
    );
    store.create(&episode).unwrap();
    assert!(detector.detect(&store, &episode).unwrap().is_empty());

    // Same topic, different knowledge.
    let other = Memory::semantic("logging", "rotate files weekly");
    store.create(&other).unwrap();
    let issues = detector.detect(&store, &other).unwrap();
    assert!(issues.iter().all(|i| i.kind == IssueKind::Contradiction));
}

#[test]
fn conflicting_claims_are_flagged_not_resolved() {
    let store = helpers::test_store();
    let old = store
        .create(&Memory::tribal("Error Handling", "always use anyhow in libraries", Severity::Warning))
        .unwrap();
    let new = Memory::semantic("error handling", "never use anyhow in libraries").with_confidence(0.9);
    store.create(&new).unwrap();

    let issues = ContradictionDetector::new().detect(&store, &new).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].memory_id, new.id);
    assert_eq!(issues[0].conflicting_memory_id.as_deref(), Some(old.as_str()));
    assert!(issues[0].similarity.unwrap() >= 0.3);

    assert!(store.read(&old).unwrap().is_some());
    assert_eq!(store.read(&new.id).unwrap().unwrap().confidence, 0.9);
}

#[test]
fn different_topics_are_never_compared() {
    let store = helpers::test_store();
    let a = Memory::semantic("frontend", "always bundle with esbuild");
    let b = Memory::semantic("backend", "never bundle with esbuild");
    store.create(&a).unwrap();
    store.create(&b).unwrap();
    assert!(ContradictionDetector::new().detect(&store, &a).unwrap().is_empty());
}

#[test]
fn scan_with_configured_validators() {
    let store = helpers::test_store();
    let now = Utc::now();
    store
        .create(
            &Memory::semantic("feature flags", "dark mode flag is enabled")
                .valid_between(now - Duration::days(5), Some(now + Duration::days(2))),
        )
        .unwrap();
    store
        .create(&Memory::semantic("feature flags", "dark mode flag is disabled"))
        .unwrap();
    store
        .create(
            &Memory::semantic("ownership", "payments team owns billing")
                .valid_between(now - Duration::days(90), Some(now - Duration::days(30))),
        )
        .unwrap();

    let config = CortexConfig::default();
    let report = Validator::new(&store)
        .with_contradiction_detector(config.contradiction_detector())
        .with_temporal_validator(config.temporal_validator())
        .at(now)
        .scan()
        .unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.count(IssueKind::Contradiction), 1);
    assert_eq!(report.count(IssueKind::Expiring), 1);
    assert_eq!(report.count(IssueKind::Expired), 1);
    assert_eq!(store.count().unwrap(), 3);
}
