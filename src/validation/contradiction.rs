//! Same-topic contradiction detection.
//!
//! Two memories conflict when they share a topic, their claims are about the
//! same thing (word overlap at or above the similarity floor once polarity
//! cues are set aside), and the claims point in opposite directions: one uses
//! a cue word whose opposite the other uses ("always" / "never"), or exactly
//! one of them is negated.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::memory::search::SearchFilter;
use crate::memory::store::MemoryReader;
use crate::memory::types::Memory;
use crate::text::{content_words, jaccard};

use super::{Issue, IssueKind};

/// Opposing directive pairs. Order within a pair does not matter.
const POLARITY_PAIRS: &[(&str, &str)] = &[
    ("always", "never"),
    ("must", "mustn't"),
    ("should", "shouldn't"),
    ("use", "avoid"),
    ("enable", "disable"),
    ("enabled", "disabled"),
    ("allow", "forbid"),
    ("allowed", "forbidden"),
    ("required", "optional"),
    ("true", "false"),
    ("increase", "decrease"),
    ("sync", "async"),
    ("safe", "unsafe"),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "don't", "dont", "doesn't", "isn't", "aren't", "can't", "cannot", "won't",
    "shouldn't", "mustn't", "never",
];

fn is_cue(word: &str) -> bool {
    NEGATIONS.contains(&word) || POLARITY_PAIRS.iter().any(|(a, b)| *a == word || *b == word)
}

fn negated(words: &BTreeSet<String>) -> bool {
    words.iter().filter(|w| NEGATIONS.contains(&w.as_str())).count() % 2 == 1
}

fn opposing_cue(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<(&'static str, &'static str)> {
    POLARITY_PAIRS.iter().copied().find(|(x, y)| {
        (a.contains(*x) && b.contains(*y) && !a.contains(*y) && !b.contains(*x))
            || (a.contains(*y) && b.contains(*x) && !a.contains(*x) && !b.contains(*y))
    })
}

/// Word overlap of two claims with polarity and negation words removed.
pub fn claim_similarity(a: &str, b: &str) -> f64 {
    let strip = |s: &str| -> BTreeSet<String> {
        content_words(s).into_iter().filter(|w| !is_cue(w)).collect()
    };
    jaccard(&strip(a), &strip(b))
}

/// `Some(reason)` when the two claims point in opposite directions.
pub fn conflict_reason(a: &str, b: &str) -> Option<String> {
    let (wa, wb) = (content_words(a), content_words(b));
    if let Some((x, y)) = opposing_cue(&wa, &wb) {
        return Some(format!("opposing directives \"{x}\" and \"{y}\""));
    }
    if negated(&wa) != negated(&wb) {
        return Some("one claim negates the other".to_string());
    }
    None
}

#[derive(Debug, Clone)]
pub struct ContradictionDetector {
    similarity_floor: f64,
}

impl Default for ContradictionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContradictionDetector {
    pub fn new() -> Self {
        Self { similarity_floor: 0.3 }
    }

    /// Non-finite values are ignored; others are clamped into `[0, 1]`.
    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        if floor.is_finite() {
            self.similarity_floor = floor.clamp(0.0, 1.0);
        }
        self
    }

    pub fn similarity_floor(&self) -> f64 {
        self.similarity_floor
    }

    /// Flag memories on the same topic whose claims conflict with `memory`.
    /// A memory with no topic or no knowledge yields no issues. Nothing is
    /// written to the store.
    pub fn detect<R: MemoryReader + ?Sized>(&self, reader: &R, memory: &Memory) -> Result<Vec<Issue>> {
        let (Some(topic), Some(claim)) = (memory.topic(), memory.knowledge()) else {
            return Ok(Vec::new());
        };

        let candidates = reader.search(&SearchFilter::new().topic(topic))?;
        let mut issues = Vec::new();
        for other in candidates.iter().filter(|c| c.id != memory.id) {
            let Some(other_claim) = other.knowledge() else {
                continue;
            };
            let similarity = claim_similarity(claim, other_claim);
            if similarity < self.similarity_floor {
                continue;
            }
            if let Some(reason) = conflict_reason(claim, other_claim) {
                issues.push(Issue {
                    memory_id: memory.id.clone(),
                    kind: IssueKind::Contradiction,
                    conflicting_memory_id: Some(other.id.clone()),
                    similarity: Some(similarity),
                    message: format!("conflicts with {} on \"{topic}\": {reason}", other.id),
                });
            }
        }

        debug!(
            memory_id = %memory.id,
            candidates = candidates.len(),
            issues = issues.len(),
            "contradiction check"
        );
        Ok(issues)
    }
}
