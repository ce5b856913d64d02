//! Relevance scoring.
//!
//! A score is a weighted mean of six sub-scores, each already in `[0, 1]`:
//! importance, recency, access frequency, confidence, topic/focus match and
//! intent boost. The scorer never touches the store; the clock is captured
//! once at construction so the same scorer gives the same answer every time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::types::Memory;
use crate::retrieval::intent::Intent;
use crate::text::{content_words, coverage};

/// Relative weight of each sub-score. Weights need not sum to one; they are
/// normalized when combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub confidence: f64,
    pub importance: f64,
    pub topic: f64,
    pub recency: f64,
    pub access: f64,
    pub intent: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            importance: 0.20,
            topic: 0.20,
            recency: 0.15,
            access: 0.10,
            intent: 0.10,
        }
    }
}

impl ScoringWeights {
    /// Negative or non-finite weights count as zero. If nothing is left the
    /// defaults are used.
    fn sanitized(&self) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let w = Self {
            confidence: clean(self.confidence),
            importance: clean(self.importance),
            topic: clean(self.topic),
            recency: clean(self.recency),
            access: clean(self.access),
            intent: clean(self.intent),
        };
        if w.total() > 0.0 {
            w
        } else {
            Self::default()
        }
    }

    fn total(&self) -> f64 {
        self.confidence + self.importance + self.topic + self.recency + self.access + self.intent
    }
}

/// What the caller is doing and how much room the answer may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub intent: Intent,
    /// Free text; may be empty.
    pub focus: String,
    /// Token budget for [`RetrievalEngine::retrieve`](super::RetrievalEngine::retrieve).
    pub max_tokens: usize,
}

impl RetrievalContext {
    pub fn new(focus: impl Into<String>) -> Self {
        Self {
            intent: Intent::default(),
            focus: focus.into(),
            max_tokens: 2000,
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Per-factor sub-scores and the combined result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub importance: f64,
    pub recency: f64,
    pub access: f64,
    pub confidence: f64,
    pub topic: f64,
    pub intent: f64,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
    half_life_days: f64,
    reference_access_count: u64,
    now: DateTime<Utc>,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceScorer {
    /// Scorer with default weights, a 30-day half-life and the clock read now.
    pub fn new() -> Self {
        Self {
            weights: ScoringWeights::default(),
            half_life_days: 30.0,
            reference_access_count: 100,
            now: Utc::now(),
        }
    }

    /// Pin the instant ages are measured from.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights.sanitized();
        self
    }

    /// Non-positive or non-finite values are ignored.
    pub fn with_recency_half_life(mut self, days: f64) -> Self {
        if days.is_finite() && days > 0.0 {
            self.half_life_days = days;
        }
        self
    }

    /// Zero is ignored.
    pub fn with_reference_access_count(mut self, count: u64) -> Self {
        if count > 0 {
            self.reference_access_count = count;
        }
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Relevance of `memory` for `ctx`, in `[0, 1]`.
    pub fn score(&self, memory: &Memory, ctx: &RetrievalContext) -> f64 {
        self.breakdown(memory, ctx).total
    }

    pub fn breakdown(&self, memory: &Memory, ctx: &RetrievalContext) -> ScoreBreakdown {
        let w = &self.weights;
        let importance = memory.importance.weight();
        let recency = self.recency(memory.created_at);
        let access = self.access(memory.access_count);
        let confidence = unit(memory.confidence);
        let topic = topic_match(memory, &ctx.focus);
        let intent = ctx.intent.normalized_boost(memory.kind());

        let weighted = w.importance * importance
            + w.recency * recency
            + w.access * access
            + w.confidence * confidence
            + w.topic * topic
            + w.intent * intent;

        ScoreBreakdown {
            importance,
            recency,
            access,
            confidence,
            topic,
            intent,
            total: unit(weighted / w.total()),
        }
    }

    /// `0.5 ^ (age_days / half_life)`. Future timestamps count as age zero.
    pub fn recency(&self, created_at: DateTime<Utc>) -> f64 {
        let age = self.now - created_at;
        let age_us = age
            .num_microseconds()
            .unwrap_or_else(|| age.num_milliseconds().saturating_mul(1_000))
            .max(0);
        let age_days = age_us as f64 / 86_400_000_000.0;
        unit(0.5_f64.powf(age_days / self.half_life_days))
    }

    /// Logarithmic access curve with soft saturation: `x / (1 + x)` where
    /// `x = ln(1 + n) / ln(1 + reference)`. Strictly increasing in `n` and
    /// below 1 for every count.
    pub fn access(&self, access_count: u64) -> f64 {
        let x = (access_count as f64).ln_1p() / (self.reference_access_count as f64).ln_1p();
        unit(x / (1.0 + x))
    }
}

/// Fraction of focus words found in the memory's topic, or its summary when
/// it has no topic, or its knowledge when the summary is empty too.
pub fn topic_match(memory: &Memory, focus: &str) -> f64 {
    let query = content_words(focus);
    if query.is_empty() {
        return 0.0;
    }
    let field = [memory.topic(), Some(memory.summary.as_str()), memory.knowledge()]
        .into_iter()
        .flatten()
        .map(content_words)
        .find(|words| !words.is_empty())
        .unwrap_or_default();
    coverage(&query, &field)
}

/// Clamp into `[0, 1]`, mapping NaN to zero.
fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
