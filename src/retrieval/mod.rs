//! Retrieval: score candidate memories against a context and fit the best of
//! them into a token budget.

pub mod budget;
pub mod intent;
pub mod scorer;

pub use budget::{BudgetManager, DetailLevel, ScoredMemory, Selection};
pub use intent::Intent;
pub use scorer::{RelevanceScorer, RetrievalContext, ScoreBreakdown, ScoringWeights};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::memory::search::SearchFilter;
use crate::memory::store::MemoryReader;
use crate::memory::types::Memory;

/// A selected memory with the text shown for it.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedMemory {
    #[serde(flatten)]
    pub selection: Selection,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub memories: Vec<RetrievedMemory>,
    pub tokens_used: usize,
    pub budget: usize,
    /// How many memories were scored.
    pub candidates: usize,
}

/// Search, score, rank, budget. Read-only.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    scorer: RelevanceScorer,
    budget: BudgetManager,
    candidate_limit: usize,
    min_confidence: f64,
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new(RelevanceScorer::new(), BudgetManager::default())
    }
}

impl RetrievalEngine {
    pub fn new(scorer: RelevanceScorer, budget: BudgetManager) -> Self {
        Self {
            scorer,
            budget,
            candidate_limit: 200,
            min_confidence: 0.0,
        }
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn with_min_confidence(mut self, floor: f64) -> Self {
        self.min_confidence = floor;
        self
    }

    pub fn budget_manager(&self) -> &BudgetManager {
        &self.budget
    }

    pub fn retrieve<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        ctx: &RetrievalContext,
    ) -> Result<RetrievalResult> {
        self.retrieve_at(reader, ctx, Utc::now())
    }

    /// [`retrieve`](Self::retrieve) with ages measured from `now`.
    pub fn retrieve_at<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        ctx: &RetrievalContext,
        now: DateTime<Utc>,
    ) -> Result<RetrievalResult> {
        let filter = SearchFilter::new()
            .min_confidence(self.min_confidence)
            .limit(self.candidate_limit);
        let candidates = reader.search(&filter)?;
        let ranked = rank(&self.scorer.clone().at(now), candidates, ctx);

        let selections = self.budget.fit_to_budget(&ranked, ctx.max_tokens);
        let tokens_used = selections.iter().map(|s| s.tokens).sum();

        let memories = selections
            .into_iter()
            .zip(&ranked)
            .map(|(selection, scored)| RetrievedMemory {
                text: scored.memory.render(selection.level),
                selection,
            })
            .collect();

        tracing::debug!(
            intent = %ctx.intent,
            candidates = ranked.len(),
            tokens_used,
            budget = ctx.max_tokens,
            "retrieval complete"
        );
        Ok(RetrievalResult {
            memories,
            tokens_used,
            budget: ctx.max_tokens,
            candidates: ranked.len(),
        })
    }
}

/// Score and sort best first; equal scores fall back to id order.
pub fn rank(
    scorer: &RelevanceScorer,
    memories: Vec<Memory>,
    ctx: &RetrievalContext,
) -> Vec<ScoredMemory> {
    let mut ranked: Vec<ScoredMemory> = memories
        .into_iter()
        .map(|memory| ScoredMemory {
            score: scorer.score(&memory, ctx),
            memory,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    ranked
}
