//! Token budgeting.
//!
//! [`BudgetManager::fit_to_budget`] walks rank-ordered memories twice. The
//! first pass includes items at [`DetailLevel::Summary`] until one does not
//! fit. The second pass upgrades included items, in rank order, one level at a
//! time while the incremental cost still fits.

use serde::{Deserialize, Serialize};

use crate::memory::types::{Memory, MemoryContent};

/// How much of a memory is shown. Ordered from cheapest to most complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Summary,
    Expanded,
    Full,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [Self::Summary, Self::Expanded, Self::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Expanded => "expanded",
            Self::Full => "full",
        }
    }

    pub fn next(&self) -> Option<DetailLevel> {
        match self {
            Self::Summary => Some(Self::Expanded),
            Self::Expanded => Some(Self::Full),
            Self::Full => None,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A memory paired with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f64,
}

/// One entry of a budgeted selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub memory_id: String,
    pub level: DetailLevel,
    pub tokens: usize,
    /// The input score, carried through unchanged.
    pub relevance_score: f64,
}

/// Fixed cost per rendered memory for separators and framing.
const FRAMING_TOKENS: usize = 4;

impl Memory {
    /// Text shown for this memory at `level`. Each level contains the previous one.
    pub fn render(&self, level: DetailLevel) -> String {
        let mut out = format!("[{}] {}", self.kind(), self.summary);
        if level == DetailLevel::Summary {
            return out;
        }

        match &self.content {
            MemoryContent::Tribal(t) => {
                out.push_str(&format!("\n{} ({:?}): {}", t.topic, t.severity, t.knowledge));
            }
            MemoryContent::Semantic(s) => {
                out.push_str(&format!("\n{}: {}", s.topic, s.knowledge));
            }
            MemoryContent::Episodic(e) => {
                out.push_str(&format!("\nQ: {}", e.interaction.user_query));
                if let Some(outcome) = &e.interaction.outcome {
                    out.push_str(&format!("\nOutcome: {outcome}"));
                }
            }
        }
        if level == DetailLevel::Expanded {
            return out;
        }

        match &self.content {
            MemoryContent::Tribal(t) => {
                for w in &t.warnings {
                    out.push_str(&format!("\nWarning: {w}"));
                }
                for c in &t.consequences {
                    out.push_str(&format!("\nConsequence: {c}"));
                }
                if !t.contributors.is_empty() {
                    out.push_str(&format!("\nContributors: {}", t.contributors.join(", ")));
                }
            }
            MemoryContent::Semantic(s) => {
                out.push_str(&format!(
                    "\nEvidence: {} supporting, {} contradicting",
                    s.supporting_evidence, s.contradicting_evidence
                ));
            }
            MemoryContent::Episodic(e) => {
                out.push_str(&format!("\nA: {}", e.interaction.agent_response));
                if let Some(intent) = &e.context.intent {
                    out.push_str(&format!("\nIntent: {intent}"));
                }
                if let Some(focus) = &e.context.focus {
                    out.push_str(&format!("\nFocus: {focus}"));
                }
                out.push_str(&format!(
                    "\nSession: {} ({})",
                    e.session_id, e.consolidation_status
                ));
            }
        }
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            out.push_str(&format!("\nTags: {}", tags.join(", ")));
        }
        out.push_str(&format!(
            "\nConfidence: {:.2}, importance: {}",
            self.confidence, self.importance
        ));
        let valid_to = self
            .valid_time
            .valid_to
            .map_or_else(|| "open".to_string(), |t| t.to_rfc3339());
        out.push_str(&format!(
            "\nValid: {} .. {}",
            self.valid_time.valid_from.to_rfc3339(),
            valid_to
        ));
        out
    }
}

#[derive(Debug, Clone)]
pub struct BudgetManager {
    chars_per_token: usize,
}

impl Default for BudgetManager {
    fn default() -> Self {
        Self::new(4)
    }
}

impl BudgetManager {
    /// `chars_per_token` of zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token: chars_per_token.max(1) }
    }

    /// Token cost of `memory` at `level`. Strictly increasing from summary to full.
    pub fn estimate_tokens(&self, memory: &Memory, level: DetailLevel) -> usize {
        self.estimates(memory)[level.index()]
    }

    /// Costs at every level, indexed by [`DetailLevel`].
    fn estimates(&self, memory: &Memory) -> [usize; 3] {
        let mut costs = [0usize; 3];
        let mut floor = 0;
        for level in DetailLevel::ALL {
            let chars = memory.render(level).chars().count();
            let raw = chars.div_ceil(self.chars_per_token) + FRAMING_TOKENS;
            let cost = raw.max(floor + 1);
            costs[level.index()] = cost;
            floor = cost;
        }
        costs
    }

    /// Fit `ranked` (best first) into `total_tokens`.
    ///
    /// The sum of `tokens` in the result never exceeds `total_tokens`, and the
    /// result keeps the input order and scores.
    pub fn fit_to_budget(&self, ranked: &[ScoredMemory], total_tokens: usize) -> Vec<Selection> {
        let mut remaining = total_tokens;
        let mut included: Vec<(Selection, [usize; 3])> = Vec::new();

        for item in ranked {
            let costs = self.estimates(&item.memory);
            let cost = costs[DetailLevel::Summary.index()];
            if cost > remaining {
                break;
            }
            remaining -= cost;
            included.push((
                Selection {
                    memory_id: item.memory.id.clone(),
                    level: DetailLevel::Summary,
                    tokens: cost,
                    relevance_score: item.score,
                },
                costs,
            ));
        }

        for (selection, costs) in &mut included {
            while let Some(next) = selection.level.next() {
                let delta = costs[next.index()] - selection.tokens;
                if delta > remaining {
                    break;
                }
                remaining -= delta;
                selection.level = next;
                selection.tokens = costs[next.index()];
            }
        }

        tracing::debug!(
            budget = total_tokens,
            used = total_tokens - remaining,
            included = included.len(),
            candidates = ranked.len(),
            "fit to budget"
        );
        included.into_iter().map(|(s, _)| s).collect()
    }
}
