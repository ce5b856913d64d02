//! Core memory type definitions.
//!
//! A [`Memory`] carries the shared base shape (confidence, importance, access
//! count, tags and the two independent timelines) plus a [`MemoryContent`]
//! variant for the kind-specific fields. [`CausalEdge`] is a directed,
//! strength-weighted relationship between two memories, referenced by id only.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text::truncate_preview;

/// The three kinds of project memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Team conventions, gotchas and warnings learned about the codebase.
    Tribal,
    /// A single interaction with the assistant, pending consolidation.
    Episodic,
    /// Consolidated knowledge with evidence counters.
    Semantic,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [Self::Tribal, Self::Episodic, Self::Semantic];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tribal => "tribal",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tribal" => Ok(Self::Tribal),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// How much a memory matters, independent of how relevant it is right now.
///
/// Variants are declared low to high so the derived `Ord` matches
/// `critical > high > normal > low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Normal,
    High,
    Critical,
}

impl Importance {
    pub const ALL: [Importance; 4] = [Self::Critical, Self::High, Self::Normal, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Normalized weight used by the relevance scorer.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.75,
            Self::Normal => 0.5,
            Self::Low => 0.25,
        }
    }

    /// Integer rank for SQL ordering (higher is more important).
    pub fn rank(&self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown importance: {s}")),
        }
    }
}

/// Severity of a tribal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Lifecycle of an episodic memory. Only `Pending` may move, and only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    Pending,
    Consolidated,
    Discarded,
}

impl ConsolidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Consolidated => "consolidated",
            Self::Discarded => "discarded",
        }
    }

    pub fn can_transition_to(&self, next: ConsolidationStatus) -> bool {
        *self == next || (*self == Self::Pending && next != Self::Pending)
    }
}

impl std::fmt::Display for ConsolidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the system learned this memory. Immutable once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTime {
    pub recorded_at: DateTime<Utc>,
}

/// The real-world interval during which the memory is considered true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTime {
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl ValidTime {
    /// Inclusive on both ends; an open `valid_to` extends forever.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.map_or(true, |to| at <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TribalContent {
    pub topic: String,
    pub knowledge: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodicContext {
    pub intent: Option<String>,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interaction {
    pub user_query: String,
    pub agent_response: String,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicContent {
    pub session_id: String,
    pub context: EpisodicContext,
    pub interaction: Interaction,
    pub consolidation_status: ConsolidationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticContent {
    pub topic: String,
    pub knowledge: String,
    #[serde(default)]
    pub supporting_evidence: u32,
    #[serde(default)]
    pub contradicting_evidence: u32,
}

/// Kind-specific payload. Matching on this forces every consumer to handle
/// all three kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryContent {
    Tribal(TribalContent),
    Episodic(EpisodicContent),
    Semantic(SemanticContent),
}

/// A memory record, matching the `memories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7 assigned at construction; never changes.
    pub id: String,
    pub summary: String,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub importance: Importance,
    /// Monotonically non-decreasing.
    pub access_count: u64,
    pub tags: BTreeSet<String>,
    pub transaction_time: TransactionTime,
    pub valid_time: ValidTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content: MemoryContent,
}

impl Memory {
    /// Build a memory with a fresh id, recorded and valid from now.
    pub fn new(summary: impl Into<String>, content: MemoryContent) -> Self {
        // Stored timestamps carry microseconds.
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            summary: summary.into(),
            confidence: 1.0,
            importance: Importance::Normal,
            access_count: 0,
            tags: BTreeSet::new(),
            transaction_time: TransactionTime { recorded_at: now },
            valid_time: ValidTime {
                valid_from: now,
                valid_to: None,
            },
            created_at: now,
            updated_at: now,
            content,
        }
    }

    pub fn tribal(topic: impl Into<String>, knowledge: impl Into<String>, severity: Severity) -> Self {
        let knowledge = knowledge.into();
        let summary = truncate_preview(&knowledge, 80);
        Self::new(
            summary,
            MemoryContent::Tribal(TribalContent {
                topic: topic.into(),
                knowledge,
                severity,
                warnings: Vec::new(),
                consequences: Vec::new(),
                contributors: Vec::new(),
            }),
        )
    }

    pub fn semantic(topic: impl Into<String>, knowledge: impl Into<String>) -> Self {
        let knowledge = knowledge.into();
        let summary = truncate_preview(&knowledge, 80);
        Self::new(
            summary,
            MemoryContent::Semantic(SemanticContent {
                topic: topic.into(),
                knowledge,
                supporting_evidence: 0,
                contradicting_evidence: 0,
            }),
        )
    }

    pub fn episodic(
        session_id: impl Into<String>,
        context: EpisodicContext,
        interaction: Interaction,
    ) -> Self {
        let summary = truncate_preview(&interaction.user_query, 80);
        Self::new(
            summary,
            MemoryContent::Episodic(EpisodicContent {
                session_id: session_id.into(),
                context,
                interaction,
                consolidation_status: ConsolidationStatus::Pending,
            }),
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_access_count(mut self, access_count: u64) -> Self {
        self.access_count = access_count;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Backdate (or postdate) creation and recording together.
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        let at = at.trunc_subsecs(6);
        self.transaction_time.recorded_at = at;
        self.created_at = at;
        self.updated_at = at;
        self
    }

    pub fn valid_between(mut self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Self {
        self.valid_time = ValidTime {
            valid_from: from.trunc_subsecs(6),
            valid_to: to.map(|t| t.trunc_subsecs(6)),
        };
        self
    }

    pub fn kind(&self) -> MemoryKind {
        match &self.content {
            MemoryContent::Tribal(_) => MemoryKind::Tribal,
            MemoryContent::Episodic(_) => MemoryKind::Episodic,
            MemoryContent::Semantic(_) => MemoryKind::Semantic,
        }
    }

    /// Topic for tribal and semantic memories; `None` when absent or blank.
    pub fn topic(&self) -> Option<&str> {
        let topic = match &self.content {
            MemoryContent::Tribal(t) => t.topic.as_str(),
            MemoryContent::Semantic(s) => s.topic.as_str(),
            MemoryContent::Episodic(_) => return None,
        };
        Some(topic).filter(|t| !t.trim().is_empty())
    }

    /// The asserted claim for tribal and semantic memories.
    pub fn knowledge(&self) -> Option<&str> {
        let knowledge = match &self.content {
            MemoryContent::Tribal(t) => t.knowledge.as_str(),
            MemoryContent::Semantic(s) => s.knowledge.as_str(),
            MemoryContent::Episodic(_) => return None,
        };
        Some(knowledge).filter(|k| !k.trim().is_empty())
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_time.contains(at)
    }

    pub fn is_recorded_by(&self, at: DateTime<Utc>) -> bool {
        self.transaction_time.recorded_at <= at
    }

    /// Check the record-level invariants enforced on every write.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidMemory("id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidMemory(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        let stamps = [
            ("recorded_at", Some(self.transaction_time.recorded_at)),
            ("valid_from", Some(self.valid_time.valid_from)),
            ("valid_to", self.valid_time.valid_to),
            ("created_at", Some(self.created_at)),
            ("updated_at", Some(self.updated_at)),
        ];
        for (field, at) in stamps {
            if let Some(at) = at {
                if !(0..=9999).contains(&at.year()) {
                    return Err(Error::InvalidMemory(format!(
                        "{field} {at} is outside years 0000-9999"
                    )));
                }
            }
        }
        if let Some(to) = self.valid_time.valid_to {
            if to < self.valid_time.valid_from {
                return Err(Error::InvalidMemory(format!(
                    "valid_to {to} precedes valid_from {}",
                    self.valid_time.valid_from
                )));
            }
        }
        Ok(())
    }
}

/// Normalize a topic for exact-match lookup: lowercase, trimmed, single spaces.
pub fn normalize_topic(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Relationship label on a causal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelation {
    Caused,
    Enabled,
    Prevented,
    Contradicts,
    Supersedes,
    Supports,
    DerivedFrom,
    TriggeredBy,
    Related,
}

impl CausalRelation {
    pub const ALL: [CausalRelation; 9] = [
        Self::Caused,
        Self::Enabled,
        Self::Prevented,
        Self::Contradicts,
        Self::Supersedes,
        Self::Supports,
        Self::DerivedFrom,
        Self::TriggeredBy,
        Self::Related,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Caused => "caused",
            Self::Enabled => "enabled",
            Self::Prevented => "prevented",
            Self::Contradicts => "contradicts",
            Self::Supersedes => "supersedes",
            Self::Supports => "supports",
            Self::DerivedFrom => "derived_from",
            Self::TriggeredBy => "triggered_by",
            Self::Related => "related",
        }
    }
}

impl std::fmt::Display for CausalRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CausalRelation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown causal relation: {s}"))
    }
}

/// A directed edge between two memories. Endpoints are ids, resolved through
/// the store on demand; an edge never owns the memories it connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation: CausalRelation,
    /// In `[0.0, 1.0]`.
    pub strength: f64,
    /// References to the facts that support this edge.
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What a [`MemoryLink`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    File,
    Function,
    Pattern,
    Constraint,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Pattern => "pattern",
            Self::Constraint => "constraint",
        }
    }
}

/// Weak link from a memory to a code artifact (file path, function name,
/// pattern id or constraint id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLink {
    pub kind: LinkKind,
    pub target: String,
}

impl MemoryLink {
    pub fn file(path: impl Into<String>) -> Self {
        Self { kind: LinkKind::File, target: path.into() }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self { kind: LinkKind::Function, target: name.into() }
    }

    pub fn pattern(id: impl Into<String>) -> Self {
        Self { kind: LinkKind::Pattern, target: id.into() }
    }

    pub fn constraint(id: impl Into<String>) -> Self {
        Self { kind: LinkKind::Constraint, target: id.into() }
    }
}

/// Partial update applied by feedback processing.
///
/// `access_count` only ever raises the stored counter, and the transaction
/// time is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPatch {
    pub summary: Option<String>,
    pub confidence: Option<f64>,
    pub importance: Option<Importance>,
    pub access_count: Option<u64>,
    pub tags: Option<BTreeSet<String>>,
    /// `Some(None)` reopens the valid interval.
    pub valid_to: Option<Option<DateTime<Utc>>>,
    pub consolidation_status: Option<ConsolidationStatus>,
}

impl MemoryPatch {
    /// Apply onto `memory` and re-validate. Leaves `memory` untouched on error.
    pub fn apply(&self, memory: &mut Memory) -> Result<()> {
        let mut next = memory.clone();

        if let Some(summary) = &self.summary {
            next.summary = summary.clone();
        }
        if let Some(confidence) = self.confidence {
            next.confidence = confidence;
        }
        if let Some(importance) = self.importance {
            next.importance = importance;
        }
        if let Some(access_count) = self.access_count {
            next.access_count = next.access_count.max(access_count);
        }
        if let Some(tags) = &self.tags {
            next.tags = tags.clone();
        }
        if let Some(valid_to) = self.valid_to {
            next.valid_time.valid_to = valid_to.map(|t| t.trunc_subsecs(6));
        }
        if let Some(status) = self.consolidation_status {
            match &mut next.content {
                MemoryContent::Episodic(episode) => {
                    if !episode.consolidation_status.can_transition_to(status) {
                        return Err(Error::InvalidTransition {
                            from: episode.consolidation_status,
                            to: status,
                        });
                    }
                    episode.consolidation_status = status;
                }
                MemoryContent::Tribal(_) | MemoryContent::Semantic(_) => {
                    return Err(Error::InvalidMemory(format!(
                        "consolidation status only applies to episodic memories, not {}",
                        memory.kind()
                    )));
                }
            }
        }

        next.validate()?;
        next.updated_at = Utc::now().trunc_subsecs(6);
        *memory = next;
        Ok(())
    }
}
