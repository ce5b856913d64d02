//! "Why" narratives built from a memory's immediate causal neighborhood.

use serde::Serialize;

use crate::error::Result;
use crate::memory::store::MemoryReader;
use crate::memory::types::{CausalEdge, CausalRelation, Memory};

use super::traversal::CausalTraverser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Origins,
    Effects,
    Support,
    Conflicts,
}

impl SectionKind {
    const ORDER: [SectionKind; 4] = [Self::Origins, Self::Effects, Self::Support, Self::Conflicts];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Origins => "Origins",
            Self::Effects => "Effects",
            Self::Support => "Support",
            Self::Conflicts => "Conflicts",
        }
    }

    fn for_incoming(relation: CausalRelation) -> Self {
        match relation {
            CausalRelation::Supports => Self::Support,
            CausalRelation::Contradicts | CausalRelation::Prevented => Self::Conflicts,
            _ => Self::Origins,
        }
    }

    fn for_outgoing(relation: CausalRelation) -> Self {
        match relation {
            CausalRelation::Supports | CausalRelation::Related => Self::Support,
            CausalRelation::Contradicts | CausalRelation::Prevented => Self::Conflicts,
            _ => Self::Effects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSection {
    pub kind: SectionKind,
    pub title: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalNarrative {
    pub memory_id: String,
    pub summary: String,
    /// One line per depth-1 connection: neighbor summary, relation and strength.
    pub key_points: Vec<String>,
    /// Mean strength of the depth-1 edges; zero when there are none.
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Non-empty sections only, in Origins, Effects, Support, Conflicts order.
    pub sections: Vec<NarrativeSection>,
    pub evidence_refs: Vec<String>,
}

impl CausalNarrative {
    fn not_found(memory_id: &str) -> Self {
        Self {
            memory_id: memory_id.to_string(),
            summary: "No causal context found.".to_string(),
            key_points: Vec::new(),
            confidence: 0.0,
            confidence_level: ConfidenceLevel::VeryLow,
            sections: Vec::new(),
            evidence_refs: Vec::new(),
        }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&NarrativeSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

fn verb(relation: CausalRelation) -> &'static str {
    match relation {
        CausalRelation::Caused => "caused",
        CausalRelation::Enabled => "enabled",
        CausalRelation::Prevented => "prevented",
        CausalRelation::Contradicts => "contradicts",
        CausalRelation::Supersedes => "supersedes",
        CausalRelation::Supports => "supports",
        CausalRelation::DerivedFrom => "was derived from",
        CausalRelation::TriggeredBy => "was triggered by",
        CausalRelation::Related => "is related to",
    }
}

impl<R: MemoryReader + ?Sized> CausalTraverser<'_, R> {
    /// Narrative for `id` from its incoming and outgoing edges. Neighbors that
    /// cannot be read are skipped.
    pub fn narrative(&self, id: &str) -> Result<CausalNarrative> {
        let reader = self.reader();
        let Some(memory) = reader.read(id)? else {
            return Ok(CausalNarrative::not_found(id));
        };
        let neighbors = self.get_neighbors(id)?;

        let mut buckets: [Vec<String>; 4] = Default::default();
        let mut key_points = Vec::new();
        let mut evidence_refs = Vec::new();
        let mut strengths = Vec::new();

        let mut visit = |edge: &CausalEdge, other: &Memory, section: SectionKind, incoming: bool| {
            let (source, target) = if incoming { (other, &memory) } else { (&memory, other) };
            buckets[section as usize].push(format!(
                "{} {} {}",
                source.summary,
                verb(edge.relation),
                target.summary
            ));
            key_points.push(format!(
                "{} ({}: {:.0}%)",
                other.summary,
                edge.relation,
                edge.strength * 100.0
            ));
            evidence_refs.extend(edge.evidence.iter().cloned());
            strengths.push(edge.strength);
        };

        for edge in &neighbors.incoming {
            if let Some(source) = reader.read(&edge.source_id)? {
                visit(edge, &source, SectionKind::for_incoming(edge.relation), true);
            }
        }
        for edge in &neighbors.outgoing {
            if let Some(target) = reader.read(&edge.target_id)? {
                visit(edge, &target, SectionKind::for_outgoing(edge.relation), false);
            }
        }

        let confidence = if strengths.is_empty() {
            0.0
        } else {
            (strengths.iter().sum::<f64>() / strengths.len() as f64).clamp(0.0, 1.0)
        };
        let confidence_level = ConfidenceLevel::from_score(confidence);

        let sections: Vec<NarrativeSection> = SectionKind::ORDER
            .into_iter()
            .zip(buckets)
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(kind, entries)| NarrativeSection {
                kind,
                title: kind.title().to_string(),
                entries,
            })
            .collect();

        let summary = if sections.is_empty() {
            "No causal relationships found.".to_string()
        } else {
            format!(
                "{} has {} causal connections with {} confidence.",
                memory.summary,
                key_points.len(),
                confidence_level
            )
        };

        Ok(CausalNarrative {
            memory_id: id.to_string(),
            summary,
            key_points,
            confidence,
            confidence_level,
            sections,
            evidence_refs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::{MemoryStore, SqliteStore};

    #[test]
    fn confidence_levels() {
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.2), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn missing_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        let n = CausalTraverser::new(&store).narrative("ghost").unwrap();
        assert_eq!(n.summary, "No causal context found.");
        assert_eq!(n.confidence, 0.0);
        assert_eq!(n.confidence_level, ConfidenceLevel::VeryLow);
    }

    #[test]
    fn isolated_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create(&Memory::semantic("a", "alone")).unwrap();
        let n = CausalTraverser::new(&store).narrative(&id).unwrap();
        assert_eq!(n.summary, "No causal relationships found.");
        assert!(n.sections.is_empty());
    }

    #[test]
    fn sections_follow_relations() {
        let store = SqliteStore::open_in_memory().unwrap();
        let center = store.create(&Memory::semantic("db", "pool exhausted")).unwrap();
        let cause = store.create(&Memory::semantic("db", "traffic spike")).unwrap();
        let effect = store.create(&Memory::semantic("db", "requests timed out")).unwrap();
        let doubt = store.create(&Memory::semantic("db", "pool was fine")).unwrap();

        store
            .add_relationship(&cause, &center, CausalRelation::Caused, 0.8, &["incident-42".into()])
            .unwrap();
        store
            .add_relationship(&center, &effect, CausalRelation::Caused, 0.6, &[])
            .unwrap();
        store
            .add_relationship(&doubt, &center, CausalRelation::Contradicts, 0.4, &[])
            .unwrap();

        let n = CausalTraverser::new(&store).narrative(&center).unwrap();
        let origins = n.section(SectionKind::Origins).unwrap();
        assert_eq!(origins.entries, vec!["traffic spike caused pool exhausted"]);
        let effects = n.section(SectionKind::Effects).unwrap();
        assert_eq!(effects.entries, vec!["pool exhausted caused requests timed out"]);
        assert!(n.section(SectionKind::Conflicts).is_some());
        assert!(n.section(SectionKind::Support).is_none());

        assert_eq!(n.key_points.len(), 3);
        assert!(n.key_points.contains(&"traffic spike (caused: 80%)".to_string()));
        assert_eq!(n.evidence_refs, vec!["incident-42"]);
        assert!((n.confidence - 0.6).abs() < 1e-9);
        assert_eq!(n.confidence_level, ConfidenceLevel::Medium);
    }
}
