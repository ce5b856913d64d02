//! Validation passes over stored memories.
//!
//! Validators only report. Acting on an issue (lowering confidence, closing
//! the valid interval, deleting) is left to the caller.

pub mod contradiction;
pub mod temporal;

pub use contradiction::ContradictionDetector;
pub use temporal::TemporalValidator;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::memory::search::SearchFilter;
use crate::memory::store::MemoryReader;
use crate::memory::types::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueDimension {
    Contradiction,
    Temporal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Contradiction,
    Expired,
    Expiring,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contradiction => "contradiction",
            Self::Expired => "expired",
            Self::Expiring => "expiring",
        }
    }

    pub fn dimension(&self) -> IssueDimension {
        match self {
            Self::Contradiction => IssueDimension::Contradiction,
            Self::Expired | Self::Expiring => IssueDimension::Temporal,
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized with a `dimension` field derived from `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub memory_id: String,
    pub kind: IssueKind,
    /// The other side of a contradiction.
    pub conflicting_memory_id: Option<String>,
    pub similarity: Option<f64>,
    pub message: String,
}

impl Issue {
    pub fn dimension(&self) -> IssueDimension {
        self.kind.dimension()
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            memory_id: &'a str,
            dimension: IssueDimension,
            kind: IssueKind,
            #[serde(skip_serializing_if = "Option::is_none")]
            conflicting_memory_id: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            similarity: Option<f64>,
            message: &'a str,
        }

        Wire {
            memory_id: &self.memory_id,
            dimension: self.dimension(),
            kind: self.kind,
            conflicting_memory_id: self.conflicting_memory_id.as_deref(),
            similarity: self.similarity,
            message: &self.message,
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub scanned: usize,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }
}

/// Runs the contradiction and temporal checks against one reader.
pub struct Validator<'a, R: MemoryReader + ?Sized> {
    reader: &'a R,
    contradictions: ContradictionDetector,
    temporal: TemporalValidator,
    now: DateTime<Utc>,
}

impl<'a, R: MemoryReader + ?Sized> Validator<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            contradictions: ContradictionDetector::default(),
            temporal: TemporalValidator::default(),
            now: Utc::now(),
        }
    }

    pub fn with_contradiction_detector(mut self, detector: ContradictionDetector) -> Self {
        self.contradictions = detector;
        self
    }

    pub fn with_temporal_validator(mut self, validator: TemporalValidator) -> Self {
        self.temporal = validator;
        self
    }

    /// Pin the instant expiry is measured against.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Contradiction issues followed by any temporal issue.
    pub fn validate(&self, memory: &Memory) -> Result<Vec<Issue>> {
        let mut issues = self.contradictions.detect(self.reader, memory)?;
        issues.extend(self.temporal.check(memory, self.now));
        Ok(issues)
    }

    /// Validate every memory visible to the reader. Each contradicting pair
    /// is reported once, from the side that sorts first in scan order.
    pub fn scan(&self) -> Result<ValidationReport> {
        let memories = self.reader.search(&SearchFilter::new())?;
        let mut report = ValidationReport {
            scanned: memories.len(),
            issues: Vec::new(),
        };
        let mut pairs: HashSet<(String, String)> = HashSet::new();

        for memory in &memories {
            for issue in self.validate(memory)? {
                if let Some(other) = &issue.conflicting_memory_id {
                    let key = if issue.memory_id <= *other {
                        (issue.memory_id.clone(), other.clone())
                    } else {
                        (other.clone(), issue.memory_id.clone())
                    };
                    if !pairs.insert(key) {
                        continue;
                    }
                }
                report.issues.push(issue);
            }
        }

        tracing::info!(
            scanned = report.scanned,
            issues = report.issues.len(),
            "validation scan complete"
        );
        Ok(report)
    }
}
