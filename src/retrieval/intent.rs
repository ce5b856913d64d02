//! What the caller is trying to do, and how much each memory kind matters for it.

use serde::{Deserialize, Serialize};

use crate::memory::types::MemoryKind;

/// Task intent attached to a retrieval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Recall,
    FixBug,
    AddFeature,
    Refactor,
    UnderstandCode,
    SecurityAudit,
    AddTest,
    ReviewCode,
    Investigate,
}

/// Largest multiplier in the boost table; used to normalize into `[0, 1]`.
const MAX_BOOST: f64 = 2.0;

impl Intent {
    pub const ALL: [Intent; 9] = [
        Self::Recall,
        Self::FixBug,
        Self::AddFeature,
        Self::Refactor,
        Self::UnderstandCode,
        Self::SecurityAudit,
        Self::AddTest,
        Self::ReviewCode,
        Self::Investigate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recall => "recall",
            Self::FixBug => "fix_bug",
            Self::AddFeature => "add_feature",
            Self::Refactor => "refactor",
            Self::UnderstandCode => "understand_code",
            Self::SecurityAudit => "security_audit",
            Self::AddTest => "add_test",
            Self::ReviewCode => "review_code",
            Self::Investigate => "investigate",
        }
    }

    /// Multiplier for `kind` under this intent. 1.0 is neutral.
    pub fn boost(&self, kind: MemoryKind) -> f64 {
        use MemoryKind::{Episodic, Semantic, Tribal};
        match (self, kind) {
            (Self::FixBug, Tribal) => 2.0,
            (Self::FixBug, Episodic) => 1.3,
            (Self::SecurityAudit, Tribal) => 1.8,
            (Self::UnderstandCode, Tribal) => 1.5,
            (Self::UnderstandCode, Semantic) => 1.5,
            (Self::ReviewCode, Tribal) => 1.5,
            (Self::AddFeature, Semantic) => 1.5,
            (Self::AddFeature, Tribal) => 1.2,
            (Self::Refactor, Tribal) => 1.3,
            (Self::Refactor, Semantic) => 1.3,
            (Self::AddTest, Semantic) => 1.3,
            (Self::Investigate, Episodic) => 1.8,
            (Self::Investigate, Tribal) => 1.3,
            (Self::Recall, Tribal) => 1.2,
            _ => 1.0,
        }
    }

    /// [`boost`](Self::boost) scaled into `[0, 1]`.
    pub fn normalized_boost(&self, kind: MemoryKind) -> f64 {
        (self.boost(kind) / MAX_BOOST).clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == key)
            .ok_or_else(|| format!("unknown intent: {s}"))
    }
}
