//! Valid-time expiry checks.

use chrono::{DateTime, Duration, Utc};

use crate::memory::types::Memory;

use super::{Issue, IssueKind};

#[derive(Debug, Clone)]
pub struct TemporalValidator {
    warning_window: Duration,
}

impl Default for TemporalValidator {
    fn default() -> Self {
        Self::new(7)
    }
}

impl TemporalValidator {
    /// Memories whose `valid_to` falls within `expiry_warning_days` of now are
    /// reported as expiring. Negative values are treated as zero.
    pub fn new(expiry_warning_days: i64) -> Self {
        Self {
            warning_window: Duration::days(expiry_warning_days.clamp(0, 36_500)),
        }
    }

    /// Expired when `valid_to` is before `now`; expiring when it falls inside
    /// the warning window. Open intervals never expire.
    pub fn check(&self, memory: &Memory, now: DateTime<Utc>) -> Option<Issue> {
        let valid_to = memory.valid_time.valid_to?;
        if valid_to < now {
            return Some(Issue {
                memory_id: memory.id.clone(),
                kind: IssueKind::Expired,
                conflicting_memory_id: None,
                similarity: None,
                message: format!("expired on {}", valid_to.format("%Y-%m-%d")),
            });
        }
        if valid_to <= now + self.warning_window {
            let days = (valid_to - now).num_days();
            return Some(Issue {
                memory_id: memory.id.clone(),
                kind: IssueKind::Expiring,
                conflicting_memory_id: None,
                similarity: None,
                message: format!("expires on {} (in {days} days)", valid_to.format("%Y-%m-%d")),
            });
        }
        None
    }
}
