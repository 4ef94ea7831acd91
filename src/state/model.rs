//! Durable state records
//!
//! Typed DTOs for everything that reaches disk. This module is the single
//! serialization boundary: components exchange these types in memory and
//! only `state::store` turns them into bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;

/// Outcome classification for a single action invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The action exited successfully within its timeout
    Success,
    /// All attempts failed or timed out
    Failure,
}

/// Result of one action invocation within a cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResult {
    /// Name of the invoked action
    pub action: String,
    /// Success or failure
    pub status: ActionStatus,
    /// Wall-clock duration of the successful attempt in milliseconds
    pub duration_ms: u64,
    /// Phase the action ran in
    pub phase: String,
    /// Attempt number at which the action succeeded (1-indexed)
    pub attempts: u32,
}

/// Terminal failure of an action after exhausting retries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Name of the failing action
    pub action: String,
    /// Final error message (last attempt)
    pub message: String,
    /// Phase the action ran in
    pub phase: String,
    /// Total attempts made
    pub attempts: u32,
}

/// One full pass through all phases
///
/// Immutable once appended to [`PersistedState`]; the only later movement
/// is relocation into the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleRecord {
    /// Monotonic cycle number (1-indexed across the state's lifetime)
    pub sequence: u64,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Successful invocations, in completion order
    pub results: Vec<ActionResult>,
    /// Terminal failures, in completion order
    pub errors: Vec<ErrorRecord>,
    /// Total cycle duration in milliseconds
    pub duration_ms: u64,
}

impl CycleRecord {
    /// Number of successful action runs in this cycle
    #[must_use]
    pub fn successes(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ActionStatus::Success)
            .count()
    }

    /// Number of terminal failures in this cycle
    #[must_use]
    pub fn failures(&self) -> usize {
        self.errors.len()
    }

    /// Whether the named action failed in this cycle
    #[must_use]
    pub fn failed(&self, action: &str) -> bool {
        self.errors.iter().any(|e| e.action == action)
    }
}

/// The full durable state, rewritten on every successful save
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    /// When this state was first created
    pub started_at: DateTime<Utc>,
    /// Most recent cycles, oldest first, capped by the store
    pub cycles: Vec<CycleRecord>,
    /// Lifetime count of successful action runs
    pub total_improvements: u64,
    /// Timestamp of the last save
    pub last_update: DateTime<Utc>,
    /// Running per-action and per-phase statistics
    pub metrics: Metrics,
}

impl PersistedState {
    /// Create a fresh state starting now
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            cycles: Vec::new(),
            total_improvements: 0,
            last_update: now,
            metrics: Metrics::default(),
        }
    }

    /// Sequence number for the next cycle
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.cycles.last().map_or(1, |c| c.sequence + 1)
    }

    /// The most recent `count` cycles, oldest first
    #[must_use]
    pub fn recent_cycles(&self, count: usize) -> &[CycleRecord] {
        let start = self.cycles.len().saturating_sub(count);
        &self.cycles[start..]
    }
}

/// Secondary bounded storage for cycles evicted from the active window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveFile {
    /// Archived cycles, oldest first
    pub cycles: Vec<CycleRecord>,
}
