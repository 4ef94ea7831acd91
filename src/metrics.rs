//! Running execution metrics
//!
//! Per-action and per-phase counters updated as actions complete, plus a
//! coarse frequency table of error-message prefixes for spotting recurring
//! failure classes. The whole structure is serialized inside the persisted
//! state, so it survives restarts.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::model::{ActionResult, ErrorRecord};

/// Error messages are bucketed by their first characters; enough to group
/// recurring failures without storing full texts.
pub const ERROR_PATTERN_PREFIX_CHARS: usize = 50;

/// Lifetime statistics for a single action
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionStats {
    /// Total invocations (successes + failures)
    pub runs: u64,
    /// Successful invocations
    pub successes: u64,
    /// Terminal failures
    pub failures: u64,
    /// Sum of successful-run durations in milliseconds
    pub total_duration_ms: u64,
    /// `total_duration_ms / successes`; zero until the first success
    pub average_duration_ms: u64,
    /// Phases this action has run in. A `BTreeSet` in memory, which
    /// serializes as a sorted list on disk.
    pub phases: BTreeSet<String>,
}

/// Lifetime statistics for a single phase
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseStats {
    /// Successful action runs within this phase
    pub successes: u64,
    /// Terminal failures within this phase
    pub failures: u64,
    /// Sum of successful-run durations in milliseconds
    pub total_duration_ms: u64,
}

/// Aggregated execution metrics
///
/// Invariant: `total_runs == total_successes + total_failures`, maintained
/// by the two record paths being the only mutation points.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metrics {
    /// Per-action statistics, keyed by action name
    pub actions: BTreeMap<String, ActionStats>,
    /// Per-phase statistics, keyed by phase name
    pub phases: BTreeMap<String, PhaseStats>,
    /// Frequency of error-message prefixes
    pub error_patterns: BTreeMap<String, u64>,
    /// Total action invocations
    pub total_runs: u64,
    /// Total successful invocations
    pub total_successes: u64,
    /// Total terminal failures
    pub total_failures: u64,
}

impl Metrics {
    /// Record a successful action run
    pub fn record_success(&mut self, result: &ActionResult) {
        let stats = self.actions.entry(result.action.clone()).or_default();
        stats.runs += 1;
        stats.successes += 1;
        stats.total_duration_ms += result.duration_ms;
        stats.average_duration_ms = stats.total_duration_ms / stats.successes;
        stats.phases.insert(result.phase.clone());

        let phase = self.phases.entry(result.phase.clone()).or_default();
        phase.successes += 1;
        phase.total_duration_ms += result.duration_ms;

        self.total_runs += 1;
        self.total_successes += 1;
    }

    /// Record a terminal action failure
    ///
    /// Failed runs carry no duration; only successes feed the averages.
    pub fn record_failure(&mut self, error: &ErrorRecord) {
        let stats = self.actions.entry(error.action.clone()).or_default();
        stats.runs += 1;
        stats.failures += 1;
        stats.phases.insert(error.phase.clone());

        self.phases.entry(error.phase.clone()).or_default().failures += 1;

        self.total_runs += 1;
        self.total_failures += 1;

        self.note_pattern(&error.message);
    }

    /// Count an error-message prefix, without touching run totals.
    ///
    /// Also used directly for critical errors caught outside any action.
    pub fn note_pattern(&mut self, message: &str) {
        let key: String = message.chars().take(ERROR_PATTERN_PREFIX_CHARS).collect();
        *self.error_patterns.entry(key).or_insert(0) += 1;
    }

    /// Historical average duration of an action's successful runs
    #[must_use]
    pub fn average_duration(&self, action: &str) -> Option<Duration> {
        self.actions
            .get(action)
            .filter(|s| s.successes > 0)
            .map(|s| Duration::from_millis(s.average_duration_ms))
    }
}
