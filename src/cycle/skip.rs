//! Failure-based skip heuristic
//!
//! Withholds invocation of a chronically failing action for the current
//! cycle. The window slides: once enough recent cycles no longer show the
//! failure, the action is attempted again.

use crate::state::model::CycleRecord;

/// Whether `action` should be skipped this cycle.
///
/// Counts the completed cycles among the most recent `window` in which the
/// action failed; at `threshold` or more, the action sits this cycle out.
#[must_use]
pub fn should_skip(
    action: &str,
    recent: &[CycleRecord],
    window: usize,
    threshold: usize,
) -> bool {
    let start = recent.len().saturating_sub(window);
    let failures = recent[start..].iter().filter(|c| c.failed(action)).count();
    failures >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::{CycleRecord, ErrorRecord};
    use chrono::Utc;

    const WINDOW: usize = 5;
    const THRESHOLD: usize = 3;

    fn cycle(sequence: u64, failing: &[&str]) -> CycleRecord {
        CycleRecord {
            sequence,
            started_at: Utc::now(),
            results: vec![],
            errors: failing
                .iter()
                .map(|name| ErrorRecord {
                    action: (*name).to_string(),
                    message: "boom".to_string(),
                    phase: "content".to_string(),
                    attempts: 3,
                })
                .collect(),
            duration_ms: 10,
        }
    }

    #[test]
    fn test_three_failures_in_window_skip() {
        let recent = vec![
            cycle(1, &["a"]),
            cycle(2, &[]),
            cycle(3, &["a"]),
            cycle(4, &["a"]),
            cycle(5, &[]),
        ];
        assert!(should_skip("a", &recent, WINDOW, THRESHOLD));
    }

    #[test]
    fn test_two_failures_do_not_skip() {
        let recent = vec![
            cycle(1, &["a"]),
            cycle(2, &[]),
            cycle(3, &["a"]),
            cycle(4, &[]),
            cycle(5, &[]),
        ];
        assert!(!should_skip("a", &recent, WINDOW, THRESHOLD));
    }

    #[test]
    fn test_old_failures_slide_out_of_window() {
        // Three failures, but the first two fall outside the last five cycles
        let recent = vec![
            cycle(1, &["a"]),
            cycle(2, &["a"]),
            cycle(3, &[]),
            cycle(4, &["a"]),
            cycle(5, &[]),
            cycle(6, &[]),
            cycle(7, &[]),
        ];
        assert!(!should_skip("a", &recent, WINDOW, THRESHOLD));
    }

    #[test]
    fn test_short_history_can_still_trigger() {
        let recent = vec![cycle(1, &["a"]), cycle(2, &["a"]), cycle(3, &["a"])];
        assert!(should_skip("a", &recent, WINDOW, THRESHOLD));
    }

    #[test]
    fn test_empty_history_never_skips() {
        assert!(!should_skip("a", &[], WINDOW, THRESHOLD));
    }

    #[test]
    fn test_failures_of_other_actions_do_not_count() {
        let recent = vec![
            cycle(1, &["b"]),
            cycle(2, &["b"]),
            cycle(3, &["b"]),
            cycle(4, &["b"]),
            cycle(5, &["b"]),
        ];
        assert!(!should_skip("a", &recent, WINDOW, THRESHOLD));
        assert!(should_skip("b", &recent, WINDOW, THRESHOLD));
    }
}
