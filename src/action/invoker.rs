//! Action invocation with timeout and retry
//!
//! Runs one registered action to completion or until its timeout elapses;
//! a timeout counts as a failed attempt. Failed attempts are retried with
//! exponential backoff up to the policy's limit, and the terminal outcome
//! carries the attempt count either way.

use std::time::Duration;

use tokio::time::Instant;

use crate::action::registry::Action;
use crate::state::model::{ActionResult, ActionStatus, ErrorRecord};

/// Retry limits for action invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt (2 means 3 attempts total)
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Total attempts allowed, counting the first
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Backoff before the attempt following `attempt`: `base * 2^(attempt-1)`
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Terminal outcome of invoking one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The action succeeded on some attempt
    Completed(ActionResult),
    /// Every attempt failed or timed out
    Failed(ErrorRecord),
}

/// Invoke `action` within `phase`, retrying per `policy`.
///
/// The duration reported on success is the wall clock of the successful
/// attempt alone; failed attempts contribute nothing to duration metrics.
pub async fn invoke(
    action: &Action,
    phase: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Invocation {
    let attempts_allowed = policy.total_attempts();
    let mut last_error = String::new();

    for attempt in 1..=attempts_allowed {
        let started = Instant::now();
        match tokio::time::timeout(timeout, action.run()).await {
            Ok(Ok(())) => {
                return Invocation::Completed(ActionResult {
                    action: action.name.clone(),
                    status: ActionStatus::Success,
                    duration_ms: millis(started.elapsed()),
                    phase: phase.to_string(),
                    attempts: attempt,
                });
            }
            Ok(Err(e)) => last_error = format!("{e:#}"),
            Err(_) => last_error = format!("timed out after {}ms", timeout.as_millis()),
        }

        if attempt < attempts_allowed {
            tokio::time::sleep(backoff_delay(policy.base_delay, attempt)).await;
        }
    }

    Invocation::Failed(ErrorRecord {
        action: action.name.clone(),
        message: last_error,
        phase: phase.to_string(),
        attempts: attempts_allowed,
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
