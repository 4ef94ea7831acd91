//! Phase execution
//!
//! Runs one phase's actions strictly in declared order. Each action passes
//! a health gate and a skip gate, gets a timeout adapted from its own
//! history, and is invoked with retries. A failing action never aborts the
//! phase; the executor proceeds to the next action regardless.

use std::time::Duration;

use crate::action::invoker::{invoke, Invocation, RetryPolicy};
use crate::action::registry::ActionRegistry;
use crate::cli::display::CycleDisplay;
use crate::config::PhaseConfig;
use crate::cycle::health::HealthMonitor;
use crate::cycle::skip::should_skip;
use crate::metrics::Metrics;
use crate::state::model::CycleRecord;

/// Why an action was withheld this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A filesystem precondition is not met
    Precondition,
    /// The action failed in too many recent cycles
    RecentFailures,
}

/// An action withheld from invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    /// Name of the withheld action
    pub action: String,
    /// Why it was withheld
    pub reason: SkipReason,
}

/// Everything that happened while running one phase
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    /// Terminal invocation outcomes, in completion order
    pub invocations: Vec<Invocation>,
    /// Actions withheld this cycle
    pub skipped: Vec<Skip>,
}

/// Timeout for an action, adapted from its historical average.
///
/// Twice the average successful duration, clamped to half and three times
/// the configured default. With no history the default applies unchanged.
#[must_use]
pub fn adaptive_timeout(average: Option<Duration>, default: Duration) -> Duration {
    average.map_or(default, |avg| {
        avg.saturating_mul(2).clamp(default / 2, default.saturating_mul(3))
    })
}

/// Executes phases against the registry with shared gates and policy
#[derive(Debug)]
pub struct PhaseExecutor<'a> {
    registry: &'a ActionRegistry,
    health: &'a HealthMonitor,
    policy: RetryPolicy,
    default_timeout: Duration,
    skip_window: usize,
    skip_threshold: usize,
}

impl<'a> PhaseExecutor<'a> {
    /// Create an executor over the given registry and health monitor
    #[must_use]
    pub const fn new(
        registry: &'a ActionRegistry,
        health: &'a HealthMonitor,
        policy: RetryPolicy,
        default_timeout: Duration,
        skip_window: usize,
        skip_threshold: usize,
    ) -> Self {
        Self {
            registry,
            health,
            policy,
            default_timeout,
            skip_window,
            skip_threshold,
        }
    }

    /// Run every action of `phase` in order.
    ///
    /// `recent` is the completed-cycle history consulted by the skip
    /// heuristic; `metrics` supplies historical averages for the adaptive
    /// timeout. Outcomes are returned rather than recorded here so the
    /// caller applies them to metrics in completion order.
    pub async fn run_phase(
        &self,
        phase: &PhaseConfig,
        recent: &[CycleRecord],
        metrics: &Metrics,
        display: &CycleDisplay,
    ) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::default();

        for action_config in &phase.actions {
            let Some(action) = self.registry.get(&action_config.name) else {
                // Config validation keeps registry and phases in sync, so
                // this only happens with a hand-built registry
                continue;
            };

            if !self.health.check(action) {
                display.action_skipped(&action.name, "precondition not met");
                outcome.skipped.push(Skip {
                    action: action.name.clone(),
                    reason: SkipReason::Precondition,
                });
                continue;
            }

            if should_skip(&action.name, recent, self.skip_window, self.skip_threshold) {
                display.action_skipped(&action.name, "failing in recent cycles");
                outcome.skipped.push(Skip {
                    action: action.name.clone(),
                    reason: SkipReason::RecentFailures,
                });
                continue;
            }

            let timeout = action.timeout.unwrap_or_else(|| {
                adaptive_timeout(metrics.average_duration(&action.name), self.default_timeout)
            });

            let invocation = invoke(action, &phase.name, timeout, &self.policy).await;
            match &invocation {
                Invocation::Completed(result) => display.action_succeeded(result),
                Invocation::Failed(error) => display.action_failed(error),
            }
            outcome.invocations.push(invocation);
        }

        outcome
    }
}
