//! The improvement-cycle loop
//!
//! Drives phases in declared order once per cycle, immediately on startup
//! and then on a fixed interval, forever. Nothing that happens inside a
//! cycle is allowed to take the process down: errors and panics escaping
//! the cycle body are logged, folded into the error-pattern metrics,
//! force-saved, and the loop resumes. Termination signals persist the
//! current state and the loop keeps running; the only way to stop the
//! process is to kill it.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::Utc;
use tokio::time::Instant;

use crate::action::invoker::{Invocation, RetryPolicy};
use crate::action::registry::ActionRegistry;
use crate::cli::display::CycleDisplay;
use crate::context::SchedulerContext;
use crate::cycle::health::HealthMonitor;
use crate::cycle::phase::PhaseExecutor;
use crate::log::journal::{CycleJournal, JournalEntry};
use crate::state::debounce::Debouncer;
use crate::state::model::{CycleRecord, PersistedState};
use crate::state::store::StateStore;

/// Runs the scheduling loop over a fixed context and registry
#[derive(Clone)]
pub struct CycleScheduler {
    ctx: Arc<SchedulerContext>,
    registry: Arc<ActionRegistry>,
    store: Arc<StateStore>,
    journal: CycleJournal,
    display: CycleDisplay,
    state: Arc<Mutex<PersistedState>>,
    saver: Debouncer,
}

impl CycleScheduler {
    /// Create a scheduler, loading any previously persisted state
    pub fn new(
        ctx: Arc<SchedulerContext>,
        registry: Arc<ActionRegistry>,
        store: Arc<StateStore>,
    ) -> Result<Self> {
        let journal = CycleJournal::new(&ctx.state_dir)?;
        let state = Arc::new(Mutex::new(store.load()));
        let saver = StateStore::debounced(&store, ctx.config.global.save_debounce(), &state);

        Ok(Self {
            ctx,
            registry,
            store,
            journal,
            display: CycleDisplay::new(),
            state,
            saver,
        })
    }

    /// Clone of the current in-memory state (startup banner, tests)
    #[must_use]
    pub fn state_snapshot(&self) -> PersistedState {
        self.lock_state().clone()
    }

    /// Run cycles forever, starting immediately.
    ///
    /// Never returns under normal operation.
    pub async fn run_forever(&self) -> Result<()> {
        self.spawn_signal_watcher();
        loop {
            self.run_cycle_guarded().await;
            tokio::time::sleep(self.ctx.config.global.interval()).await;
        }
    }

    /// Run exactly one cycle and persist synchronously before returning
    pub async fn run_once(&self) -> Result<()> {
        self.run_cycle_guarded().await;
        self.store.save_from(&self.state).await
    }

    /// Run one cycle with top-level containment: any error or panic
    /// escaping the cycle body is absorbed and the scheduler stays alive.
    async fn run_cycle_guarded(&self) {
        let scheduler = self.clone();
        let outcome = tokio::spawn(async move { scheduler.run_cycle().await }).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.absorb_critical(&format!("cycle failed: {e:#}")).await,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "cycle panicked".to_string()
                } else {
                    format!("cycle task aborted: {join_error}")
                };
                self.absorb_critical(&message).await;
            }
        }
    }

    /// Record a critical error and force a save, bypassing the debounce
    async fn absorb_critical(&self, message: &str) {
        self.display.critical(message);
        self.lock_state().metrics.note_pattern(message);
        if let Err(e) = self.store.save_from(&self.state).await {
            eprintln!("warning: force save after critical error failed: {e:#}");
        }
    }

    async fn run_cycle(&self) -> Result<()> {
        let global = &self.ctx.config.global;
        let (sequence, recent) = {
            let state = self.lock_state();
            (
                state.next_sequence(),
                state.recent_cycles(global.skip_window).to_vec(),
            )
        };

        self.display.cycle_header(sequence);
        let started_at = Utc::now();
        let clock = Instant::now();

        let health = HealthMonitor::new(&self.ctx.base_dir);
        let policy = RetryPolicy {
            max_retries: global.max_retries,
            base_delay: global.retry_base_delay(),
        };
        let executor = PhaseExecutor::new(
            &self.registry,
            &health,
            policy,
            global.default_timeout(),
            global.skip_window,
            global.skip_failure_threshold,
        );

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut skipped = 0_usize;

        for phase in &self.ctx.config.phases {
            self.display.phase_header(&phase.name, phase.actions.len());
            let metrics_view = self.lock_state().metrics.clone();
            let outcome = executor
                .run_phase(phase, &recent, &metrics_view, &self.display)
                .await;

            skipped += outcome.skipped.len();

            // Apply outcomes in completion order so per-action statistics
            // reflect true temporal history
            let mut state = self.lock_state();
            for invocation in outcome.invocations {
                match invocation {
                    Invocation::Completed(result) => {
                        state.metrics.record_success(&result);
                        results.push(result);
                    }
                    Invocation::Failed(error) => {
                        state.metrics.record_failure(&error);
                        errors.push(error);
                    }
                }
            }
        }

        let record = CycleRecord {
            sequence,
            started_at,
            results,
            errors,
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        if let Err(e) = self
            .journal
            .append(&JournalEntry::from_record(&record, skipped))
        {
            eprintln!("warning: journal append failed: {e:#}");
        }

        let total_improvements = {
            let mut state = self.lock_state();
            state.total_improvements += record.successes() as u64;
            state.cycles.push(record.clone());
            state.total_improvements
        };
        self.display.cycle_summary(&record, skipped, total_improvements);

        self.saver.request();
        Ok(())
    }

    /// Intercept termination signals: persist the current state and keep
    /// running. Stopping the process is left to an external kill.
    fn spawn_signal_watcher(&self) {
        let display = self.display.clone();
        let saver = self.saver.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let Ok(mut interrupt) = signal(SignalKind::interrupt()) else {
                return;
            };
            let Ok(mut terminate) = signal(SignalKind::terminate()) else {
                return;
            };
            loop {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                }
                display.signal_notice();
                saver.request();
            }
        });

        #[cfg(not(unix))]
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                display.signal_notice();
                saver.request();
            }
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
