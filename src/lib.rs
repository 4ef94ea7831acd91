//! Tend - Long-running maintenance loop runner
//!
//! Tend repeatedly executes ordered phases of external maintenance actions
//! with retry, backoff, adaptive timeouts, failure-based skip heuristics,
//! and lock-protected persisted state that survives overlapping saves and
//! abrupt termination.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod action;
pub mod cli;
pub mod config;
pub mod context;
pub mod cycle;
pub mod log;
pub mod metrics;
pub mod state;

// Re-export commonly used types
pub use action::invoker::{invoke, Invocation, RetryPolicy};
pub use action::registry::{Action, ActionRegistry, ActionRunner, CommandRunner};
pub use cli::display::CycleDisplay;
pub use config::{ActionConfig, GlobalConfig, PhaseConfig, TendConfig};
pub use context::SchedulerContext;
pub use cycle::phase::adaptive_timeout;
pub use cycle::scheduler::CycleScheduler;
pub use log::journal::{CycleJournal, JournalEntry};
pub use metrics::Metrics;
pub use state::model::{ActionResult, ActionStatus, CycleRecord, ErrorRecord, PersistedState};
pub use state::store::StateStore;
