//! Cycle execution
//!
//! The scheduling loop, phase executor, and the gates consulted before
//! each action invocation.

pub mod health;
pub mod phase;
pub mod scheduler;
pub mod skip;

pub use health::HealthMonitor;
pub use phase::{adaptive_timeout, PhaseExecutor, PhaseOutcome, Skip, SkipReason};
pub use scheduler::CycleScheduler;
pub use skip::should_skip;
