//! Pre-flight health checks
//!
//! Read-only checks run before each action invocation. A failed check
//! skips the action for this cycle without touching metrics; the action
//! is tried again next cycle.

use std::path::PathBuf;

use crate::action::registry::Action;

/// Verifies an action's filesystem preconditions
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    base_dir: PathBuf,
}

impl HealthMonitor {
    /// Create a monitor rooted at the scheduler's base directory
    #[must_use]
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Whether `action` may be attempted this cycle.
    ///
    /// The base directory must exist, and an action declaring a required
    /// file is gated on that file's presence (resolved against the base
    /// directory unless absolute).
    #[must_use]
    pub fn check(&self, action: &Action) -> bool {
        if !self.base_dir.is_dir() {
            return false;
        }
        match &action.requires_file {
            Some(required) => self.base_dir.join(required).exists(),
            None => true,
        }
    }
}
