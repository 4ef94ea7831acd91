//! Scheduler context
//!
//! One explicitly-constructed bundle of configuration and paths, built once
//! in `main` and threaded through every component. Nothing in the crate
//! holds configuration in module-level state.

use std::path::{Path, PathBuf};

use crate::config::TendConfig;

/// Shared, immutable context for a scheduler run
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    /// Parsed configuration
    pub config: TendConfig,
    /// Directory actions run in; health checks resolve required files
    /// against it
    pub base_dir: PathBuf,
    /// Directory holding the state file, archive, lock and journal
    pub state_dir: PathBuf,
}

impl SchedulerContext {
    /// Create a context from parsed configuration and directories
    #[must_use]
    pub fn new<B, S>(config: TendConfig, base_dir: B, state_dir: S) -> Self
    where
        B: Into<PathBuf>,
        S: Into<PathBuf>,
    {
        Self {
            config,
            base_dir: base_dir.into(),
            state_dir: state_dir.into(),
        }
    }

    /// Path of the active state file
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    /// Path of the cycle archive
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.state_dir.join("archive.json")
    }

    /// Path of the exclusive lock marker
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("state.lock")
    }

    /// Base directory for health checks and action working directories
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
