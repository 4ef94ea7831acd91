//! Exclusive lock marker for state writes
//!
//! A lock is a small JSON file created with exclusive-create semantics and
//! holding the owner's process id and acquisition time. Acquisition polls
//! until a bounded deadline; a leftover lock whose holder cannot still be
//! alive (same pid as ours, unreadable record, or older than the staleness
//! horizon) is reclaimed. Release happens on guard drop, so every save path
//! releases the lock regardless of write outcome.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often acquisition re-checks a held lock
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// On-disk lock record identifying the holder
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Handle for acquiring the state lock
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    stale_after: Duration,
}

/// Held lock; removing the marker on drop releases it
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                eprintln!("warning: failed to release lock {}: {e}", self.path.display());
            }
        }
    }
}

impl LockFile {
    /// Create a handle for the lock at `path`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    /// Acquire the lock, polling until `timeout` elapses.
    ///
    /// Returns an error if another live holder keeps the lock for the whole
    /// window; callers treat that as "defer the save", not as fatal.
    pub async fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.try_create() {
                Ok(()) => {
                    return Ok(LockGuard {
                        path: self.path.clone(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale()? {
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        bail!(
                            "Timed out waiting for state lock: {}",
                            self.path.display()
                        );
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create lock file: {}", self.path.display())
                    })
                }
            }
        }
    }

    /// Attempt the exclusive create and write the holder record
    fn try_create(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).map_err(std::io::Error::other)?;
        file.write_all(json.as_bytes())
    }

    /// Remove the lock if its holder is provably gone.
    ///
    /// A record we cannot parse has no identifiable holder and is treated
    /// as abandoned. A record with our own pid is a leftover from a crashed
    /// run that was given this pid again. Anything older than the staleness
    /// horizon outlived any plausible save.
    ///
    /// Returns `true` if the lock was removed.
    fn reclaim_if_stale(&self) -> Result<bool> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            // Holder released it between our create attempt and this read
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read lock file: {}", self.path.display())
                })
            }
        };

        let stale = match serde_json::from_str::<LockRecord>(&content) {
            Ok(record) => {
                let age = Utc::now().signed_duration_since(record.acquired_at);
                record.pid == std::process::id()
                    || age.to_std().is_ok_and(|age| age > self.stale_after)
            }
            Err(_) => true,
        };

        if stale {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(true),
                // Lost the race to another reclaimer; that is still progress
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
                Err(e) => Err(e).with_context(|| {
                    format!("Failed to remove stale lock: {}", self.path.display())
                }),
            }
        } else {
            Ok(false)
        }
    }
}
