//! Durable state persistence
//!
//! Owns every byte that reaches the state directory: the active state
//! snapshot (full replace via temp file + rename), the bounded cycle
//! archive, and the lock marker. Saves are serialized twice over: an
//! in-process mutex keeps a forced save from interleaving with a debounced
//! one, and the lock file keeps other processes out.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::context::SchedulerContext;
use crate::state::debounce::Debouncer;
use crate::state::lock::LockFile;
use crate::state::model::{ArchiveFile, CycleRecord, PersistedState};

/// Cycles retained in the active state after a save
pub const ACTIVE_CYCLE_CAP: usize = 50;

/// Cycles retained in the archive; the oldest are dropped beyond this
pub const ARCHIVE_CAP: usize = 1000;

/// Lock-protected persistence for [`PersistedState`]
pub struct StateStore {
    state_path: PathBuf,
    archive_path: PathBuf,
    lock: LockFile,
    lock_timeout: Duration,
    /// Serializes saves within this process; the lock file handles other
    /// processes
    save_serial: tokio::sync::Mutex<()>,
    writes: AtomicU64,
}

impl StateStore {
    /// Create a store rooted at `state_dir`, creating the directory
    pub fn new<P: AsRef<Path>>(
        state_dir: P,
        lock_timeout: Duration,
        lock_stale_after: Duration,
    ) -> Result<Self> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create state directory: {}", state_dir.display()))?;

        Ok(Self {
            state_path: state_dir.join("state.json"),
            archive_path: state_dir.join("archive.json"),
            lock: LockFile::new(state_dir.join("state.lock"), lock_stale_after),
            lock_timeout,
            save_serial: tokio::sync::Mutex::new(()),
            writes: AtomicU64::new(0),
        })
    }

    /// Create a store from the scheduler context
    pub fn from_context(ctx: &SchedulerContext) -> Result<Self> {
        Self::new(
            &ctx.state_dir,
            ctx.config.global.lock_timeout(),
            ctx.config.global.lock_stale_after(),
        )
    }

    /// Load the persisted state.
    ///
    /// A missing file is the normal first boot and yields a fresh state.
    /// An unreadable or corrupt file is logged and replaced with a fresh
    /// state rather than keeping the process down.
    #[must_use]
    pub fn load(&self) -> PersistedState {
        match fs::read_to_string(&self.state_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    eprintln!(
                        "warning: corrupt state file {}, starting fresh: {e}",
                        self.state_path.display()
                    );
                    PersistedState::new(Utc::now())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => PersistedState::new(Utc::now()),
            Err(e) => {
                eprintln!(
                    "warning: unreadable state file {}, starting fresh: {e}",
                    self.state_path.display()
                );
                PersistedState::new(Utc::now())
            }
        }
    }

    /// Load the archive, or an empty one if missing/corrupt
    #[must_use]
    pub fn load_archive(&self) -> ArchiveFile {
        match fs::read_to_string(&self.archive_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                eprintln!(
                    "warning: corrupt archive {}, starting fresh: {e}",
                    self.archive_path.display()
                );
                ArchiveFile::default()
            }),
            Err(_) => ArchiveFile::default(),
        }
    }

    /// Persist the shared state.
    ///
    /// Under the lock: drains cycles beyond [`ACTIVE_CYCLE_CAP`] from the
    /// shared state into the archive, stamps `last_update`, and rewrites
    /// the state file atomically. The lock is released on every exit path
    /// via guard drop. Errors are reported to the caller, which logs and
    /// retries on a later debounce window.
    pub async fn save_from(&self, shared: &Mutex<PersistedState>) -> Result<()> {
        let _serial = self.save_serial.lock().await;
        let _guard = self.lock.acquire(self.lock_timeout).await?;

        let (overflow, snapshot) = {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            let overflow = split_overflow(&mut state.cycles);
            state.last_update = Utc::now();
            (overflow, state.clone())
        };

        if !overflow.is_empty() {
            if let Err(e) = self.append_archive(&overflow) {
                // Put the cycles back so nothing is dropped unarchived;
                // the next save retries the whole sequence.
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                state.cycles.splice(0..0, overflow);
                return Err(e);
            }
        }

        write_json_atomic(&self.state_path, &snapshot)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of completed physical state writes (observability for tests
    /// and the startup banner)
    #[must_use]
    pub fn writes_completed(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Build a debounced trigger around [`Self::save_from`]
    #[must_use]
    pub fn debounced(
        store: &Arc<Self>,
        window: Duration,
        shared: &Arc<Mutex<PersistedState>>,
    ) -> Debouncer {
        let store = Arc::clone(store);
        let shared = Arc::clone(shared);
        Debouncer::new(window, move || {
            let store = Arc::clone(&store);
            let shared = Arc::clone(&shared);
            async move { store.save_from(&shared).await }
        })
    }

    /// Append evicted cycles to the archive, dropping its oldest entries
    /// once the cap is reached
    fn append_archive(&self, overflow: &[CycleRecord]) -> Result<()> {
        let mut archive = self.load_archive();
        archive.cycles.extend_from_slice(overflow);
        if archive.cycles.len() > ARCHIVE_CAP {
            let excess = archive.cycles.len() - ARCHIVE_CAP;
            archive.cycles.drain(..excess);
        }
        write_json_atomic(&self.archive_path, &archive)
    }
}

/// Drain the oldest cycles beyond the active cap, preserving order
fn split_overflow(cycles: &mut Vec<CycleRecord>) -> Vec<CycleRecord> {
    if cycles.len() > ACTIVE_CYCLE_CAP {
        cycles.drain(..cycles.len() - ACTIVE_CYCLE_CAP).collect()
    } else {
        Vec::new()
    }
}

/// Full-replace write: serialize to a sibling temp file, then rename over
/// the target so a crash never leaves a half-written file behind.
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
