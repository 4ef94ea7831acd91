//! Durable state
//!
//! Typed records, the lock and debounce primitives, and the store that
//! owns every write to the state directory.

pub mod debounce;
pub mod lock;
pub mod model;
pub mod store;

pub use debounce::Debouncer;
pub use lock::{LockFile, LockGuard};
pub use model::{
    ActionResult, ActionStatus, ArchiveFile, CycleRecord, ErrorRecord, PersistedState,
};
pub use store::{StateStore, ACTIVE_CYCLE_CAP, ARCHIVE_CAP};
