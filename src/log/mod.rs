//! Durable observability
//!
//! Append-only journaling of cycle outcomes, separate from the snapshot
//! state the scheduler persists.

pub mod journal;

pub use journal::{CycleJournal, JournalEntry};
