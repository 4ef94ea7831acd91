//! Append-only cycle journal
//!
//! One JSON line per completed cycle in `journal.jsonl`. The journal is
//! independent of the snapshot state: appends survive a crash even if the
//! debounced state save never ran, so it doubles as a crash-resilient
//! audit trail.

use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::model::CycleRecord;

/// Summary of one completed cycle, as journaled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    /// Cycle sequence number
    pub sequence: u64,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Successful action runs
    pub successes: usize,
    /// Terminal failures
    pub failures: usize,
    /// Actions withheld by health or skip gates
    pub skipped: usize,
    /// Total cycle duration in milliseconds
    pub duration_ms: u64,
}

impl JournalEntry {
    /// Summarize a completed cycle
    #[must_use]
    pub fn from_record(record: &CycleRecord, skipped: usize) -> Self {
        Self {
            sequence: record.sequence,
            started_at: record.started_at,
            successes: record.successes(),
            failures: record.failures(),
            skipped,
            duration_ms: record.duration_ms,
        }
    }
}

/// Append-only journal of cycle summaries
#[derive(Debug, Clone)]
pub struct CycleJournal {
    path: PathBuf,
}

impl CycleJournal {
    /// Create a journal in `dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create journal directory: {}", dir.display()))?;
        Ok(Self {
            path: dir.join("journal.jsonl"),
        })
    }

    /// Append one entry
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let json = serde_json::to_string(entry).context("Failed to serialize journal entry")?;
        writeln!(file, "{json}").context("Failed to write journal entry")?;
        Ok(())
    }

    /// Read all entries in chronological order.
    ///
    /// Unparseable lines (for example a torn write from a hard kill) are
    /// skipped rather than poisoning the whole journal.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read journal: {}", self.path.display()))?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Path of the journal file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(sequence: u64) -> JournalEntry {
        JournalEntry {
            sequence,
            started_at: Utc::now(),
            successes: 3,
            failures: 1,
            skipped: 0,
            duration_ms: 4200,
        }
    }

    #[test]
    fn test_new_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".tend");

        let journal = CycleJournal::new(&dir).unwrap();
        assert!(dir.exists());
        assert_eq!(journal.path(), dir.join("journal.jsonl"));
    }

    #[test]
    fn test_append_and_read_back() {
        let temp = TempDir::new().unwrap();
        let journal = CycleJournal::new(temp.path()).unwrap();

        journal.append(&entry(1)).unwrap();
        journal.append(&entry(2)).unwrap();

        let entries = journal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 1);
        assert_eq!(entries[1].sequence, 2);
    }

    #[test]
    fn test_read_all_missing_file() {
        let temp = TempDir::new().unwrap();
        let journal = CycleJournal::new(temp.path()).unwrap();
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let temp = TempDir::new().unwrap();
        let journal = CycleJournal::new(temp.path()).unwrap();

        journal.append(&entry(1)).unwrap();
        // Simulate a torn write from an abrupt kill
        let mut file = OpenOptions::new()
            .append(true)
            .open(journal.path())
            .unwrap();
        write!(file, "{{\"sequence\": 2, \"started").unwrap();

        let entries = journal.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 1);
    }

    #[test]
    fn test_entry_from_record() {
        use crate::state::model::{ActionResult, ActionStatus, CycleRecord, ErrorRecord};

        let record = CycleRecord {
            sequence: 9,
            started_at: Utc::now(),
            results: vec![ActionResult {
                action: "a".to_string(),
                status: ActionStatus::Success,
                duration_ms: 10,
                phase: "content".to_string(),
                attempts: 1,
            }],
            errors: vec![ErrorRecord {
                action: "b".to_string(),
                message: "boom".to_string(),
                phase: "content".to_string(),
                attempts: 3,
            }],
            duration_ms: 99,
        };

        let entry = JournalEntry::from_record(&record, 2);
        assert_eq!(entry.sequence, 9);
        assert_eq!(entry.successes, 1);
        assert_eq!(entry.failures, 1);
        assert_eq!(entry.skipped, 2);
        assert_eq!(entry.duration_ms, 99);
    }
}
