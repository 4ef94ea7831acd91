//! Terminal display for cycle execution
//!
//! Renders scheduler progress as human-readable output. Everything goes to
//! stderr so stdout stays clean for piping.

use colored::Colorize;

use crate::state::model::{ActionResult, CycleRecord, ErrorRecord};

/// Display handler for scheduler output
#[derive(Debug, Clone, Default)]
pub struct CycleDisplay;

impl CycleDisplay {
    /// Create a display handler
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Print the header at the start of a cycle
    pub fn cycle_header(&self, sequence: u64) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            format!("Cycle #{sequence}").bold().cyan()
        );
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    /// Print the header for one phase
    pub fn phase_header(&self, name: &str, action_count: usize) {
        eprintln!("  {} {} ({action_count} actions)", "▶".blue(), name.bold());
    }

    /// Print a successful action line
    pub fn action_succeeded(&self, result: &ActionResult) {
        let attempts = if result.attempts > 1 {
            format!(" (attempt {})", result.attempts)
        } else {
            String::new()
        };
        eprintln!(
            "    {} {} {}{}",
            "✓".green().bold(),
            result.action,
            format!("{}ms", result.duration_ms).dimmed(),
            attempts.dimmed()
        );
    }

    /// Print a failed action line with its truncated error
    pub fn action_failed(&self, error: &ErrorRecord) {
        let short: String = error.message.chars().take(100).collect();
        eprintln!(
            "    {} {} after {} attempts: {}",
            "✗".red().bold(),
            error.action,
            error.attempts,
            short.red()
        );
    }

    /// Print a skip notice
    pub fn action_skipped(&self, action: &str, reason: &str) {
        eprintln!("    {} {} {}", "⚠".yellow(), action.dimmed(), reason.dimmed());
    }

    /// Print the post-cycle summary
    pub fn cycle_summary(&self, record: &CycleRecord, skipped: usize, total_improvements: u64) {
        eprintln!("{}", "─".repeat(50).dimmed());

        let status = if record.errors.is_empty() {
            "COMPLETED".green().bold().to_string()
        } else {
            "COMPLETED WITH ERRORS".yellow().bold().to_string()
        };
        let secs = record.duration_ms / 1000;
        eprintln!(
            "  {} cycle #{} | {} ok, {} failed, {} skipped | {}m {}s",
            status,
            record.sequence,
            record.successes(),
            record.failures(),
            skipped,
            secs / 60,
            secs % 60
        );
        eprintln!(
            "  {} {total_improvements} successful runs all-time",
            "Total:".dimmed()
        );
        eprintln!();
    }

    /// Print a notice that a termination signal was intercepted
    pub fn signal_notice(&self) {
        eprintln!(
            "{} termination signal received; persisting state and continuing",
            "⚠".yellow().bold()
        );
    }

    /// Print a critical-error notice for an error that escaped the cycle body
    pub fn critical(&self, message: &str) {
        eprintln!("{} {}", "CRITICAL".red().bold(), message.red());
    }
}
