//! Configuration parser
//!
//! Parses `tend.toml` into structured phase and action definitions.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Global scheduler tuning shared across all phases.
///
/// Every field has a default so a minimal `tend.toml` only needs phases.
/// The cycle interval defaults to 60 seconds; an earlier iteration of this
/// tool documented 150 seconds, so the field stays overridable rather than
/// baked in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Seconds between cycle starts (the first cycle runs immediately)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Baseline per-action timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Retries after a failed attempt (2 means up to 3 attempts total)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// How many recent cycles the skip heuristic examines
    #[serde(default = "default_skip_window")]
    pub skip_window: usize,
    /// Failures within the window that trigger a skip
    #[serde(default = "default_skip_failure_threshold")]
    pub skip_failure_threshold: usize,
    /// Debounce window for state saves, in milliseconds
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// How long to wait for the state lock before deferring a save, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Age after which a leftover lock is considered abandoned, in milliseconds
    #[serde(default = "default_lock_stale_ms")]
    pub lock_stale_ms: u64,
}

const fn default_interval_secs() -> u64 {
    60
}

const fn default_timeout_ms() -> u64 {
    60_000
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_retry_base_delay_ms() -> u64 {
    1_000
}

const fn default_skip_window() -> usize {
    5
}

const fn default_skip_failure_threshold() -> usize {
    3
}

const fn default_save_debounce_ms() -> u64 {
    1_000
}

const fn default_lock_timeout_ms() -> u64 {
    2_000
}

const fn default_lock_stale_ms() -> u64 {
    30_000
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            default_timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            skip_window: default_skip_window(),
            skip_failure_threshold: default_skip_failure_threshold(),
            save_debounce_ms: default_save_debounce_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_stale_ms: default_lock_stale_ms(),
        }
    }
}

/// A single external action within a phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Unique name for this action (across all phases)
    pub name: String,
    /// Shell command to run
    pub command: String,
    /// File that must exist (relative to the base directory) for the
    /// action to be attempted this cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_file: Option<PathBuf>,
    /// Fixed timeout override in milliseconds. When set, the adaptive
    /// timeout computation is bypassed for this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// An ordered group of actions executed together within a cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Unique name for this phase
    pub name: String,
    /// Actions in execution order
    #[serde(default, rename = "action")]
    pub actions: Vec<ActionConfig>,
}

/// Top-level configuration parsed from tend.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TendConfig {
    /// Global scheduler tuning
    #[serde(default)]
    pub global: GlobalConfig,
    /// Phase definitions, in cycle execution order
    #[serde(default, rename = "phase")]
    pub phases: Vec<PhaseConfig>,
}

impl TendConfig {
    /// Parse a tend.toml file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse tend.toml content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse tend.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Find a phase by name
    #[must_use]
    pub fn get_phase(&self, name: &str) -> Option<&PhaseConfig> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Total number of actions across all phases
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.phases.iter().map(|p| p.actions.len()).sum()
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            bail!("Configuration must declare at least one phase");
        }

        // Check for duplicate phase names
        let mut seen_phases = HashSet::new();
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                bail!("Phase name cannot be empty");
            }
            if !seen_phases.insert(&phase.name) {
                bail!("Duplicate phase name: '{}'", phase.name);
            }
            if phase.actions.is_empty() {
                bail!("Phase '{}' has no actions", phase.name);
            }
        }

        // Action names must be unique across the whole config, since
        // metrics and skip history are keyed by action name alone.
        let mut seen_actions = HashSet::new();
        for phase in &self.phases {
            for action in &phase.actions {
                if action.name.trim().is_empty() {
                    bail!("Action name cannot be empty (in phase '{}')", phase.name);
                }
                if action.command.trim().is_empty() {
                    bail!(
                        "Action '{}' has an empty command (in phase '{}')",
                        action.name,
                        phase.name
                    );
                }
                if !seen_actions.insert(&action.name) {
                    bail!("Duplicate action name: '{}'", action.name);
                }
                if let Some(timeout_ms) = action.timeout_ms {
                    if timeout_ms == 0 {
                        bail!("Action '{}' has a zero timeout", action.name);
                    }
                }
            }
        }

        Ok(())
    }
}

impl GlobalConfig {
    /// Interval between cycle starts
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Baseline per-action timeout
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Base delay for exponential backoff
    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Debounce window for state saves
    #[must_use]
    pub const fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Bound on lock acquisition per save attempt
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Age at which an orphaned lock may be reclaimed
    #[must_use]
    pub const fn lock_stale_after(&self) -> Duration {
        Duration::from_millis(self.lock_stale_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
[global]
interval_secs = 120
max_retries = 1

[[phase]]
name = "content"

[[phase.action]]
name = "regenerate-readme"
command = "scripts/readme.sh"

[[phase.action]]
name = "relabel-metadata"
command = "scripts/labels.sh --all"
requires_file = "data/index.json"
timeout_ms = 120000

[[phase]]
name = "reports"

[[phase.action]]
name = "weekly-report"
command = "scripts/report.sh"
"#;

    #[test]
    fn test_parse_valid_config() {
        let config = TendConfig::parse(VALID_CONFIG).unwrap();

        assert_eq!(config.phases.len(), 2);
        assert_eq!(config.global.interval_secs, 120);
        assert_eq!(config.global.max_retries, 1);
        assert_eq!(config.action_count(), 3);
    }

    #[test]
    fn test_parse_action_fields() {
        let config = TendConfig::parse(VALID_CONFIG).unwrap();
        let content = config.get_phase("content").unwrap();

        assert_eq!(content.actions[0].name, "regenerate-readme");
        assert_eq!(content.actions[0].command, "scripts/readme.sh");
        assert_eq!(content.actions[0].requires_file, None);
        assert_eq!(content.actions[0].timeout_ms, None);

        assert_eq!(
            content.actions[1].requires_file,
            Some(PathBuf::from("data/index.json"))
        );
        assert_eq!(content.actions[1].timeout_ms, Some(120_000));
    }

    #[test]
    fn test_phases_keep_declaration_order() {
        let config = TendConfig::parse(VALID_CONFIG).unwrap();
        let names: Vec<&str> = config.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["content", "reports"]);
    }

    #[test]
    fn test_global_defaults() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
command = "true"
"#;
        let config = TendConfig::parse(toml).unwrap();
        assert_eq!(config.global.interval_secs, 60);
        assert_eq!(config.global.default_timeout_ms, 60_000);
        assert_eq!(config.global.max_retries, 2);
        assert_eq!(config.global.retry_base_delay_ms, 1_000);
        assert_eq!(config.global.skip_window, 5);
        assert_eq!(config.global.skip_failure_threshold, 3);
        assert_eq!(config.global.save_debounce_ms, 1_000);
        assert_eq!(config.global.lock_timeout_ms, 2_000);
    }

    #[test]
    fn test_duration_helpers() {
        let global = GlobalConfig::default();
        assert_eq!(global.interval(), Duration::from_secs(60));
        assert_eq!(global.default_timeout(), Duration::from_millis(60_000));
        assert_eq!(global.retry_base_delay(), Duration::from_millis(1_000));
        assert_eq!(global.save_debounce(), Duration::from_millis(1_000));
        assert_eq!(global.lock_timeout(), Duration::from_millis(2_000));
        assert_eq!(global.lock_stale_after(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_get_phase_not_found() {
        let config = TendConfig::parse(VALID_CONFIG).unwrap();
        assert!(config.get_phase("nonexistent").is_none());
    }

    #[test]
    fn test_reject_no_phases() {
        let err = TendConfig::parse("[global]\ninterval_secs = 60\n").unwrap_err();
        assert!(
            err.to_string().contains("at least one phase"),
            "Expected 'at least one phase' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_duplicate_phase_names() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
command = "true"

[[phase]]
name = "content"

[[phase.action]]
name = "two"
command = "true"
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("Duplicate phase name"),
            "Expected 'Duplicate phase name' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_duplicate_action_names_across_phases() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "same"
command = "true"

[[phase]]
name = "reports"

[[phase.action]]
name = "same"
command = "true"
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("Duplicate action name"),
            "Expected 'Duplicate action name' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_empty_phase() {
        let toml = r#"
[[phase]]
name = "content"
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("has no actions"),
            "Expected 'has no actions' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_empty_names() {
        let toml = r#"
[[phase]]
name = ""

[[phase.action]]
name = "one"
command = "true"
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_reject_empty_command() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
command = "  "
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("empty command"),
            "Expected 'empty command' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_zero_timeout() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
command = "true"
timeout_ms = 0
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("zero timeout"),
            "Expected 'zero timeout' error, got: {err}"
        );
    }

    #[test]
    fn test_reject_missing_required_fields() {
        let toml = r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
"#;
        let err = TendConfig::parse(toml).unwrap_err();
        let msg = err.to_string();
        assert!(
            msg.contains("missing field") || msg.contains("Failed to parse"),
            "Expected parse error for missing fields, got: {msg}"
        );
    }

    #[test]
    fn test_reject_invalid_toml() {
        let err = TendConfig::parse("not valid toml {{{").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = TendConfig::from_path("/nonexistent/tend.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_from_path_valid_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tend.toml");
        std::fs::write(&config_path, VALID_CONFIG).unwrap();

        let config = TendConfig::from_path(&config_path).unwrap();
        assert_eq!(config.phases.len(), 2);
    }
}
