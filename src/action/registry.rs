//! Action registry
//!
//! Actions implement a fixed runner interface and are registered once at
//! startup from configuration. The maintenance tools themselves attach
//! only at this seam; nothing is loaded or resolved at call time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ActionConfig, TendConfig};

/// Executable body of an action
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Run the action to completion. `Err` carries the failure message
    /// recorded in metrics.
    async fn run(&self) -> Result<()>;
}

/// Runs a shell command, the standard runner for configured actions
pub struct CommandRunner {
    command: String,
    working_dir: PathBuf,
}

impl CommandRunner {
    /// Create a runner for `command`, executed with `working_dir` as cwd
    #[must_use]
    pub fn new<C: Into<String>, P: Into<PathBuf>>(command: C, working_dir: P) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl ActionRunner for CommandRunner {
    async fn run(&self) -> Result<()> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{}`", self.command))?;

        if output.status.success() {
            Ok(())
        } else {
            bail!("{}", failure_message(&output.status, &output.stderr))
        }
    }
}

/// Condense a failed command's status and stderr into one message
fn failure_message(status: &std::process::ExitStatus, stderr: &[u8]) -> String {
    let last_line = String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string);

    match (last_line, status.code()) {
        (Some(line), _) => line,
        (None, Some(code)) => format!("exited with code {code}"),
        (None, None) => "killed by signal".to_string(),
    }
}

/// A registered action: metadata plus its runner
pub struct Action {
    /// Unique action name
    pub name: String,
    /// File that must exist before the action is attempted
    pub requires_file: Option<PathBuf>,
    /// Fixed timeout override; bypasses the adaptive computation
    pub timeout: Option<Duration>,
    runner: Arc<dyn ActionRunner>,
}

impl Action {
    /// Build an action from its configuration entry
    #[must_use]
    pub fn from_config(config: &ActionConfig, base_dir: &std::path::Path) -> Self {
        Self {
            name: config.name.clone(),
            requires_file: config.requires_file.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
            runner: Arc::new(CommandRunner::new(&config.command, base_dir)),
        }
    }

    /// Build an action around an arbitrary runner (used by tests and any
    /// embedder that provides in-process actions)
    pub fn with_runner<N: Into<String>>(name: N, runner: Arc<dyn ActionRunner>) -> Self {
        Self {
            name: name.into(),
            requires_file: None,
            timeout: None,
            runner,
        }
    }

    /// Run the action body once
    pub async fn run(&self) -> Result<()> {
        self.runner.run().await
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("requires_file", &self.requires_file)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// All actions known to the scheduler, populated once at startup
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Arc<Action>>,
}

impl ActionRegistry {
    /// Build the registry from configuration; every configured action gets
    /// a [`CommandRunner`]
    #[must_use]
    pub fn from_config(config: &TendConfig, base_dir: &std::path::Path) -> Self {
        let mut registry = Self::default();
        for phase in &config.phases {
            for action in &phase.actions {
                registry.register(Action::from_config(action, base_dir));
            }
        }
        registry
    }

    /// Register an action, replacing any existing one of the same name
    pub fn register(&mut self, action: Action) {
        self.actions.insert(action.name.clone(), Arc::new(action));
    }

    /// Look up an action by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.get(name)
    }

    /// Number of registered actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TendConfig {
        TendConfig::parse(
            r#"
[[phase]]
name = "content"

[[phase.action]]
name = "one"
command = "true"

[[phase.action]]
name = "two"
command = "false"
requires_file = "data/index.json"
timeout_ms = 5000

[[phase]]
name = "reports"

[[phase.action]]
name = "three"
command = "echo hi"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_registry_from_config() {
        let registry = ActionRegistry::from_config(&test_config(), std::path::Path::new("."));

        assert_eq!(registry.len(), 3);
        assert!(registry.get("one").is_some());
        assert!(registry.get("three").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_action_metadata_from_config() {
        let registry = ActionRegistry::from_config(&test_config(), std::path::Path::new("."));
        let two = registry.get("two").unwrap();

        assert_eq!(two.requires_file, Some(PathBuf::from("data/index.json")));
        assert_eq!(two.timeout, Some(Duration::from_millis(5000)));

        let one = registry.get("one").unwrap();
        assert_eq!(one.requires_file, None);
        assert_eq!(one.timeout, None);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ActionRegistry::from_config(&test_config(), std::path::Path::new("."));
        struct Nop;
        #[async_trait]
        impl ActionRunner for Nop {
            async fn run(&self) -> Result<()> {
                Ok(())
            }
        }
        registry.register(Action::with_runner("one", Arc::new(Nop)));

        assert_eq!(registry.len(), 3);
        assert!(registry.get("one").unwrap().timeout.is_none());
    }

    #[tokio::test]
    async fn test_command_runner_success() {
        let runner = CommandRunner::new("true", ".");
        assert!(runner.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_command_runner_failure_reports_exit_code() {
        let runner = CommandRunner::new("exit 42", ".");
        let err = runner.run().await.unwrap_err();
        assert!(
            err.to_string().contains("exited with code 42"),
            "Expected exit code in message, got: {err}"
        );
    }

    #[tokio::test]
    async fn test_command_runner_failure_prefers_stderr() {
        let runner = CommandRunner::new("echo 'first'; echo 'disk full' >&2; exit 1", ".");
        let err = runner.run().await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_command_runner_uses_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();

        let runner = CommandRunner::new("test -f marker", dir.path());
        assert!(runner.run().await.is_ok());
    }

    #[test]
    fn test_failure_message_multiline_stderr() {
        let status = std::process::Command::new("false").status().unwrap();
        let msg = failure_message(&status, b"line one\nline two\n\n");
        assert_eq!(msg, "line two");
    }
}
