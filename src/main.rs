//! Tend - Long-running maintenance loop runner
//!
//! CLI entry point for the scheduler.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use tend::action::registry::ActionRegistry;
use tend::config::TendConfig;
use tend::context::SchedulerContext;
use tend::cycle::scheduler::CycleScheduler;
use tend::state::store::StateStore;

/// Long-running maintenance loop runner
///
/// Executes ordered phases of external maintenance actions on a fixed
/// interval, forever, with retries, adaptive timeouts and durable metrics.
#[derive(Parser, Debug)]
#[command(name = "tend", version, about)]
struct Cli {
    /// Path to the tend.toml configuration file
    #[arg(long, default_value = "tend.toml")]
    config: PathBuf,

    /// Directory for persisted state, archive, lock and journal
    #[arg(long, default_value = ".tend")]
    state_dir: PathBuf,

    /// Directory actions run in; required files resolve against it
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Run a single cycle and exit instead of looping forever
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TendConfig::from_path(&cli.config)
        .with_context(|| format!("Failed to load config from '{}'", cli.config.display()))?;

    let ctx = Arc::new(SchedulerContext::new(config, cli.base_dir, cli.state_dir));
    let registry = Arc::new(ActionRegistry::from_config(&ctx.config, &ctx.base_dir));
    let store = Arc::new(StateStore::from_context(&ctx).context("Failed to open state store")?);
    let scheduler = CycleScheduler::new(Arc::clone(&ctx), registry, store)
        .context("Failed to initialize scheduler")?;

    print_banner(&ctx, &scheduler);

    if cli.once {
        scheduler.run_once().await
    } else {
        scheduler.run_forever().await
    }
}

/// Report what was loaded before the first cycle starts
fn print_banner(ctx: &SchedulerContext, scheduler: &CycleScheduler) {
    let state = scheduler.state_snapshot();
    eprintln!(
        "{} {} phases, {} actions | interval {}s",
        "tend:".bold().cyan(),
        ctx.config.phases.len(),
        ctx.config.action_count(),
        ctx.config.global.interval_secs
    );
    if state.cycles.is_empty() && state.total_improvements == 0 {
        eprintln!("{}", "  starting with fresh state".dimmed());
    } else {
        eprintln!(
            "  {}",
            format!(
                "resuming: {} retained cycles, {} successful runs all-time",
                state.cycles.len(),
                state.total_improvements
            )
            .dimmed()
        );
    }
}
