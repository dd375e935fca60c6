//! taskgridd: the TaskGrid dispatch daemon.
//!
//! Assembles the dispatch engine around file-backed feeds:
//! - config (taskgrid.toml)
//! - host snapshots (JSON, re-read every cycle)
//! - task submissions (JSON, loaded at startup)
//!
//! # Usage
//!
//! ```text
//! taskgridd plan --hosts hosts.json --tasks tasks.json
//! taskgridd run --hosts hosts.json --tasks tasks.json --config taskgrid.toml
//! taskgridd check-config --config taskgrid.toml
//! ```

mod inputs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;

use taskgrid_core::{SystemClock, TaskgridConfig};
use taskgrid_scheduler::{DispatchLoop, DispatchSettings, SpawnQueueManager};

use crate::inputs::{FileHostFeed, read_hosts, read_tasks, submit_all};

/// Used when `RUST_LOG` is unset. Targets are crate names with `_`.
const DEFAULT_LOG_FILTER: &str = "info,taskgridd=debug,taskgrid_core=debug,taskgrid_queue=debug,\
taskgrid_placement=debug,taskgrid_migration=debug,taskgrid_scheduler=debug";

#[derive(Parser)]
#[command(name = "taskgridd", about = "TaskGrid dispatch daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single dispatch cycle and print the resulting plan as JSON.
    Plan {
        /// Host snapshot file (JSON array of host states).
        #[arg(long)]
        hosts: PathBuf,

        /// Task submissions file (JSON array).
        #[arg(long)]
        tasks: PathBuf,

        /// Optional taskgrid.toml.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the dispatch loop until the queue drains or Ctrl-C.
    Run {
        /// Host snapshot file, re-read every cycle.
        #[arg(long)]
        hosts: PathBuf,

        /// Task submissions file (JSON array).
        #[arg(long)]
        tasks: PathBuf,

        /// Optional taskgrid.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print Prometheus metrics to stderr on exit.
        #[arg(long)]
        metrics: bool,
    },

    /// Validate a config file and print the effective settings.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Plan {
            hosts,
            tasks,
            config,
        } => run_plan(&hosts, &tasks, config.as_deref()),
        Command::Run {
            hosts,
            tasks,
            config,
            metrics,
        } => run_daemon(hosts, &tasks, config.as_deref(), metrics).await,
        Command::CheckConfig { config } => {
            let config = TaskgridConfig::from_file(&config)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr; stdout carries plan/placement output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TaskgridConfig> {
    match path {
        Some(path) => {
            let config = TaskgridConfig::from_file(path)?;
            info!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(TaskgridConfig::default()),
    }
}

fn build_manager(config: &TaskgridConfig) -> anyhow::Result<Arc<SpawnQueueManager>> {
    let manager = SpawnQueueManager::from_config(config, Arc::new(SystemClock))?;
    Ok(Arc::new(manager))
}

fn run_plan(hosts: &Path, tasks: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let settings = DispatchSettings::from_config(&config.dispatch)?;
    let manager = build_manager(&config)?;

    let accepted = submit_all(&manager, read_tasks(tasks)?);
    manager.update_availability(&read_hosts(hosts)?);
    info!(accepted, "tasks submitted");

    let placements = manager.run_dispatch_cycle(&settings);
    let plan = serde_json::json!({
        "placements": placements,
        "queue": manager.queue_snapshot(),
        "hosts": manager.tracked_hosts(),
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn run_daemon(
    hosts: PathBuf,
    tasks: &Path,
    config: Option<&Path>,
    print_metrics: bool,
) -> anyhow::Result<()> {
    info!("TaskGrid daemon starting");

    let config = load_config(config)?;
    let settings = DispatchSettings::from_config(&config.dispatch)?;
    let manager = build_manager(&config)?;

    let accepted = submit_all(&manager, read_tasks(tasks)?);
    info!(accepted, "tasks submitted");

    // ── Dispatch loop ──────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (placement_tx, mut placement_rx) = mpsc::channel(256);

    let dispatch = DispatchLoop::new(manager.clone(), settings);
    let feed = FileHostFeed::new(hosts);
    let dispatch_handle = tokio::spawn(async move {
        dispatch.run(feed, placement_tx, shutdown_rx).await;
    });

    // ── Placement sink ─────────────────────────────────────────

    // Keep receiving after shutdown is signalled so placements already
    // decided are still printed; the channel closes when the loop exits.
    let mut stopping = false;
    if manager.total_queued() == 0 {
        let _ = shutdown_tx.send(true);
        stopping = true;
    }

    loop {
        tokio::select! {
            placement = placement_rx.recv() => {
                let Some(placement) = placement else { break };
                println!("{}", serde_json::to_string(&placement)?);
                if !stopping && manager.total_queued() == 0 {
                    info!("queue drained");
                    let _ = shutdown_tx.send(true);
                    stopping = true;
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
                stopping = true;
            }
        }
    }

    let _ = dispatch_handle.await;

    if print_metrics {
        eprint!("{}", manager.render_metrics());
    }

    info!(remaining = manager.total_queued(), "TaskGrid daemon stopped");
    Ok(())
}
