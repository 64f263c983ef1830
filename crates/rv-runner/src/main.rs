//! Revolution macro runner
//!
//! Main entry point: loads the engine config, registers routines, and runs
//! one supervised session per account until interrupted.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rv_config::{ConfigStore, EngineConfig};
use rv_device::{InputBus, RecordingBackend, StaticWindowManager};
use rv_runner::cli::{Cli, Commands};
use rv_runner::routines;
use rv_scheduler::MacroRunner;
use rv_script::RoutineRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let registry = Arc::new(routines::registry().context("registering routines")?);

    match cli.command {
        Commands::Routines => {
            for name in registry.names() {
                let steps = registry.get(name.as_str()).map_or(0, |r| r.steps().len());
                println!("{name:<16} {steps} steps");
            }
        }
        Commands::Check => {
            let config = load_config(&cli.config)?;
            let accounts = config.accounts.len();
            let runner = MacroRunner::new(config, registry, Arc::new(RecordingBackend::new()));
            runner.validate()?;
            println!("{}: ok ({accounts} accounts)", cli.config.display());
        }
        Commands::Run { account, routine } => {
            let config = load_config(&cli.config)?;
            run(config, registry, account, routine).await?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

async fn run(
    config: EngineConfig,
    registry: Arc<RoutineRegistry>,
    account: Option<String>,
    routine: Option<String>,
) -> Result<()> {
    if config.accounts.is_empty() {
        bail!("no accounts configured");
    }

    info!("Starting Revolution");
    let settings = Arc::new(
        ConfigStore::load(config.settings_path()).context("loading settings")?,
    );

    warn!("No platform input backend available, input events are recorded only");
    let (bus, bus_task) = InputBus::spawn(Arc::new(RecordingBackend::new()));

    let runner = MacroRunner::new(config, registry, Arc::new(bus))
        .with_windows(Arc::new(StaticWindowManager::new()))
        .with_settings(settings);
    runner.validate()?;

    let handles = match account {
        Some(name) => vec![runner.start_account(&name)?],
        None => runner.start_all()?,
    };
    if let Some(routine) = routine {
        for handle in &handles {
            handle.redirect(&routine)?;
        }
    }

    info!(sessions = handles.len(), "Revolution is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    for (account, outcome) in runner.stop_all().await {
        info!(%account, ?outcome, "Session finished");
    }
    bus_task.abort();

    Ok(())
}
