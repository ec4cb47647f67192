use std::path::PathBuf;

use anyhow::{Context, Result};
use bar_cache::{
    config::{Config, load_config_path},
    pipeline::RefreshPipeline,
    providers::build_provider,
    scheduler::Scheduler,
    snapshot::SnapshotStore,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Multi-timeframe OHLCV bar cache")]
struct Cli {
    /// TOML configuration; built-in defaults when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Refresh on every :00/:30 boundary until Ctrl-C.
    Run,
    /// Run a single pass and print the report.
    Refresh,
    /// Only garbage-collect the symbol namespace.
    Prune,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    // 1) Config: a broken file at startup is fatal
    let config = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => Config::default(),
    };
    info!(symbol = %config.symbol, data_dir = %config.data_dir.display(), timeframes = config.timeframes.len(), "configuration loaded");

    match cli.cmd {
        Cmd::Run => {
            let provider = build_provider(config.provider).context("build provider")?;
            let mut scheduler = Scheduler::new(RefreshPipeline::new(provider), config);
            if let Some(path) = cli.config {
                scheduler = scheduler.with_reload(path);
            }
            scheduler
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "cannot listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                    info!("interrupt received, shutting down");
                })
                .await;
        }
        Cmd::Refresh => {
            let provider = build_provider(config.provider).context("build provider")?;
            let report = RefreshPipeline::new(provider).run_once(&config, Utc::now()).await;
            for (timeframe, outcome) in &report.outcomes {
                println!("{:>4}  {outcome}", timeframe.to_string());
            }
            println!("pruned {} file(s)", report.pruned);
        }
        Cmd::Prune => {
            let store = SnapshotStore::new(&config.data_dir);
            let removed = store
                .prune(&config.symbol, &config.tracked(), config.max_versions)
                .context("prune namespace")?;
            println!("pruned {removed} file(s)");
        }
    }

    Ok(())
}
