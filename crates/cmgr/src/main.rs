//! cmgr - Collector Manager agent

use anyhow::{Context, Result};
use clap::Parser;
use collector_manager::collector::ProcessCollector;
use collector_manager::Manager;
use collector_manager_core::config::load_config;
use collector_manager_core::logging;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Collector Manager - remote management agent for a telemetry collector
#[derive(Parser, Debug)]
#[command(name = "cmgr")]
#[command(about = "Remote management agent for a telemetry collector")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", default_value = "./manager.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    info!("Loaded config from: {}", args.config.display());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let code = runtime.block_on(run(config));
    drop(runtime);

    std::process::exit(code);
}

async fn run(config: collector_manager_core::Config) -> i32 {
    let collector = Arc::new(ProcessCollector::new(
        config.collector.binary.clone(),
        config.collector.config_path.clone(),
    ));

    let cancel_token = CancellationToken::new();
    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel_for_signals.cancel();
    });

    let code = Manager::new(config, collector).run(cancel_token).await;
    info!(code, "Collector Manager shutdown complete");
    code
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to create SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received SIGINT (Ctrl+C)");
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT (Ctrl+C)"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    }
}
