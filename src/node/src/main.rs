//! peerscore validator node - main binary

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peerscore_core::{AuthoritativeFetch, StaticOracle};
use peerscore_network::{TcpTransport, TcpTransportConfig};
use peerscore_node::{FileLedger, RoundScheduler, TransportOracle, Validator, ValidatorConfig};
use peerscore_reputation::RocksDbStateStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// peerscore validator CLI
#[derive(Parser)]
#[command(name = "peerscore-node")]
#[command(about = "Reputation-weighted validator for untrusted data peers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/validator.toml", env = "PEERSCORE_CONFIG")]
    config: PathBuf,

    /// Data directory (overrides config)
    #[arg(long, env = "PEERSCORE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate the configuration, then exit
    CheckConfig,

    /// Show node version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("peerscore-node v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = ValidatorConfig::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = data_dir;
    }

    let log_level = if cli.verbose { "debug" } else { config.node.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},peerscore_node=debug", log_level).into()),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    config.validate()?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Some(Command::CheckConfig) = cli.command {
        println!("Configuration OK");
        return Ok(());
    }

    info!("Starting peerscore validator v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let state_store = Arc::new(
        RocksDbStateStore::open(config.state_path()).context("Failed to open state store")?,
    );
    let transport = Arc::new(TcpTransport::new(TcpTransportConfig {
        max_reply_bytes: config.network.max_reply_bytes,
    }));
    let ledger = Arc::new(FileLedger::new(
        config.peers_file(),
        config.weights_file(),
        Duration::from_millis(config.ledger.block_time_ms),
    ));

    let oracle: Arc<dyn AuthoritativeFetch> = if config.oracle.address.is_empty() {
        warn!("No oracle configured; rounds without a trusted quorum will score zero");
        Arc::new(StaticOracle::new(None))
    } else {
        Arc::new(TransportOracle::new(
            config.oracle.address.clone(),
            config.oracle_timeout(),
            transport.clone(),
        ))
    };

    let validator = Arc::new(Validator::new(config, ledger, transport, oracle, state_store)?);

    let shutdown = CancellationToken::new();
    let scheduler = RoundScheduler::new(validator, shutdown.clone());
    let mut scheduler_task = tokio::spawn(scheduler.run());

    tokio::select! {
        result = &mut scheduler_task => {
            if let Err(e) = result {
                error!("Scheduler failed: {}", e);
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal (SIGTERM)");
        }
    }

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler failed during shutdown: {}", e);
    }

    info!("Validator stopped gracefully");
    Ok(())
}

/// Cross-platform shutdown signal handling
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix systems, only Ctrl+C is supported
    std::future::pending::<()>().await
}
