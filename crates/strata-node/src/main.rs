//! Strata Node - block assembly and mining on an in-process chain.
//!
//! This is the main entry point for the strata-node binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod chain;
mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// Strata node with a built-in CPU miner.
#[derive(Parser, Debug)]
#[command(name = "strata-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "strata-node.toml")]
    config: PathBuf,

    /// Data directory (receives the effective configuration)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Network (main, test, regtest)
    #[arg(short, long, default_value = "regtest")]
    network: String,

    /// Mine continuously
    #[arg(long)]
    mining: bool,

    /// Search threads (-1 = network default, 0 = disabled)
    #[arg(long, allow_negative_numbers = true)]
    mining_threads: Option<i32>,

    /// Hex payout script for mined blocks
    #[arg(long)]
    payout_script: Option<String>,

    /// Generate this many blocks at start-up
    #[arg(long)]
    generate: Option<usize>,

    /// Log priority and feerate of every transaction added to a template
    #[arg(long)]
    print_priority: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Strata Node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;

    info!("Network: {}", config.network);
    let effective = config.write_effective()?;
    info!("Data directory: {:?}", config.data_dir);
    info!("Effective configuration written to {:?}", effective);

    let node = Node::new(config)?;

    let node_handle = node.clone();
    let shutdown_signal = async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        node_handle.shutdown().await;
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!("Node error: {}", e);
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown complete");
        }
    }

    node.coordinator().stop_mining();
    info!("Strata node stopped");
    Ok(())
}
