use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use concent_core::{LifecycleMachine, MockPaymentBackend, SystemClock};
use concent_crypto::Keypair;
use concent_types::ProtocolTimes;
use concent_storage::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod config;
mod logging;
mod scheduler;

use config::NodeConfig;
use scheduler::DeadlineScheduler;

#[derive(Parser)]
#[command(name = "concent")]
#[command(about = "Concent - arbitration service for a P2P computation marketplace", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the deadline enforcement service
    Start {
        /// Override the deadline sweep interval, seconds
        #[arg(long)]
        poll_interval: Option<u64>,
    },

    /// Write a default configuration file
    Init {
        /// Output path for the configuration
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },

    /// Generate a new service keypair
    Keygen {
        /// Output file for the secret key (hex); stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { poll_interval } => {
            let config = load_config(cli.config.as_deref())?;
            logging::init_logging(&config.logging, cli.verbose)?;
            start(config, poll_interval).await
        }
        Commands::Init { output } => {
            NodeConfig::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
            Ok(())
        }
        Commands::Keygen { output } => keygen(output),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<NodeConfig> {
    match path {
        Some(path) => NodeConfig::load_from_file(path),
        None => Ok(NodeConfig::default()),
    }
}

async fn start(config: NodeConfig, poll_interval: Option<u64>) -> Result<()> {
    info!(
        name = %config.node.name,
        protocol_version = %config.protocol.version,
        "Starting Concent deadline enforcement service"
    );

    let store = Arc::new(MemoryStore::new());
    let payments = Arc::new(MockPaymentBackend::default());
    let clock = Arc::new(SystemClock);
    let times: ProtocolTimes = config.protocol.clone().into();

    // The message pipeline is handed to the embedding transport; this
    // process drives the deadline-only transitions.
    let machine = Arc::new(LifecycleMachine::new(
        store.clone(),
        payments,
        clock.clone(),
        times,
    ));

    let interval = poll_interval.unwrap_or(config.scheduler.poll_interval_secs);
    let scheduler = DeadlineScheduler::new(
        store,
        machine,
        clock,
        Duration::from_secs(interval),
    );

    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    scheduler_handle.abort();

    Ok(())
}

fn keygen(output: Option<PathBuf>) -> Result<()> {
    let keypair = Keypair::generate();
    let secret_hex = hex::encode(keypair.to_bytes());

    match output {
        Some(path) => {
            std::fs::write(&path, &secret_hex)
                .with_context(|| format!("Failed to write key file {}", path.display()))?;
            println!("Secret key written to {}", path.display());
        }
        None => println!("Secret key: {}", secret_hex),
    }
    println!("Public key: {}", keypair.public_key().to_hex());
    Ok(())
}
