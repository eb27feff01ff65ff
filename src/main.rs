//! Command-line interface for kafka-dump
//!
//! # Usage Examples
//!
//! ## Dump a topic
//! ```bash
//! kafka-dump run \
//!   --brokers localhost:9092 \
//!   --topics orders \
//!   --output-dir ./dump
//! ```
//!
//! ## Dump several topics from the newest offsets
//! ```bash
//! kafka-dump run \
//!   --brokers broker-1:9092,broker-2:9092 \
//!   --topics orders,audit \
//!   --newest
//! ```
//!
//! ## Re-dump everything from scratch
//! ```bash
//! # Clears the output tree and joins under fresh group/client IDs
//! kafka-dump run --brokers localhost:9092 --topics orders --overwrite
//! ```
//!
//! ## Scaffold a config file
//! ```bash
//! kafka-dump init-config
//! kafka-dump run   # picks up ~/.config/kafka-dump/config.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kafka_dump::config::{self, Config, DumpArgs};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "kafka-dump")]
#[command(about = "Dump Kafka topic messages to local files, partitioned by topic, partition, and day")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the consumer group and dump messages until interrupted
    Run {
        #[command(flatten)]
        args: DumpArgs,
    },
    /// Write a starter config file and exit
    InitConfig {
        /// Destination path (defaults to ~/.config/kafka-dump/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => {
            let config = Config::resolve(args)?;
            config.reset_output_dir()?;

            let shutdown = CancellationToken::new();
            let signal_shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                signal_shutdown.cancel();
            });

            let stats = kafka_dump::dump::run(&config, shutdown).await?;
            info!(
                "Dump session finished: {} messages processed, {} consumer errors",
                stats.processed, stats.errors
            );
        }
        Commands::InitConfig { path } => {
            let path = config::init_config_file(path)?;
            info!("Wrote starter config to {}", path.display());
        }
    }

    Ok(())
}

/// Resolves when the process is asked to stop, via SIGINT (Ctrl+C) or
/// SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install interrupt signal handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install terminate signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = interrupt => info!("Received interrupt signal, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
