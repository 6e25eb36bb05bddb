//! waveforge - Main entry point
//!
//! Audio processing pipeline service: accepts uploaded audio, runs a
//! caller-specified stage chain over it on a bounded worker pool, and serves
//! the encoded results over a REST API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waveforge::api::{self, AppContext};
use waveforge::config::Config;
use waveforge::job::JobCoordinator;
use waveforge::stage::StageRegistry;
use waveforge::store::MemoryArtifactStore;

/// Command-line arguments for waveforge
#[derive(Parser, Debug)]
#[command(name = "waveforge")]
#[command(about = "Audio processing pipeline service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "WAVEFORGE_PORT")]
    port: Option<u16>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "WAVEFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Worker pool size
    #[arg(short, long, env = "WAVEFORGE_WORKERS")]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waveforge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration, with command-line overrides on top
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }

    info!(
        "Starting waveforge on port {} with {} workers",
        config.port, config.workers
    );

    let registry = Arc::new(StageRegistry::with_builtins());
    let store = Arc::new(MemoryArtifactStore::new());
    let coordinator = Arc::new(JobCoordinator::new(&config, registry, store));

    let ctx = AppContext {
        coordinator: Arc::clone(&coordinator),
    };

    api::run(config.port, ctx)
        .await
        .context("HTTP server error")?;

    coordinator.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
