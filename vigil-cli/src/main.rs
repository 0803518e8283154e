//! Vigil CLI
//!
//! Command-line entry point for the vigil DNS resolver.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_dns::{Config, Server};

/// Vigil - local DNS resolver and ad/tracker blocker
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "vigil.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the resolver (the default when no subcommand is given)
    Run,

    /// Generate a sample configuration file
    GenConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "vigil.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Some(Commands::GenConfig { output }) => generate_config(output),
        Some(Commands::Run) | None => run(cli.config).await,
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {:?}", config_path))?;
    info!("configuration loaded from {:?}", config_path);

    let mut server = Server::new();
    server.start(&config).await.context("failed to start server")?;

    // The supervisor's signal handler turns SIGINT/SIGTERM into shutdown;
    // wait here until the hierarchy has drained.
    server.wait().await;
    info!("server stopped");

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<()> {
    std::fs::write(&output, Config::sample())
        .with_context(|| format!("failed to write configuration to {:?}", output))?;

    println!("Sample configuration written to {:?}", output);
    println!("\nEdit the configuration file before pointing your system resolver at it.");

    Ok(())
}
