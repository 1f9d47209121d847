//! Threat Ingest CLI
//!
//! Windowed IMU/PPG upload service for wearable devices.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threat_ingest::{
    config::Config,
    server::{run, ServerConfig},
    store::Store,
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "threat-ingest")]
#[command(version = VERSION)]
#[command(about = "Windowed IMU/PPG upload service for wearable devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest HTTP server
    Serve {
        /// Port to bind to (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Database file path (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show stored window and sample totals
    Status {
        /// Database file path (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, db } => cmd_serve(port, db).await,
        Commands::Status { db } => cmd_status(db),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>, db: Option<PathBuf>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    config.ensure_directories()?;

    let port = port.unwrap_or(config.port);
    let db_path = db.unwrap_or_else(|| config.database_path.clone());

    tracing::info!(
        "Expecting ~{} samples per upload ({}s x {}Hz)",
        config.expected_samples(),
        config.window_sec,
        config.hz
    );

    let (addr, shutdown_tx) = run(ServerConfig::new(port, db_path)).await?;
    println!("Threat ingest server listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    println!("Shutting down");

    Ok(())
}

fn cmd_status(db: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let db_path = db.unwrap_or_else(|| config.database_path.clone());

    if !db_path.exists() {
        println!("No database at {}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path)?;
    println!("Database:  {}", db_path.display());
    println!("Windows:   {}", store.window_count()?);
    println!("Samples:   {}", store.sample_count()?);

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("Config file: {}", Config::config_path().display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
