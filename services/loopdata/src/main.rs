//! Loopdata CLI
//!
//! Reads JSON packets and keeps a loop-data file of weather statistics.

use std::path::PathBuf;

use clap::Parser;
use loopdata::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "loopdata")]
#[command(about = "Rolling and calendar weather statistics written as a JSON loop-data file")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File of JSON packets, one per line (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON-lines archive used to seed statistics (overrides config file)
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = clap::value_parser!(Level))]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, input={:?}, archive={:?}, log_level={:?}",
        args.config,
        args.input,
        args.archive,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(archive) = args.archive {
        config.seed.archive = Some(archive);
    }

    tracing::info!(
        "Starting loopdata with {} fields and {} renames",
        config.fields.len(),
        config.rename.len()
    );

    loopdata::run(config, args.input).await?;

    Ok(())
}
