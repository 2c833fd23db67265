//! Loopdata - rolling and calendar weather statistics
//!
//! Consumes a stream of weather station packets and keeps sliding windows
//! (`2m`, `10m`, `24h`, ...), calendar periods (hour through all-time) and
//! trend windows up to date. After every loop packet the requested fields
//! are rendered in the configured unit system and written as a JSON file.

pub mod accumulator;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod generator;
pub mod history;
pub mod packet;
pub mod periods;
pub mod seeder;
pub mod trend;
pub mod units;
pub mod window;
pub mod windrun;
pub mod writer;

pub use config::{load_config, Config};
pub use engine::{run_loop, LoopDataEngine, LoopSummary};
pub use error::{LoopDataError, Result};
pub use field::FieldDescriptor;
pub use generator::{FieldValue, OutputRecord};
pub use packet::Packet;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::history::JsonLinesArchive;
use crate::units::{StandardUnits, UnitFormatter};
use crate::writer::JsonFileWriter;

/// Run the loopdata service, reading packets from `input` or stdin
pub async fn run(config: Config, input: Option<PathBuf>) -> Result<LoopSummary> {
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        }
        cancel_for_signal.cancel();
    });

    run_until_cancelled(config, input, cancel).await
}

/// Run the service until end of input or until `cancel` fires
pub async fn run_until_cancelled(
    config: Config,
    input: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<LoopSummary> {
    let units: Arc<dyn UnitFormatter> = Arc::new(StandardUnits::new(
        &config.units.group_overrides,
        &config.units.time_format,
        config.calendar.timezone,
    )?);
    let mut engine = LoopDataEngine::new(&config, units)?;

    if let Some(archive) = &config.seed.archive {
        let reader = JsonLinesArchive::new(archive);
        let now = chrono::Utc::now().timestamp();
        seeder::seed(&mut engine, &reader, now).await?;
    }

    let writer = JsonFileWriter::new(
        &config.file.directory,
        &config.file.filename,
        &config.fields,
        &config.rename,
    )?;
    info!("Writing loop data to {:?}", writer.path());

    match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await.map_err(|e| {
                LoopDataError::Config(format!("Failed to open input {:?}: {}", path, e))
            })?;
            run_loop(&mut engine, BufReader::new(file), &writer, cancel).await
        }
        None => run_loop(&mut engine, BufReader::new(tokio::io::stdin()), &writer, cancel).await,
    }
}
