//! Engine: turns a packet stream into loop-data records

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{LoopDataError, Result};
use crate::field::{FieldDescriptor, WINDRUN_BUCKET_PREFIX};
use crate::generator::{GeneratorSettings, OutputRecord, RecordGenerator};
use crate::packet::{Packet, PacketKind, WIND_DIR, WIND_SPEED};
use crate::periods::PeriodAccumulatorSet;
use crate::units::UnitFormatter;
use crate::windrun::{WindrunTracker, WINDRUN};
use crate::writer::JsonFileWriter;

/// Parse identifiers, dropping (and logging) the ones that do not parse
pub fn parse_fields(fields: &[String]) -> Vec<FieldDescriptor> {
    fields
        .iter()
        .filter_map(|field| {
            let parsed = FieldDescriptor::parse(field);
            if parsed.is_none() {
                warn!("Ignoring invalid field '{}'", field);
            }
            parsed
        })
        .collect()
}

fn seconds(name: &str, duration: Duration) -> Result<i64> {
    i64::try_from(duration.as_secs())
        .map_err(|_| LoopDataError::Config(format!("{} of {:?} is too long", name, duration)))
}

/// Owns the accumulators and the record generator
#[derive(Debug)]
pub struct LoopDataEngine {
    set: PeriodAccumulatorSet,
    generator: RecordGenerator,
    windrun: Option<WindrunTracker>,
}

impl LoopDataEngine {
    /// Build an engine for the fields requested in `config`
    pub fn new(config: &Config, units: Arc<dyn UnitFormatter>) -> Result<Self> {
        let fields = parse_fields(&config.requested_fields());
        let settings = GeneratorSettings {
            target: config.units.target,
            raw_converted: config.units.raw_converted,
            trend: config.trend_settings()?,
            descriptions: config.trend_descriptions()?,
        };
        let trend_retention = seconds("trend.duration", settings.trend.duration)?;
        let mut set = PeriodAccumulatorSet::new(config.calendar_rules()?, trend_retention);
        for field in &fields {
            set.require(field.kind());
        }

        let wants_windrun = fields.iter().any(|f| {
            let obs = f.observation();
            obs == WINDRUN || obs.starts_with(WINDRUN_BUCKET_PREFIX)
        });
        let windrun = if wants_windrun {
            let max_interval = seconds("windrun.max_interval", config.windrun.max_interval)?;
            Some(WindrunTracker::new(max_interval))
        } else {
            None
        };

        info!(
            "Tracking {} fields over {} periods",
            fields.len(),
            set.slot_count()
        );
        let generator = RecordGenerator::new(fields, units, settings)?;
        Ok(Self {
            set,
            generator,
            windrun,
        })
    }

    pub fn accumulators(&self) -> &PeriodAccumulatorSet {
        &self.set
    }

    pub fn generator(&self) -> &RecordGenerator {
        &self.generator
    }

    /// Observations a historical replay has to supply
    pub fn observations_needed(&self) -> BTreeSet<String> {
        let mut observations = self.set.observations_in_use();
        if self.windrun.is_some() {
            observations.insert(WIND_SPEED.to_string());
            observations.insert(WIND_DIR.to_string());
        }
        observations
    }

    /// Oldest timestamp the accumulators would hold at `now`
    pub fn earliest_needed(&self, now: i64) -> Result<Option<i64>> {
        self.set.earliest_needed(now)
    }

    /// Fold a packet into the accumulators without producing a record
    pub fn ingest(&mut self, mut packet: Packet) -> Result<()> {
        for observation in packet.nulls() {
            debug!("{} is null at {}", observation, packet.date_time);
        }
        packet.validate()?;
        if let Some(tracker) = self.windrun.as_mut() {
            tracker.apply(&mut packet);
        }
        self.set.ingest(&packet)
    }

    /// Ingest a packet and, for loop packets, render the output record
    pub fn process(&mut self, packet: Packet) -> Result<Option<OutputRecord>> {
        let kind = packet.kind;
        self.ingest(packet)?;
        match kind {
            PacketKind::Loop => self.generator.generate(&self.set).map(Some),
            PacketKind::Archive => Ok(None),
        }
    }
}

/// Counters reported when the packet loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub packets: u64,
    pub skipped: u64,
    pub written: u64,
}

/// Read JSON packets line by line, process them and write each record
///
/// Returns at end of input or when `cancel` fires. Bad lines and failed
/// packets are logged and skipped.
pub async fn run_loop<R>(
    engine: &mut LoopDataEngine,
    input: R,
    writer: &JsonFileWriter,
    cancel: CancellationToken,
) -> Result<LoopSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut summary = LoopSummary::default();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Packet loop cancelled");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("End of packet input");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let packet: Packet = match serde_json::from_str(line) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Skipping malformed packet: {}", e);
                summary.skipped += 1;
                continue;
            }
        };
        summary.packets += 1;

        let timestamp = packet.date_time;
        match engine.process(packet) {
            Ok(Some(record)) => match writer.write(&record) {
                Ok(()) => summary.written += 1,
                Err(e) => error!("Failed to write {:?}: {}", writer.path(), e),
            },
            Ok(None) => {}
            Err(e) => error!("Failed to process packet at {}: {}", timestamp, e),
        }
    }

    info!(
        "Processed {} packets, skipped {}, wrote {} records",
        summary.packets, summary.skipped, summary.written
    );
    Ok(summary)
}
