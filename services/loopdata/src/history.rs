//! Historical readings used to seed accumulators at startup

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{LoopDataError, Result};
use crate::packet::Packet;

/// Source of past readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoricalReader: Send + Sync {
    /// Records with `start <= dateTime < end`, oldest first, each restricted
    /// to `observations`
    async fn read_range(
        &self,
        observations: &BTreeSet<String>,
        start: i64,
        end: i64,
    ) -> Result<Vec<Packet>>;
}

/// Archive stored as one JSON packet per line
#[derive(Debug, Clone)]
pub struct JsonLinesArchive {
    path: PathBuf,
}

impl JsonLinesArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoricalReader for JsonLinesArchive {
    async fn read_range(
        &self,
        observations: &BTreeSet<String>,
        start: i64,
        end: i64,
    ) -> Result<Vec<Packet>> {
        debug!("Reading archive {:?} from {} to {}", self.path, start, end);
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LoopDataError::History(format!("Failed to read archive {:?}: {}", self.path, e))
        })?;

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut packet: Packet = match serde_json::from_str(line) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Skipping archive line {}: {}", index + 1, e);
                    continue;
                }
            };
            if packet.date_time < start || packet.date_time >= end {
                continue;
            }
            packet.restrict_to(observations.iter().map(String::as_str));
            records.push(packet);
        }
        records.sort_by_key(|p| p.date_time);
        Ok(records)
    }
}
