//! Loop and archive packets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LoopDataError, Result};
use crate::units::UnitSystem;
use crate::window::{Polar, Sample};

/// The composite vector observation built from speed and gust readings
pub const WIND: &str = "wind";
pub const WIND_SPEED: &str = "windSpeed";
pub const WIND_DIR: &str = "windDir";
pub const WIND_GUST: &str = "windGust";
pub const WIND_GUST_DIR: &str = "windGustDir";

/// Whether an observation carries direction as well as magnitude
pub fn is_vector_observation(observation: &str) -> bool {
    observation == WIND
}

/// What a packet represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    /// A new live sample
    #[default]
    Loop,
    /// End-of-period record; only feeds trend windows
    Archive,
}

/// One timestamped set of readings
///
/// `observations` keeps readings that were sent as `null` apart from ones
/// that were not sent at all, although both count as "no value".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "dateTime")]
    pub date_time: i64,
    #[serde(rename = "usUnits")]
    pub us_units: UnitSystem,
    #[serde(rename = "event", default)]
    pub kind: PacketKind,
    #[serde(flatten)]
    pub observations: BTreeMap<String, Option<f64>>,
}

impl Packet {
    pub fn new(date_time: i64, us_units: UnitSystem) -> Self {
        Self {
            date_time,
            us_units,
            kind: PacketKind::Loop,
            observations: BTreeMap::new(),
        }
    }

    /// Reject packets whose `dateTime` no calendar can place
    pub fn validate(&self) -> Result<()> {
        if chrono::DateTime::from_timestamp(self.date_time, 0).is_none() {
            return Err(LoopDataError::Packet(format!(
                "dateTime {} is out of range",
                self.date_time
            )));
        }
        Ok(())
    }

    /// Builder-style setter used when assembling packets in code
    pub fn with(mut self, observation: &str, value: f64) -> Self {
        self.set(observation, Some(value));
        self
    }

    pub fn with_kind(mut self, kind: PacketKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn set(&mut self, observation: &str, value: Option<f64>) {
        self.observations.insert(observation.to_string(), value);
    }

    /// Reading of `observation`, `None` when absent or null
    pub fn value(&self, observation: &str) -> Option<f64> {
        self.observations.get(observation).copied().flatten()
    }

    /// Observations present with an explicit `null`
    pub fn nulls(&self) -> impl Iterator<Item = &str> {
        self.observations
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }

    /// What this packet contributes to `observation`
    pub fn sample(&self, observation: &str) -> Option<Sample> {
        if is_vector_observation(observation) {
            let speed = self
                .value(WIND_SPEED)
                .map(|s| Polar::new(s, self.value(WIND_DIR)));
            let gust = self
                .value(WIND_GUST)
                .map(|g| Polar::new(g, self.value(WIND_GUST_DIR)));
            if speed.is_none() && gust.is_none() {
                return None;
            }
            return Some(Sample::Wind { speed, gust });
        }
        self.value(observation).map(Sample::Scalar)
    }

    /// Keep only `observations` (and the wind inputs when `wind` is listed)
    pub fn restrict_to<'a>(&mut self, observations: impl IntoIterator<Item = &'a str>) {
        let mut keep: Vec<&str> = Vec::new();
        for obs in observations {
            if is_vector_observation(obs) {
                keep.extend([WIND_SPEED, WIND_DIR, WIND_GUST, WIND_GUST_DIR]);
            }
            keep.push(obs);
        }
        self.observations.retain(|k, _| keep.contains(&k.as_str()));
    }
}
