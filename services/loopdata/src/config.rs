//! Configuration for the loopdata service

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calendar::{weekday_from_index, CalendarRules, Zone};
use crate::error::{LoopDataError, Result};
use crate::trend::{TrendDescriptions, TrendSettings};
use crate::units::UnitSystem;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub file: FileConfig,
    /// Field identifiers written under their own name
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field identifiers written under a different key
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub windrun: WindrunConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Where the loop-data file is written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            filename: default_filename(),
        }
    }
}

/// Unit system and display options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    #[serde(default = "default_target")]
    pub target: UnitSystem,
    /// Unit group name to unit name, e.g. `group_pressure` -> `hPa`
    #[serde(default)]
    pub group_overrides: BTreeMap<String, String>,
    /// chrono strftime pattern for time values
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default = "default_true")]
    pub raw_converted: bool,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            group_overrides: BTreeMap::new(),
            time_format: default_time_format(),
            raw_converted: true,
        }
    }
}

/// Calendar boundaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// 0 = Monday .. 6 = Sunday
    #[serde(default = "default_week_start")]
    pub week_start: u8,
    /// Month (1..=12) the rain year starts in
    #[serde(default = "default_rain_year_start")]
    pub rain_year_start: u32,
    #[serde(default)]
    pub timezone: Zone,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            week_start: default_week_start(),
            rain_year_start: default_rain_year_start(),
            timezone: Zone::default(),
        }
    }
}

/// Trend window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_trend_duration", with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default = "default_true")]
    pub normalize: bool,
    #[serde(default, with = "humantime_serde")]
    pub min_span: Duration,
    /// Tendency name (`FALLING_SLOWLY`, ...) to display text
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            duration: default_trend_duration(),
            normalize: true,
            min_span: Duration::ZERO,
            descriptions: BTreeMap::new(),
        }
    }
}

/// Wind run derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindrunConfig {
    /// Longer gaps between loop packets contribute no wind run
    #[serde(default = "default_windrun_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

impl Default for WindrunConfig {
    fn default() -> Self {
        Self {
            max_interval: default_windrun_max_interval(),
        }
    }
}

/// Startup seeding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// JSON-lines archive replayed before live packets
    #[serde(default)]
    pub archive: Option<PathBuf>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_filename() -> String {
    "loop-data.txt".to_string()
}

fn default_target() -> UnitSystem {
    UnitSystem::Us
}

fn default_time_format() -> String {
    "%x %X".to_string()
}

fn default_true() -> bool {
    true
}

fn default_week_start() -> u8 {
    6
}

fn default_rain_year_start() -> u32 {
    1
}

fn default_trend_duration() -> Duration {
    Duration::from_secs(3 * 3600)
}

fn default_windrun_max_interval() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    /// Requested identifiers: `fields` first, then renamed ones, without repeats
    pub fn requested_fields(&self) -> Vec<String> {
        let mut requested: Vec<String> = Vec::new();
        for field in self.fields.iter().chain(self.rename.keys()) {
            if !requested.contains(field) {
                requested.push(field.clone());
            }
        }
        requested
    }

    pub fn calendar_rules(&self) -> Result<CalendarRules> {
        let week_start = weekday_from_index(self.calendar.week_start).ok_or_else(|| {
            LoopDataError::Config(format!(
                "week_start must be 0 (Monday) to 6 (Sunday), got {}",
                self.calendar.week_start
            ))
        })?;
        if !(1..=12).contains(&self.calendar.rain_year_start) {
            return Err(LoopDataError::Config(format!(
                "rain_year_start must be a month from 1 to 12, got {}",
                self.calendar.rain_year_start
            )));
        }
        Ok(CalendarRules {
            week_start,
            rain_year_start: self.calendar.rain_year_start,
            zone: self.calendar.timezone,
        })
    }

    pub fn trend_settings(&self) -> Result<TrendSettings> {
        if self.trend.duration.is_zero() {
            return Err(LoopDataError::Config(
                "trend duration must be greater than zero".to_string(),
            ));
        }
        Ok(TrendSettings {
            duration: self.trend.duration,
            normalize: self.trend.normalize,
            min_span: self.trend.min_span,
        })
    }

    pub fn trend_descriptions(&self) -> Result<TrendDescriptions> {
        TrendDescriptions::new(&self.trend.descriptions)
    }

    /// Check every setting that serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        self.calendar_rules()?;
        self.trend_settings()?;
        self.trend_descriptions()?;
        if self.file.filename.is_empty() {
            return Err(LoopDataError::Config("file.filename is empty".to_string()));
        }
        let mut keys: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        for (field, key) in &self.rename {
            if keys.contains(&key.as_str()) {
                return Err(LoopDataError::Config(format!(
                    "rename of {} to {} collides with another output key",
                    field, key
                )));
            }
            keys.push(key);
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LoopDataError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
