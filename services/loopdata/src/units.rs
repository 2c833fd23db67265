//! Unit systems, conversion and display formatting
//!
//! The aggregation engine never converts or formats on its own. Every numeric
//! result goes through a [`UnitFormatter`], which knows the unit group of each
//! observation, how to move a value between unit systems and how to render it.
//! [`StandardUnits`] is the table-driven implementation used by the service.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::calendar::Zone;
use crate::error::{LoopDataError, Result};

/// The 16 compass points, clockwise from north
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Index into [`COMPASS_POINTS`] for a direction in degrees
pub fn compass_index(direction: f64) -> usize {
    let slice = 360.0 / COMPASS_POINTS.len() as f64;
    let index = ((direction + slice / 2.0) / slice).floor() as i64;
    index.rem_euclid(COMPASS_POINTS.len() as i64) as usize
}

/// Unit system a packet is expressed in, or a report is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "UnitSystemRepr", into = "u8")]
pub enum UnitSystem {
    Us,
    Metric,
    MetricWx,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitSystemRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<UnitSystemRepr> for UnitSystem {
    type Error = String;

    fn try_from(repr: UnitSystemRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            UnitSystemRepr::Code(code) => {
                UnitSystem::from_code(code).ok_or_else(|| format!("unknown unit system {}", code))
            }
            UnitSystemRepr::Name(name) => name.parse(),
        }
    }
}

impl From<UnitSystem> for u8 {
    fn from(system: UnitSystem) -> Self {
        system.code()
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(UnitSystem::Us),
            "METRIC" => Ok(UnitSystem::Metric),
            "METRICWX" => Ok(UnitSystem::MetricWx),
            _ => Err(format!("unknown unit system '{}'", s)),
        }
    }
}

impl UnitSystem {
    /// Numeric code carried in the `usUnits` member of a packet
    pub fn code(self) -> u8 {
        match self {
            UnitSystem::Us => 1,
            UnitSystem::Metric => 16,
            UnitSystem::MetricWx => 17,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(UnitSystem::Us),
            16 => Some(UnitSystem::Metric),
            17 => Some(UnitSystem::MetricWx),
            _ => None,
        }
    }

    /// The unit this system uses for a unit group
    pub fn unit_for(self, group: UnitGroup) -> Unit {
        use UnitSystem::*;
        match (group, self) {
            (UnitGroup::Temperature, Us) => Unit::DegreeF,
            (UnitGroup::Temperature, _) => Unit::DegreeC,
            (UnitGroup::Pressure, Us) => Unit::InHg,
            (UnitGroup::Pressure, _) => Unit::Mbar,
            (UnitGroup::Speed, Us) => Unit::MilePerHour,
            (UnitGroup::Speed, Metric) => Unit::KmPerHour,
            (UnitGroup::Speed, MetricWx) => Unit::MeterPerSecond,
            (UnitGroup::Direction, _) => Unit::Degree,
            (UnitGroup::Rain, Us) => Unit::Inch,
            (UnitGroup::Rain, Metric) => Unit::Cm,
            (UnitGroup::Rain, MetricWx) => Unit::Mm,
            (UnitGroup::RainRate, Us) => Unit::InchPerHour,
            (UnitGroup::RainRate, Metric) => Unit::CmPerHour,
            (UnitGroup::RainRate, MetricWx) => Unit::MmPerHour,
            (UnitGroup::Percent, _) => Unit::Percent,
            (UnitGroup::Distance, Us) => Unit::Mile,
            (UnitGroup::Distance, _) => Unit::Km,
            (UnitGroup::Altitude, Us) => Unit::Foot,
            (UnitGroup::Altitude, _) => Unit::Meter,
            (UnitGroup::Radiation, _) => Unit::WattPerMeterSquared,
            (UnitGroup::Uv, _) => Unit::UvIndex,
            (UnitGroup::Count, _) => Unit::Count,
            (UnitGroup::Time, _) => Unit::UnixEpoch,
        }
    }
}

/// Physical quantity shared by a family of units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitGroup {
    Temperature,
    Pressure,
    Speed,
    Direction,
    Rain,
    RainRate,
    Percent,
    Distance,
    Altitude,
    Radiation,
    Uv,
    Count,
    Time,
}

const GROUP_NAMES: [(UnitGroup, &str); 13] = [
    (UnitGroup::Temperature, "group_temperature"),
    (UnitGroup::Pressure, "group_pressure"),
    (UnitGroup::Speed, "group_speed"),
    (UnitGroup::Direction, "group_direction"),
    (UnitGroup::Rain, "group_rain"),
    (UnitGroup::RainRate, "group_rainrate"),
    (UnitGroup::Percent, "group_percent"),
    (UnitGroup::Distance, "group_distance"),
    (UnitGroup::Altitude, "group_altitude"),
    (UnitGroup::Radiation, "group_radiation"),
    (UnitGroup::Uv, "group_uv"),
    (UnitGroup::Count, "group_count"),
    (UnitGroup::Time, "group_time"),
];

impl fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = GROUP_NAMES
            .iter()
            .find(|(group, _)| group == self)
            .map(|(_, name)| *name)
            .unwrap_or("group_unknown");
        f.write_str(name)
    }
}

impl FromStr for UnitGroup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        GROUP_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(group, _)| *group)
            .ok_or_else(|| format!("unknown unit group '{}'", s))
    }
}

/// Concrete unit of measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    DegreeF,
    DegreeC,
    InHg,
    Mbar,
    HPa,
    KPa,
    MmHg,
    MilePerHour,
    KmPerHour,
    MeterPerSecond,
    Knot,
    Degree,
    Inch,
    Mm,
    Cm,
    InchPerHour,
    MmPerHour,
    CmPerHour,
    Percent,
    Mile,
    Km,
    Foot,
    Meter,
    WattPerMeterSquared,
    UvIndex,
    Count,
    UnixEpoch,
}

const UNIT_NAMES: [(Unit, &str); 27] = [
    (Unit::DegreeF, "degree_F"),
    (Unit::DegreeC, "degree_C"),
    (Unit::InHg, "inHg"),
    (Unit::Mbar, "mbar"),
    (Unit::HPa, "hPa"),
    (Unit::KPa, "kPa"),
    (Unit::MmHg, "mmHg"),
    (Unit::MilePerHour, "mile_per_hour"),
    (Unit::KmPerHour, "km_per_hour"),
    (Unit::MeterPerSecond, "meter_per_second"),
    (Unit::Knot, "knot"),
    (Unit::Degree, "degree_compass"),
    (Unit::Inch, "inch"),
    (Unit::Mm, "mm"),
    (Unit::Cm, "cm"),
    (Unit::InchPerHour, "inch_per_hour"),
    (Unit::MmPerHour, "mm_per_hour"),
    (Unit::CmPerHour, "cm_per_hour"),
    (Unit::Percent, "percent"),
    (Unit::Mile, "mile"),
    (Unit::Km, "km"),
    (Unit::Foot, "foot"),
    (Unit::Meter, "meter"),
    (Unit::WattPerMeterSquared, "watt_per_meter_squared"),
    (Unit::UvIndex, "uv_index"),
    (Unit::Count, "count"),
    (Unit::UnixEpoch, "unix_epoch"),
];

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = UNIT_NAMES
            .iter()
            .find(|(unit, _)| unit == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown");
        f.write_str(name)
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        UNIT_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(unit, _)| *unit)
            .ok_or_else(|| format!("unknown unit '{}'", s))
    }
}

impl Unit {
    pub fn group(self) -> UnitGroup {
        use Unit::*;
        match self {
            DegreeF | DegreeC => UnitGroup::Temperature,
            InHg | Mbar | HPa | KPa | MmHg => UnitGroup::Pressure,
            MilePerHour | KmPerHour | MeterPerSecond | Knot => UnitGroup::Speed,
            Degree => UnitGroup::Direction,
            Inch | Mm | Cm => UnitGroup::Rain,
            InchPerHour | MmPerHour | CmPerHour => UnitGroup::RainRate,
            Percent => UnitGroup::Percent,
            Mile | Km => UnitGroup::Distance,
            Foot | Meter => UnitGroup::Altitude,
            WattPerMeterSquared => UnitGroup::Radiation,
            UvIndex => UnitGroup::Uv,
            Count => UnitGroup::Count,
            UnixEpoch => UnitGroup::Time,
        }
    }

    /// Express `value` in the base unit of this unit's group
    ///
    /// Bases: degree C, mbar, km/h, mm, mm/h, km, meter. Other groups have a
    /// single unit and pass through.
    pub fn to_base(self, value: f64) -> f64 {
        use Unit::*;
        match self {
            DegreeF => (value - 32.0) * 5.0 / 9.0,
            InHg => value * 33.863_886_666_7,
            KPa => value * 10.0,
            MmHg => value * 1.333_223_874_15,
            MilePerHour => value * 1.609_344,
            MeterPerSecond => value * 3.6,
            Knot => value * 1.852,
            Inch => value * 25.4,
            Cm => value * 10.0,
            InchPerHour => value * 25.4,
            CmPerHour => value * 10.0,
            Mile => value * 1.609_344,
            Foot => value * 0.3048,
            _ => value,
        }
    }

    /// Inverse of [`Unit::to_base`]
    pub fn from_base(self, value: f64) -> f64 {
        use Unit::*;
        match self {
            DegreeF => value * 9.0 / 5.0 + 32.0,
            InHg => value / 33.863_886_666_7,
            KPa => value / 10.0,
            MmHg => value / 1.333_223_874_15,
            MilePerHour => value / 1.609_344,
            MeterPerSecond => value / 3.6,
            Knot => value / 1.852,
            Inch => value / 25.4,
            Cm => value / 10.0,
            InchPerHour => value / 25.4,
            CmPerHour => value / 10.0,
            Mile => value / 1.609_344,
            Foot => value / 0.3048,
            _ => value,
        }
    }

    fn decimals(self) -> usize {
        use Unit::*;
        match self {
            DegreeF | DegreeC => 1,
            InHg => 3,
            Mbar | HPa | MmHg => 1,
            KPa => 2,
            MilePerHour | KmPerHour | Knot => 0,
            MeterPerSecond => 1,
            Degree => 0,
            Inch | Cm => 2,
            Mm => 1,
            InchPerHour | CmPerHour => 2,
            MmPerHour => 1,
            Percent => 0,
            Mile | Km => 1,
            Foot | Meter => 0,
            WattPerMeterSquared => 0,
            UvIndex => 1,
            Count | UnixEpoch => 0,
        }
    }

    fn label(self) -> &'static str {
        use Unit::*;
        match self {
            DegreeF => "°F",
            DegreeC => "°C",
            InHg => " inHg",
            Mbar => " mbar",
            HPa => " hPa",
            KPa => " kPa",
            MmHg => " mmHg",
            MilePerHour => " mph",
            KmPerHour => " km/h",
            MeterPerSecond => " m/s",
            Knot => " knots",
            Degree => "°",
            Inch => " in",
            Mm => " mm",
            Cm => " cm",
            InchPerHour => " in/h",
            MmPerHour => " mm/h",
            CmPerHour => " cm/h",
            Percent => "%",
            Mile => " miles",
            Km => " km",
            Foot => " feet",
            Meter => " meters",
            WattPerMeterSquared => " W/m²",
            UvIndex | Count | UnixEpoch => "",
        }
    }
}

/// Unit group of a well-known observation name
pub fn default_group(observation: &str) -> Option<UnitGroup> {
    let group = match observation {
        "outTemp" | "inTemp" | "dewpoint" | "inDewpoint" | "heatindex" | "windchill"
        | "appTemp" | "humidex" => UnitGroup::Temperature,
        "barometer" | "pressure" | "altimeter" => UnitGroup::Pressure,
        "wind" | "windSpeed" | "windGust" | "windSpeed10" => UnitGroup::Speed,
        "windDir" | "windGustDir" => UnitGroup::Direction,
        "rain" | "hail" | "ET" => UnitGroup::Rain,
        "rainRate" | "hailRate" => UnitGroup::RainRate,
        "outHumidity" | "inHumidity" | "rxCheckPercent" => UnitGroup::Percent,
        "windrun" => UnitGroup::Distance,
        "cloudbase" | "altitude" => UnitGroup::Altitude,
        "radiation" | "maxSolarRad" => UnitGroup::Radiation,
        "UV" => UnitGroup::Uv,
        "beaufort" | "usUnits" => UnitGroup::Count,
        "dateTime" => UnitGroup::Time,
        other if other.starts_with("windrun_") => UnitGroup::Distance,
        other
            if other.starts_with("extraTemp")
                || other.starts_with("soilTemp")
                || other.starts_with("leafTemp") =>
        {
            UnitGroup::Temperature
        }
        other if other.starts_with("extraHumid") => UnitGroup::Percent,
        _ => return None,
    };
    Some(group)
}

/// A value with the unit it is expressed in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueTuple {
    pub value: Option<f64>,
    pub unit: Unit,
    pub group: UnitGroup,
}

/// Conversion and formatting collaborator used by the record generator
pub trait UnitFormatter: fmt::Debug + Send + Sync {
    /// Unit group an observation belongs to, `None` when unknown
    fn group_of(&self, observation: &str) -> Option<UnitGroup>;

    /// Convert `value` from `from` into the unit `target` uses for `group`.
    ///
    /// An absent value stays absent; the returned unit is still resolved so
    /// labels can be produced for missing readings.
    fn convert(
        &self,
        value: Option<f64>,
        from: Unit,
        group: UnitGroup,
        target: UnitSystem,
    ) -> Result<ValueTuple>;

    /// Number only, using the unit's display precision
    fn format(&self, value: f64, unit: Unit) -> String;

    /// Label appended after a formatted number
    fn label(&self, unit: Unit) -> String;

    /// 16-point compass name for a direction in degrees
    fn ordinal_compass(&self, direction: f64) -> String;

    /// Render an epoch timestamp for display
    fn format_time(&self, timestamp: i64) -> String;
}

/// Table-driven [`UnitFormatter`]
#[derive(Debug, Clone)]
pub struct StandardUnits {
    overrides: BTreeMap<UnitGroup, Unit>,
    time_format: String,
    zone: Zone,
}

impl StandardUnits {
    /// Build a formatter, validating group overrides and the time format
    pub fn new(
        overrides: &BTreeMap<String, String>,
        time_format: &str,
        zone: Zone,
    ) -> Result<Self> {
        let mut resolved = BTreeMap::new();
        for (group_name, unit_name) in overrides {
            let group: UnitGroup = group_name.parse().map_err(LoopDataError::Config)?;
            let unit: Unit = unit_name.parse().map_err(LoopDataError::Config)?;
            if unit.group() != group {
                return Err(LoopDataError::Config(format!(
                    "unit {} does not belong to {}",
                    unit, group
                )));
            }
            resolved.insert(group, unit);
        }

        if StrftimeItems::new(time_format).any(|item| matches!(item, Item::Error)) {
            return Err(LoopDataError::Config(format!(
                "invalid time format '{}'",
                time_format
            )));
        }

        Ok(Self {
            overrides: resolved,
            time_format: time_format.to_string(),
            zone,
        })
    }

    /// Unit a converted value of `group` ends up in for `target`
    pub fn target_unit(&self, group: UnitGroup, target: UnitSystem) -> Unit {
        self.overrides
            .get(&group)
            .copied()
            .unwrap_or_else(|| target.unit_for(group))
    }
}

impl Default for StandardUnits {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            time_format: "%x %X".to_string(),
            zone: Zone::Local,
        }
    }
}

impl UnitFormatter for StandardUnits {
    fn group_of(&self, observation: &str) -> Option<UnitGroup> {
        default_group(observation)
    }

    fn convert(
        &self,
        value: Option<f64>,
        from: Unit,
        group: UnitGroup,
        target: UnitSystem,
    ) -> Result<ValueTuple> {
        if from.group() != group {
            return Err(LoopDataError::Conversion { from, group });
        }
        let unit = self.target_unit(group, target);
        let value = value.map(|v| {
            if unit == from {
                v
            } else {
                unit.from_base(from.to_base(v))
            }
        });
        Ok(ValueTuple { value, unit, group })
    }

    fn format(&self, value: f64, unit: Unit) -> String {
        format!("{:.*}", unit.decimals(), value)
    }

    fn label(&self, unit: Unit) -> String {
        unit.label().to_string()
    }

    fn ordinal_compass(&self, direction: f64) -> String {
        COMPASS_POINTS[compass_index(direction)].to_string()
    }

    fn format_time(&self, timestamp: i64) -> String {
        self.zone
            .format(timestamp, &self.time_format)
            .unwrap_or_else(|| timestamp.to_string())
    }
}
