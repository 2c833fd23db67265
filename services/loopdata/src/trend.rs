//! Short-term trends and barometric tendency
//!
//! A trend is the change of an observation between the oldest and newest
//! reading of its trend window. For pressure the change is also classified
//! into one of nine tendencies using shipping-forecast breakpoints, which are
//! defined in millibars per three hours.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LoopDataError, Result};
use crate::units::Unit;
use crate::window::ScalarWindow;

const THREE_HOURS: f64 = 10_800.0;

/// Barometric tendency, ordered from rising fastest to falling fastest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarometerTrend {
    RisingVeryRapidly,
    RisingQuickly,
    Rising,
    RisingSlowly,
    Steady,
    FallingSlowly,
    Falling,
    FallingQuickly,
    FallingVeryRapidly,
}

impl BarometerTrend {
    pub const ALL: [BarometerTrend; 9] = [
        BarometerTrend::RisingVeryRapidly,
        BarometerTrend::RisingQuickly,
        BarometerTrend::Rising,
        BarometerTrend::RisingSlowly,
        BarometerTrend::Steady,
        BarometerTrend::FallingSlowly,
        BarometerTrend::Falling,
        BarometerTrend::FallingQuickly,
        BarometerTrend::FallingVeryRapidly,
    ];

    /// Signed severity, 4 for rising very rapidly down to -4
    pub fn code(self) -> i8 {
        match self {
            BarometerTrend::RisingVeryRapidly => 4,
            BarometerTrend::RisingQuickly => 3,
            BarometerTrend::Rising => 2,
            BarometerTrend::RisingSlowly => 1,
            BarometerTrend::Steady => 0,
            BarometerTrend::FallingSlowly => -1,
            BarometerTrend::Falling => -2,
            BarometerTrend::FallingQuickly => -3,
            BarometerTrend::FallingVeryRapidly => -4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BarometerTrend::RisingVeryRapidly => "RISING_VERY_RAPIDLY",
            BarometerTrend::RisingQuickly => "RISING_QUICKLY",
            BarometerTrend::Rising => "RISING",
            BarometerTrend::RisingSlowly => "RISING_SLOWLY",
            BarometerTrend::Steady => "STEADY",
            BarometerTrend::FallingSlowly => "FALLING_SLOWLY",
            BarometerTrend::Falling => "FALLING",
            BarometerTrend::FallingQuickly => "FALLING_QUICKLY",
            BarometerTrend::FallingVeryRapidly => "FALLING_VERY_RAPIDLY",
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            BarometerTrend::RisingVeryRapidly => "Rising Very Rapidly",
            BarometerTrend::RisingQuickly => "Rising Quickly",
            BarometerTrend::Rising => "Rising",
            BarometerTrend::RisingSlowly => "Rising Slowly",
            BarometerTrend::Steady => "Steady",
            BarometerTrend::FallingSlowly => "Falling Slowly",
            BarometerTrend::Falling => "Falling",
            BarometerTrend::FallingQuickly => "Falling Quickly",
            BarometerTrend::FallingVeryRapidly => "Falling Very Rapidly",
        }
    }
}

impl fmt::Display for BarometerTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarometerTrend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BarometerTrend::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown barometer trend '{}'", s))
    }
}

/// Classify a pressure change `delta` (in `unit`) observed over `duration`
///
/// The change is normalized to millibars per three hours before bucketing.
pub fn classify(delta: f64, unit: Unit, duration: Duration) -> BarometerTrend {
    let delta_mbar = unit.to_base(delta) - unit.to_base(0.0);
    let seconds = duration.as_secs_f64();
    let rate = if seconds > 0.0 {
        delta_mbar * (THREE_HOURS / seconds)
    } else {
        delta_mbar
    };
    classify_mbar_per_3h(rate)
}

fn classify_mbar_per_3h(rate: f64) -> BarometerTrend {
    if rate > 6.0 {
        BarometerTrend::RisingVeryRapidly
    } else if rate > 3.5 {
        BarometerTrend::RisingQuickly
    } else if rate > 1.5 {
        BarometerTrend::Rising
    } else if rate >= 0.1 {
        BarometerTrend::RisingSlowly
    } else if rate > -0.1 {
        BarometerTrend::Steady
    } else if rate >= -1.5 {
        BarometerTrend::FallingSlowly
    } else if rate >= -3.5 {
        BarometerTrend::Falling
    } else if rate >= -6.0 {
        BarometerTrend::FallingQuickly
    } else {
        BarometerTrend::FallingVeryRapidly
    }
}

/// Display text for each tendency, with optional per-name replacements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendDescriptions {
    overrides: BTreeMap<BarometerTrend, String>,
}

impl TrendDescriptions {
    /// Resolve overrides keyed by tendency name (`FALLING_SLOWLY`, ...)
    pub fn new(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut resolved = BTreeMap::new();
        for (name, text) in overrides {
            let trend: BarometerTrend = name.parse().map_err(LoopDataError::Config)?;
            resolved.insert(trend, text.clone());
        }
        Ok(Self {
            overrides: resolved,
        })
    }

    pub fn describe(&self, trend: BarometerTrend) -> &str {
        self.overrides
            .get(&trend)
            .map(String::as_str)
            .unwrap_or_else(|| trend.default_description())
    }
}

/// How trend deltas are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendSettings {
    /// Nominal trend duration, also the trend window's retention
    pub duration: Duration,
    /// Project the delta onto `duration` using the elapsed sample time
    pub normalize: bool,
    /// The bounding samples must be strictly further apart than this
    pub min_span: Duration,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(3 * 3600),
            normalize: true,
            min_span: Duration::ZERO,
        }
    }
}

/// Change between the oldest and newest reading of a trend window
///
/// `None` with fewer than two readings or when they are not far enough apart.
pub fn trend_delta(window: &ScalarWindow, settings: &TrendSettings) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let first = window.first()?;
    let last = window.last()?;
    let elapsed = last.timestamp - first.timestamp;
    if elapsed <= 0 || elapsed as f64 <= settings.min_span.as_secs_f64() {
        return None;
    }
    let delta = last.value - first.value;
    if settings.normalize {
        Some(delta * settings.duration.as_secs_f64() / elapsed as f64)
    } else {
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_H: Duration = Duration::from_secs(10_800);

    #[test]
    fn test_classify_mbar_breakpoints() {
        let cases = [
            (9.0, BarometerTrend::RisingVeryRapidly),
            (6.1, BarometerTrend::RisingVeryRapidly),
            (6.0, BarometerTrend::RisingQuickly),
            (3.6, BarometerTrend::RisingQuickly),
            (3.5, BarometerTrend::Rising),
            (1.6, BarometerTrend::Rising),
            (1.5, BarometerTrend::RisingSlowly),
            (0.1, BarometerTrend::RisingSlowly),
            (0.09, BarometerTrend::Steady),
            (0.0, BarometerTrend::Steady),
            (-0.09, BarometerTrend::Steady),
            (-0.1, BarometerTrend::FallingSlowly),
            (-1.5, BarometerTrend::FallingSlowly),
            (-1.6, BarometerTrend::Falling),
            (-3.5, BarometerTrend::Falling),
            (-3.6, BarometerTrend::FallingQuickly),
            (-6.0, BarometerTrend::FallingQuickly),
            (-6.1, BarometerTrend::FallingVeryRapidly),
            (-9.0, BarometerTrend::FallingVeryRapidly),
        ];
        for (delta, expected) in cases {
            assert_eq!(classify(delta, Unit::Mbar, THREE_H), expected, "{}", delta);
        }
    }

    #[test]
    fn test_classify_inhg() {
        assert_eq!(
            classify(0.26577, Unit::InHg, THREE_H),
            BarometerTrend::RisingVeryRapidly
        );
        assert_eq!(
            classify(0.17719, Unit::InHg, THREE_H),
            BarometerTrend::RisingVeryRapidly
        );
        assert_eq!(
            classify(0.177179, Unit::InHg, THREE_H),
            BarometerTrend::RisingQuickly
        );
        assert_eq!(
            classify(0.047248, Unit::InHg, THREE_H),
            BarometerTrend::Rising
        );
        assert_eq!(
            classify(-0.002657698, Unit::InHg, THREE_H),
            BarometerTrend::Steady
        );
        assert_eq!(
            classify(-0.0046224926, Unit::InHg, THREE_H),
            BarometerTrend::FallingSlowly
        );
    }

    #[test]
    fn test_classify_scales_by_duration() {
        // 1 mbar in one hour is 3 mbar in three hours
        assert_eq!(
            classify(1.0, Unit::Mbar, Duration::from_secs(3600)),
            BarometerTrend::Rising
        );
        assert_eq!(
            classify(1.0, Unit::HPa, Duration::from_secs(3600)),
            BarometerTrend::Rising
        );
        assert_eq!(
            classify(-0.1, Unit::KPa, Duration::from_secs(3600)),
            BarometerTrend::Falling
        );
    }

    #[test]
    fn test_codes_and_names() {
        assert_eq!(BarometerTrend::RisingVeryRapidly.code(), 4);
        assert_eq!(BarometerTrend::Steady.code(), 0);
        assert_eq!(BarometerTrend::FallingSlowly.code(), -1);
        assert_eq!(BarometerTrend::FallingVeryRapidly.code(), -4);
        assert_eq!(
            "FALLING_QUICKLY".parse::<BarometerTrend>(),
            Ok(BarometerTrend::FallingQuickly)
        );
        assert!("SIDEWAYS".parse::<BarometerTrend>().is_err());
    }

    #[test]
    fn test_descriptions() {
        let mut overrides = BTreeMap::new();
        overrides.insert("STEADY".to_string(), "Stetig".to_string());
        let descriptions = TrendDescriptions::new(&overrides).unwrap();
        assert_eq!(descriptions.describe(BarometerTrend::Steady), "Stetig");
        assert_eq!(
            descriptions.describe(BarometerTrend::FallingSlowly),
            "Falling Slowly"
        );

        overrides.insert("SIDEWAYS".to_string(), "?".to_string());
        assert!(TrendDescriptions::new(&overrides).is_err());
    }

    #[test]
    fn test_trend_delta_needs_two_samples() {
        let mut window = ScalarWindow::new(10_800);
        assert_eq!(trend_delta(&window, &TrendSettings::default()), None);
        window.ingest(1_000, 30.0);
        assert_eq!(trend_delta(&window, &TrendSettings::default()), None);
    }

    #[test]
    fn test_trend_delta_projection() {
        let mut window = ScalarWindow::new(10_800);
        window.ingest(0, 30.0);
        window.ingest(5_400, 30.1);

        let projected = trend_delta(&window, &TrendSettings::default()).unwrap();
        assert!((projected - 0.2).abs() < 1e-9);

        let raw = TrendSettings {
            normalize: false,
            ..TrendSettings::default()
        };
        assert!((trend_delta(&window, &raw).unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_trend_delta_min_span() {
        let mut window = ScalarWindow::new(10_800);
        window.ingest(0, 30.0);
        window.ingest(60, 30.1);
        let settings = TrendSettings {
            min_span: Duration::from_secs(60),
            ..TrendSettings::default()
        };
        assert_eq!(trend_delta(&window, &settings), None);
        window.ingest(61, 30.2);
        assert!(trend_delta(&window, &settings).is_some());
    }
}
