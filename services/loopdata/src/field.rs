//! Dotted field identifiers
//!
//! Every output field is requested by a dotted name such as `day.wind.max`,
//! `10m.outTemp.max.raw`, `trend.barometer.desc` or `unit.label.outTemp`.
//! [`FieldDescriptor::parse`] turns such a name into a [`FieldKind`], or
//! returns `None` when the name does not fit the grammar:
//!
//! ```text
//! unit.label.<obs>
//! current.<obs>[.raw|.formatted|.ordinal_compass]
//! trend.<obs>[.raw|.formatted|.code|.desc]
//! <period>.<obs>.<agg>[.raw|.formatted|.ordinal_compass]
//! <period>.<obs>.maxtime|mintime[.raw]
//! ```
//!
//! `<period>` is a sliding window (`2m`, `10m`, `24h`, ...) or a calendar
//! period (`hour`, `day`, `week`, `month`, `year`, `rainyear`, `alltime`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::calendar::CalendarPeriod;
use crate::error::LoopDataError;
use crate::units::COMPASS_POINTS;

static SLIDING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-9]\d*)([mh])$").expect("valid regex"));

/// Prefix of the per-direction wind run observations (`windrun_NNE`, ...)
pub const WINDRUN_BUCKET_PREFIX: &str = "windrun_";

/// Fixed-length window that slides with the newest packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlidingPeriod {
    Minutes(u32),
    Hours(u32),
}

impl SlidingPeriod {
    /// Window length in seconds
    pub fn seconds(self) -> i64 {
        match self {
            SlidingPeriod::Minutes(m) => i64::from(m) * 60,
            SlidingPeriod::Hours(h) => i64::from(h) * 3600,
        }
    }

    fn parse(token: &str) -> Option<Self> {
        let captures = SLIDING_TOKEN.captures(token)?;
        let amount: u32 = captures.get(1)?.as_str().parse().ok()?;
        match captures.get(2)?.as_str() {
            "m" => Some(SlidingPeriod::Minutes(amount)),
            "h" => Some(SlidingPeriod::Hours(amount)),
            _ => None,
        }
    }
}

impl fmt::Display for SlidingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlidingPeriod::Minutes(m) => write!(f, "{}m", m),
            SlidingPeriod::Hours(h) => write!(f, "{}h", h),
        }
    }
}

/// Period an aggregate is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Sliding(SlidingPeriod),
    Calendar(CalendarPeriod),
}

impl Period {
    fn parse(token: &str) -> Option<Self> {
        if let Ok(calendar) = token.parse::<CalendarPeriod>() {
            return Some(Period::Calendar(calendar));
        }
        SlidingPeriod::parse(token).map(Period::Sliding)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Sliding(sliding) => sliding.fmt(f),
            Period::Calendar(calendar) => calendar.fmt(f),
        }
    }
}

/// Aggregate operation over a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Aggregate {
    Avg,
    Max,
    Min,
    Sum,
    Rms,
    VecAvg,
    VecDir,
    GustDir,
    MaxTime,
    MinTime,
}

impl Aggregate {
    pub const ALL: [Aggregate; 10] = [
        Aggregate::Avg,
        Aggregate::Max,
        Aggregate::Min,
        Aggregate::Sum,
        Aggregate::Rms,
        Aggregate::VecAvg,
        Aggregate::VecDir,
        Aggregate::GustDir,
        Aggregate::MaxTime,
        Aggregate::MinTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Avg => "avg",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Sum => "sum",
            Aggregate::Rms => "rms",
            Aggregate::VecAvg => "vecavg",
            Aggregate::VecDir => "vecdir",
            Aggregate::GustDir => "gustdir",
            Aggregate::MaxTime => "maxtime",
            Aggregate::MinTime => "mintime",
        }
    }

    /// Aggregates that only exist for vector observations
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            Aggregate::VecAvg | Aggregate::VecDir | Aggregate::GustDir
        )
    }

    /// Aggregates whose result is a timestamp
    pub fn is_time(self) -> bool {
        matches!(self, Aggregate::MaxTime | Aggregate::MinTime)
    }

    /// Aggregates whose result is a direction rather than the observation's unit
    pub fn is_direction(self) -> bool {
        matches!(self, Aggregate::VecDir | Aggregate::GustDir)
    }
}

impl FromStr for Aggregate {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregate::ALL
            .into_iter()
            .find(|agg| agg.name() == s)
            .ok_or(())
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a field's value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputForm {
    /// Converted, formatted and labeled text (no suffix)
    #[default]
    Labeled,
    Formatted,
    Raw,
    OrdinalCompass,
    Code,
    Desc,
}

impl OutputForm {
    fn suffix(self) -> Option<&'static str> {
        match self {
            OutputForm::Labeled => None,
            OutputForm::Formatted => Some("formatted"),
            OutputForm::Raw => Some("raw"),
            OutputForm::OrdinalCompass => Some("ordinal_compass"),
            OutputForm::Code => Some("code"),
            OutputForm::Desc => Some("desc"),
        }
    }

    fn parse(segments: &[&str], allowed: &[OutputForm]) -> Option<Self> {
        let form = match segments {
            [] => OutputForm::Labeled,
            [suffix] => match *suffix {
                "formatted" => OutputForm::Formatted,
                "raw" => OutputForm::Raw,
                "ordinal_compass" => OutputForm::OrdinalCompass,
                "code" => OutputForm::Code,
                "desc" => OutputForm::Desc,
                _ => return None,
            },
            _ => return None,
        };
        (form == OutputForm::Labeled || allowed.contains(&form)).then_some(form)
    }
}

const CURRENT_FORMS: [OutputForm; 3] = [
    OutputForm::Raw,
    OutputForm::Formatted,
    OutputForm::OrdinalCompass,
];
const TREND_FORMS: [OutputForm; 4] = [
    OutputForm::Raw,
    OutputForm::Formatted,
    OutputForm::Code,
    OutputForm::Desc,
];
const AGGREGATE_FORMS: [OutputForm; 3] = [
    OutputForm::Raw,
    OutputForm::Formatted,
    OutputForm::OrdinalCompass,
];
const TIME_FORMS: [OutputForm; 1] = [OutputForm::Raw];

/// The shapes a field identifier can take
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `unit.label.<obs>`
    UnitLabel { observation: String },
    /// `current.<obs>[.form]`
    Current {
        observation: String,
        form: OutputForm,
    },
    /// `trend.<obs>[.form]`
    Trend {
        observation: String,
        form: OutputForm,
    },
    /// `<period>.<obs>.<agg>[.form]`
    Aggregate {
        period: Period,
        observation: String,
        aggregate: Aggregate,
        form: OutputForm,
    },
}

impl FieldKind {
    pub fn observation(&self) -> &str {
        match self {
            FieldKind::UnitLabel { observation }
            | FieldKind::Current { observation, .. }
            | FieldKind::Trend { observation, .. }
            | FieldKind::Aggregate { observation, .. } => observation,
        }
    }

    pub fn form(&self) -> OutputForm {
        match self {
            FieldKind::UnitLabel { .. } => OutputForm::Labeled,
            FieldKind::Current { form, .. }
            | FieldKind::Trend { form, .. }
            | FieldKind::Aggregate { form, .. } => *form,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::UnitLabel { observation } => write!(f, "unit.label.{}", observation)?,
            FieldKind::Current { observation, .. } => write!(f, "current.{}", observation)?,
            FieldKind::Trend { observation, .. } => write!(f, "trend.{}", observation)?,
            FieldKind::Aggregate {
                period,
                observation,
                aggregate,
                ..
            } => write!(f, "{}.{}.{}", period, observation, aggregate)?,
        }
        match self.form().suffix() {
            Some(suffix) => write!(f, ".{}", suffix),
            None => Ok(()),
        }
    }
}

/// A parsed field identifier together with the name it was requested under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    field: String,
    kind: FieldKind,
}

impl FieldDescriptor {
    /// Parse a dotted identifier; `None` when it does not fit the grammar
    pub fn parse(field: &str) -> Option<Self> {
        let segments: Vec<&str> = field.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        let kind = match segments.as_slice() {
            ["unit", "label", observation] => FieldKind::UnitLabel {
                observation: observation.to_string(),
            },
            ["current", observation, rest @ ..] => FieldKind::Current {
                observation: observation.to_string(),
                form: OutputForm::parse(rest, &CURRENT_FORMS)?,
            },
            ["trend", observation, rest @ ..] => FieldKind::Trend {
                observation: observation.to_string(),
                form: OutputForm::parse(rest, &TREND_FORMS)?,
            },
            [period, observation, aggregate, rest @ ..] => {
                let period = Period::parse(period)?;
                let aggregate: Aggregate = aggregate.parse().ok()?;
                let allowed: &[OutputForm] = if aggregate.is_time() {
                    &TIME_FORMS
                } else {
                    &AGGREGATE_FORMS
                };
                let form = OutputForm::parse(rest, allowed)?;
                if !windrun_bucket_allowed(observation, period) {
                    return None;
                }
                FieldKind::Aggregate {
                    period,
                    observation: observation.to_string(),
                    aggregate,
                    form,
                }
            }
            _ => return None,
        };

        Some(Self {
            field: field.to_string(),
            kind,
        })
    }

    /// The identifier exactly as requested
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn observation(&self) -> &str {
        self.kind.observation()
    }

    /// First meta prefix (`unit` for `unit.label.<obs>`)
    pub fn prefix(&self) -> Option<&'static str> {
        matches!(self.kind, FieldKind::UnitLabel { .. }).then_some("unit")
    }

    /// Second meta prefix (`label` for `unit.label.<obs>`)
    pub fn prefix2(&self) -> Option<&'static str> {
        matches!(self.kind, FieldKind::UnitLabel { .. }).then_some("label")
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        match self.kind {
            FieldKind::Aggregate { aggregate, .. } => Some(aggregate),
            _ => None,
        }
    }

    pub fn form(&self) -> OutputForm {
        self.kind.form()
    }
}

impl FromStr for FieldDescriptor {
    type Err = LoopDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldDescriptor::parse(s).ok_or_else(|| LoopDataError::InvalidField(s.to_string()))
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field)
    }
}

/// Compass point of a `windrun_<POINT>` observation
pub fn windrun_bucket(observation: &str) -> Option<usize> {
    let point = observation.strip_prefix(WINDRUN_BUCKET_PREFIX)?;
    COMPASS_POINTS.iter().position(|p| *p == point)
}

// Per-direction wind run is only kept for short periods.
fn windrun_bucket_allowed(observation: &str, period: Period) -> bool {
    if !observation.starts_with(WINDRUN_BUCKET_PREFIX) {
        return true;
    }
    windrun_bucket(observation).is_some()
        && matches!(
            period,
            Period::Sliding(_)
                | Period::Calendar(CalendarPeriod::Hour)
                | Period::Calendar(CalendarPeriod::Day)
        )
}
