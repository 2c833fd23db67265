//! Calendar-aligned spans
//!
//! A calendar period (hour, day, week, ...) owns a half-open span
//! `[start, end)` of epoch seconds. The span containing a timestamp depends
//! only on the timestamp, the period, the configured week start, rain-year
//! start month and time zone, so [`span_containing`] is a pure function that
//! can be tested without a wall clock.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, NaiveDate, Offset, TimeDelta, TimeZone, Utc,
    Weekday,
};
use serde::{Deserialize, Serialize};

use crate::error::{LoopDataError, Result};

/// Calendar-aligned period kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalendarPeriod {
    Hour,
    Day,
    Week,
    Month,
    Year,
    RainYear,
    AllTime,
}

impl CalendarPeriod {
    pub const ALL: [CalendarPeriod; 7] = [
        CalendarPeriod::Hour,
        CalendarPeriod::Day,
        CalendarPeriod::Week,
        CalendarPeriod::Month,
        CalendarPeriod::Year,
        CalendarPeriod::RainYear,
        CalendarPeriod::AllTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CalendarPeriod::Hour => "hour",
            CalendarPeriod::Day => "day",
            CalendarPeriod::Week => "week",
            CalendarPeriod::Month => "month",
            CalendarPeriod::Year => "year",
            CalendarPeriod::RainYear => "rainyear",
            CalendarPeriod::AllTime => "alltime",
        }
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalendarPeriod {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CalendarPeriod::ALL
            .into_iter()
            .find(|period| period.name() == s)
            .ok_or(())
    }
}

/// Half-open interval `[start, end)` of epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    /// The span of the `alltime` period
    pub const ALL: Span = Span {
        start: i64::MIN,
        end: i64::MAX,
    };

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Time zone used to place calendar boundaries and render times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Zone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => return Ok(Zone::Local),
            "utc" | "z" => return Ok(Zone::Utc),
            _ => {}
        }

        let invalid = || format!("invalid timezone '{}', expected local, utc or +HH:MM", s);
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None if rest.len() == 4 => rest.split_at(2),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Zone::Fixed)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for Zone {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.to_string()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => f.write_str("local"),
            Zone::Utc => f.write_str("utc"),
            Zone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl Zone {
    /// Render `timestamp` with a strftime pattern in this zone
    pub fn format(&self, timestamp: i64, pattern: &str) -> Option<String> {
        fn render<Tz: TimeZone>(tz: &Tz, timestamp: i64, pattern: &str) -> Option<String>
        where
            Tz::Offset: fmt::Display,
        {
            let dt: DateTime<Tz> = tz.timestamp_opt(timestamp, 0).single()?;
            Some(dt.format(pattern).to_string())
        }

        match self {
            Zone::Local => render(&Local, timestamp, pattern),
            Zone::Utc => render(&Utc, timestamp, pattern),
            Zone::Fixed(offset) => render(offset, timestamp, pattern),
        }
    }
}

/// Boundaries that shape week and rain-year spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRules {
    pub week_start: Weekday,
    /// Month (1..=12) the rain year begins in
    pub rain_year_start: u32,
    pub zone: Zone,
}

impl Default for CalendarRules {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            rain_year_start: 1,
            zone: Zone::Local,
        }
    }
}

/// Weekday for an index counted from Monday = 0
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Compute the span of `period` that contains `timestamp`
pub fn span_containing(
    timestamp: i64,
    period: CalendarPeriod,
    rules: &CalendarRules,
) -> Result<Span> {
    match rules.zone {
        Zone::Local => span_in(&Local, timestamp, period, rules),
        Zone::Utc => span_in(&Utc, timestamp, period, rules),
        Zone::Fixed(offset) => span_in(&offset, timestamp, period, rules),
    }
}

fn span_in<Tz: TimeZone>(
    tz: &Tz,
    timestamp: i64,
    period: CalendarPeriod,
    rules: &CalendarRules,
) -> Result<Span> {
    if period == CalendarPeriod::AllTime {
        return Ok(Span::ALL);
    }

    let local = tz
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| out_of_range(timestamp))?;

    if period == CalendarPeriod::Hour {
        // Hours follow the offset in force at this instant.
        let offset = i64::from(local.offset().fix().local_minus_utc());
        let start = timestamp - (timestamp + offset).rem_euclid(3600);
        return Ok(Span {
            start,
            end: start + 3600,
        });
    }

    let date = local.date_naive();
    let (first, next) = match period {
        CalendarPeriod::Day => (Some(date), date.succ_opt()),
        CalendarPeriod::Week => {
            let back = (7 + date.weekday().num_days_from_monday()
                - rules.week_start.num_days_from_monday())
                % 7;
            let first = date.checked_sub_days(Days::new(u64::from(back)));
            (first, first.and_then(|d| d.checked_add_days(Days::new(7))))
        }
        CalendarPeriod::Month => {
            let (year, month) = (date.year(), date.month());
            let (next_year, next_month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            (
                NaiveDate::from_ymd_opt(year, month, 1),
                NaiveDate::from_ymd_opt(next_year, next_month, 1),
            )
        }
        CalendarPeriod::Year => (
            NaiveDate::from_ymd_opt(date.year(), 1, 1),
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
        ),
        CalendarPeriod::RainYear => {
            let start_month = rules.rain_year_start;
            let year = if date.month() >= start_month {
                date.year()
            } else {
                date.year() - 1
            };
            (
                NaiveDate::from_ymd_opt(year, start_month, 1),
                NaiveDate::from_ymd_opt(year + 1, start_month, 1),
            )
        }
        CalendarPeriod::Hour | CalendarPeriod::AllTime => not_date_aligned(period)?,
    };

    let start = first
        .and_then(|d| local_midnight(tz, d))
        .ok_or_else(|| out_of_range(timestamp))?;
    let end = next
        .and_then(|d| local_midnight(tz, d))
        .ok_or_else(|| out_of_range(timestamp))?;
    Ok(Span { start, end })
}

fn not_date_aligned(period: CalendarPeriod) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    Err(LoopDataError::Calendar(format!(
        "{} is not a date-aligned period",
        period
    )))
}

/// First instant of `date` in `tz`
///
/// Ambiguous midnights resolve to the earlier instant. Zones that skip
/// midnight on a DST change start the day an hour later.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            let later = midnight.checked_add_signed(TimeDelta::hours(1))?;
            tz.from_local_datetime(&later).earliest()
        })
        .map(|dt| dt.timestamp())
}

fn out_of_range(timestamp: i64) -> LoopDataError {
    LoopDataError::Calendar(format!("timestamp {} is out of range", timestamp))
}
