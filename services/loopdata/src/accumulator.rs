//! Calendar period accumulators
//!
//! A [`CalendarAccumulator`] folds every packet that falls inside its span
//! into running statistics. It never looks at a sample twice and keeps no
//! samples, so a year or all-time accumulator costs the same as an hour.

use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::{CalendarPeriod, Span};
use crate::field::Aggregate;
use crate::window::{vector_direction, AggregateValue, Extreme, Polar, Sample, Statistics};

/// Running count, sum, sum of squares and extremes of a scalar observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
    min: Option<Extreme>,
    max: Option<Extreme>,
}

impl ScalarStats {
    pub fn add_value(&mut self, timestamp: i64, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        let candidate = Extreme {
            value,
            timestamp,
            direction: None,
        };
        Extreme::offer_min(&mut self.min, candidate);
        Extreme::offer_max(&mut self.max, candidate);
    }

    pub fn sum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }

    pub fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn rms(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.sum_sq / self.count as f64).sqrt())
    }

    pub fn max(&self) -> Option<(f64, i64)> {
        self.max.map(|e| (e.value, e.timestamp))
    }

    pub fn min(&self) -> Option<(f64, i64)> {
        self.min.map(|e| (e.value, e.timestamp))
    }
}

impl Statistics for ScalarStats {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        if let Sample::Scalar(value) = sample {
            self.add_value(timestamp, *value);
        }
    }

    fn aggregate(&self, aggregate: Aggregate) -> Option<AggregateValue> {
        use AggregateValue::{Time, Value};
        match aggregate {
            Aggregate::Avg => self.avg().map(Value),
            Aggregate::Max => self.max().map(|(v, _)| Value(v)),
            Aggregate::Min => self.min().map(|(v, _)| Value(v)),
            Aggregate::Sum => self.sum().map(Value),
            Aggregate::Rms => self.rms().map(Value),
            Aggregate::MaxTime => self.max().map(|(_, t)| Time(t)),
            Aggregate::MinTime => self.min().map(|(_, t)| Time(t)),
            Aggregate::VecAvg | Aggregate::VecDir | Aggregate::GustDir => None,
        }
    }

    fn count(&self) -> usize {
        self.count
    }
}

/// Running wind statistics
///
/// Speeds drive count, sum, sum of squares and the vector sum; extremes
/// are taken over speeds and gusts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorStats {
    speeds: ScalarStats,
    max: Option<Extreme>,
    min: Option<Extreme>,
    x_sum: f64,
    y_sum: f64,
}

impl VectorStats {
    pub fn add_speed(&mut self, timestamp: i64, speed: Polar) {
        self.speeds.add_value(timestamp, speed.magnitude);
        if let Some(direction) = speed.direction {
            let radians = direction.to_radians();
            self.x_sum += speed.magnitude * radians.cos();
            self.y_sum += speed.magnitude * radians.sin();
        }
        self.offer_extremes(timestamp, speed);
    }

    pub fn add_gust(&mut self, timestamp: i64, gust: Polar) {
        self.offer_extremes(timestamp, gust);
    }

    fn offer_extremes(&mut self, timestamp: i64, polar: Polar) {
        let candidate = Extreme {
            value: polar.magnitude,
            timestamp,
            direction: polar.direction,
        };
        Extreme::offer_max(&mut self.max, candidate);
        Extreme::offer_min(&mut self.min, candidate);
    }

    pub fn vector_avg(&self) -> Option<f64> {
        let count = self.speeds.count();
        (count > 0).then(|| self.x_sum.hypot(self.y_sum) / count as f64)
    }

    pub fn vector_direction(&self) -> Option<f64> {
        vector_direction(self.x_sum, self.y_sum)
    }

    pub fn gust_direction(&self) -> Option<f64> {
        self.max.and_then(|e| e.direction)
    }
}

impl Statistics for VectorStats {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        if let Sample::Wind { speed, gust } = sample {
            if let Some(speed) = speed {
                self.add_speed(timestamp, *speed);
            }
            if let Some(gust) = gust {
                self.add_gust(timestamp, *gust);
            }
        }
    }

    fn aggregate(&self, aggregate: Aggregate) -> Option<AggregateValue> {
        use AggregateValue::{Time, Value};
        match aggregate {
            Aggregate::Avg => self.speeds.avg().map(Value),
            Aggregate::Sum => self.speeds.sum().map(Value),
            Aggregate::Rms => self.speeds.rms().map(Value),
            Aggregate::Max => self.max.map(|e| Value(e.value)),
            Aggregate::Min => self.min.map(|e| Value(e.value)),
            Aggregate::MaxTime => self.max.map(|e| Time(e.timestamp)),
            Aggregate::MinTime => self.min.map(|e| Time(e.timestamp)),
            Aggregate::VecAvg => self.vector_avg().map(Value),
            Aggregate::VecDir => self.vector_direction().map(Value),
            Aggregate::GustDir => self.gust_direction().map(Value),
        }
    }

    fn count(&self) -> usize {
        self.speeds.count()
    }
}

/// Statistics for one observation of a calendar period
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationStats {
    Scalar(ScalarStats),
    Vector(VectorStats),
}

impl ObservationStats {
    pub fn new(vector: bool) -> Self {
        if vector {
            ObservationStats::Vector(VectorStats::default())
        } else {
            ObservationStats::Scalar(ScalarStats::default())
        }
    }
}

impl Statistics for ObservationStats {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        match self {
            ObservationStats::Scalar(s) => s.add(timestamp, sample),
            ObservationStats::Vector(s) => s.add(timestamp, sample),
        }
    }

    fn aggregate(&self, aggregate: Aggregate) -> Option<AggregateValue> {
        match self {
            ObservationStats::Scalar(s) => s.aggregate(aggregate),
            ObservationStats::Vector(s) => s.aggregate(aggregate),
        }
    }

    fn count(&self) -> usize {
        match self {
            ObservationStats::Scalar(s) => s.count(),
            ObservationStats::Vector(s) => s.count(),
        }
    }
}

/// Statistics of every tracked observation over one calendar span
///
/// The span is fixed at construction. When a packet falls outside of it
/// the owner builds a new accumulator rather than resetting this one.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarAccumulator {
    period: CalendarPeriod,
    span: Span,
    stats: BTreeMap<String, ObservationStats>,
}

impl CalendarAccumulator {
    /// Create an empty accumulator tracking `observations`
    ///
    /// `is_vector` decides which observations keep wind statistics.
    pub fn new(
        period: CalendarPeriod,
        span: Span,
        observations: &BTreeSet<String>,
        is_vector: impl Fn(&str) -> bool,
    ) -> Self {
        let stats = observations
            .iter()
            .map(|obs| (obs.clone(), ObservationStats::new(is_vector(obs))))
            .collect();
        Self {
            period,
            span,
            stats,
        }
    }

    pub fn period(&self) -> CalendarPeriod {
        self.period
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.span.contains(timestamp)
    }

    /// Fold `sample` into `observation`; untracked observations are ignored
    pub fn add(&mut self, observation: &str, timestamp: i64, sample: &Sample) {
        if let Some(stats) = self.stats.get_mut(observation) {
            stats.add(timestamp, sample);
        }
    }

    pub fn stats(&self, observation: &str) -> Option<&ObservationStats> {
        self.stats.get(observation)
    }

    pub fn aggregate(&self, observation: &str, aggregate: Aggregate) -> Option<AggregateValue> {
        self.stats
            .get(observation)
            .and_then(|s| s.aggregate(aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_593_630_000;

    fn day_span() -> Span {
        Span {
            start: T0 - 43_200,
            end: T0 + 43_200,
        }
    }

    fn observations(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalar_stats() {
        let mut stats = ScalarStats::default();
        assert_eq!(stats.avg(), None);
        assert_eq!(stats.aggregate(Aggregate::Max), None);

        stats.add_value(T0, 2.0);
        stats.add_value(T0 + 5, 4.0);
        stats.add_value(T0 + 9, 4.0);

        assert_eq!(stats.count(), 3);
        assert_eq!(stats.sum(), Some(10.0));
        assert!((stats.avg().unwrap() - 10.0 / 3.0).abs() < 1e-12);
        assert!((stats.rms().unwrap() - 12.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.max(), Some((4.0, T0 + 5)));
        assert_eq!(stats.min(), Some((2.0, T0)));
        assert_eq!(
            stats.aggregate(Aggregate::MinTime),
            Some(AggregateValue::Time(T0))
        );
    }

    #[test]
    fn test_vector_stats() {
        let mut stats = VectorStats::default();
        stats.add(
            T0,
            &Sample::Wind {
                speed: Some(Polar::new(6.0, Some(45.0))),
                gust: Some(Polar::new(10.0, Some(244.0))),
            },
        );
        stats.add(
            T0 + 2,
            &Sample::Wind {
                speed: Some(Polar::new(0.0, Some(90.0))),
                gust: None,
            },
        );

        assert_eq!(stats.count(), 2);
        assert_eq!(stats.aggregate(Aggregate::Avg), Some(AggregateValue::Value(3.0)));
        assert_eq!(stats.aggregate(Aggregate::Max), Some(AggregateValue::Value(10.0)));
        assert_eq!(stats.aggregate(Aggregate::Min), Some(AggregateValue::Value(0.0)));
        assert_eq!(
            stats.aggregate(Aggregate::MinTime),
            Some(AggregateValue::Time(T0 + 2))
        );
        assert_eq!(stats.gust_direction(), Some(244.0));
        assert!((stats.vector_direction().unwrap() - 45.0).abs() < 1e-9);
        assert!((stats.vector_avg().unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_vector_stats_without_direction() {
        let mut stats = VectorStats::default();
        stats.add_speed(T0, Polar::new(0.0, Some(10.0)));
        assert_eq!(stats.aggregate(Aggregate::VecDir), None);
        assert_eq!(stats.aggregate(Aggregate::GustDir), None);
        assert_eq!(stats.aggregate(Aggregate::Max), Some(AggregateValue::Value(0.0)));
    }

    #[test]
    fn test_accumulator_tracks_only_requested() {
        let mut acc = CalendarAccumulator::new(
            CalendarPeriod::Day,
            day_span(),
            &observations(&["outTemp", "wind"]),
            |obs| obs == "wind",
        );
        acc.add("outTemp", T0, &Sample::Scalar(72.0));
        acc.add("inTemp", T0, &Sample::Scalar(68.0));
        acc.add(
            "wind",
            T0,
            &Sample::Wind {
                speed: Some(Polar::new(5.0, Some(180.0))),
                gust: None,
            },
        );

        assert_eq!(acc.period(), CalendarPeriod::Day);
        assert_eq!(
            acc.aggregate("outTemp", Aggregate::Max),
            Some(AggregateValue::Value(72.0))
        );
        assert!(acc.stats("inTemp").is_none());
        assert!(matches!(
            acc.stats("wind"),
            Some(ObservationStats::Vector(_))
        ));
        assert!((acc
            .aggregate("wind", Aggregate::VecDir)
            .and_then(AggregateValue::value)
            .unwrap()
            - 180.0)
            .abs()
            < 1e-9);
    }

    #[test]
    fn test_span_bounds() {
        let acc = CalendarAccumulator::new(
            CalendarPeriod::Day,
            day_span(),
            &BTreeSet::new(),
            |_| false,
        );
        assert!(acc.contains(T0 - 43_200));
        assert!(acc.contains(T0 + 43_199));
        assert!(!acc.contains(T0 + 43_200));
        assert_eq!(acc.span(), day_span());
    }
}
