//! Time-bounded sample windows
//!
//! A window keeps every sample whose timestamp lies within its retention
//! duration of the newest ingest time and answers aggregate queries over
//! them. [`ScalarWindow`] holds plain readings; [`VectorWindow`] holds wind
//! samples that carry a direction next to their magnitude.

use std::collections::VecDeque;

use crate::field::Aggregate;

/// Result of evaluating an aggregate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateValue {
    /// A value in the observation's own unit (or degrees for directions)
    Value(f64),
    /// Epoch seconds of the sample that produced a max/min
    Time(i64),
}

impl AggregateValue {
    pub fn value(self) -> Option<f64> {
        match self {
            AggregateValue::Value(v) => Some(v),
            AggregateValue::Time(_) => None,
        }
    }
}

/// Magnitude with an optional direction in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polar {
    pub magnitude: f64,
    pub direction: Option<f64>,
}

impl Polar {
    /// Direction is dropped at zero magnitude, where it is undefined.
    pub fn new(magnitude: f64, direction: Option<f64>) -> Self {
        let direction = if magnitude == 0.0 { None } else { direction };
        Self {
            magnitude,
            direction,
        }
    }
}

/// The value one packet contributes to one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Scalar(f64),
    /// Wind: a speed sample, a gust sample, or both
    Wind {
        speed: Option<Polar>,
        gust: Option<Polar>,
    },
}

/// Streaming statistics over samples of one observation
pub trait Statistics {
    fn add(&mut self, timestamp: i64, sample: &Sample);

    /// Evaluate `aggregate`; `None` when there is nothing to report
    fn aggregate(&self, aggregate: Aggregate) -> Option<AggregateValue>;

    /// Number of samples folded in (speed samples for wind)
    fn count(&self) -> usize;
}

/// Running extreme with the time it was seen at
///
/// Ties keep the earlier sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Extreme {
    pub value: f64,
    pub timestamp: i64,
    pub direction: Option<f64>,
}

impl Extreme {
    pub(crate) fn offer_max(slot: &mut Option<Extreme>, candidate: Extreme) {
        let replace = match slot {
            None => true,
            Some(best) => {
                candidate.value > best.value
                    || (candidate.value == best.value && candidate.timestamp < best.timestamp)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    pub(crate) fn offer_min(slot: &mut Option<Extreme>, candidate: Extreme) {
        let replace = match slot {
            None => true,
            Some(best) => {
                candidate.value < best.value
                    || (candidate.value == best.value && candidate.timestamp < best.timestamp)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }
}

/// Direction in degrees of the vector sum `(x, y)`, `None` for a null vector
pub(crate) fn vector_direction(x: f64, y: f64) -> Option<f64> {
    if x.hypot(y) <= 1e-9 {
        return None;
    }
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round a tiny negative angle up to exactly 360
    Some(if degrees >= 360.0 { 0.0 } else { degrees })
}

/// A single timestamped reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: i64,
    pub value: f64,
}

/// Rolling window of scalar readings
#[derive(Debug, Clone)]
pub struct ScalarWindow {
    samples: VecDeque<Reading>,
    retention: i64,
}

impl ScalarWindow {
    /// Create a window that keeps `retention` seconds of readings
    pub fn new(retention: i64) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
        }
    }

    /// Append a reading and drop everything that fell out of the window
    pub fn ingest(&mut self, timestamp: i64, value: f64) {
        self.samples.push_back(Reading { timestamp, value });
        self.trim(timestamp);
    }

    /// Remove readings older than `now - retention`
    pub fn trim(&mut self, now: i64) {
        let cutoff = now.saturating_sub(self.retention);
        self.samples.retain(|r| r.timestamp >= cutoff);
    }

    pub fn retention(&self) -> i64 {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<Reading> {
        self.samples.front().copied()
    }

    pub fn last(&self) -> Option<Reading> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.samples.iter()
    }

    pub fn max(&self) -> Option<(f64, i64)> {
        let mut best = None;
        for r in &self.samples {
            Extreme::offer_max(&mut best, extreme(r.timestamp, r.value, None));
        }
        best.map(|e| (e.value, e.timestamp))
    }

    pub fn min(&self) -> Option<(f64, i64)> {
        let mut best = None;
        for r in &self.samples {
            Extreme::offer_min(&mut best, extreme(r.timestamp, r.value, None));
        }
        best.map(|e| (e.value, e.timestamp))
    }

    pub fn sum(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|r| r.value).sum())
    }

    pub fn avg(&self) -> Option<f64> {
        self.sum().map(|s| s / self.samples.len() as f64)
    }

    pub fn rms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum_sq: f64 = self.samples.iter().map(|r| r.value * r.value).sum();
        Some((sum_sq / self.samples.len() as f64).sqrt())
    }
}

impl Statistics for ScalarWindow {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        if let Sample::Scalar(value) = sample {
            self.ingest(timestamp, *value);
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
        self.len()
    }
}

fn extreme(timestamp: i64, value: f64, direction: Option<f64>) -> Extreme {
    Extreme {
        value,
        timestamp,
        direction,
    }
}

/// A wind sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorReading {
    pub timestamp: i64,
    pub magnitude: f64,
    pub direction: Option<f64>,
}

/// Rolling window of wind samples
///
/// Speed and gust samples are kept apart: extremes and `gustdir` look at
/// both, averages and vector sums only at speeds.
#[derive(Debug, Clone)]
pub struct VectorWindow {
    speeds: VecDeque<VectorReading>,
    gusts: VecDeque<VectorReading>,
    retention: i64,
}

impl VectorWindow {
    pub fn new(retention: i64) -> Self {
        Self {
            speeds: VecDeque::new(),
            gusts: VecDeque::new(),
            retention,
        }
    }

    pub fn ingest_speed(&mut self, timestamp: i64, speed: Polar) {
        self.speeds.push_back(reading(timestamp, speed));
        self.trim(timestamp);
    }

    pub fn ingest_gust(&mut self, timestamp: i64, gust: Polar) {
        self.gusts.push_back(reading(timestamp, gust));
        self.trim(timestamp);
    }

    pub fn trim(&mut self, now: i64) {
        let cutoff = now.saturating_sub(self.retention);
        self.speeds.retain(|r| r.timestamp >= cutoff);
        self.gusts.retain(|r| r.timestamp >= cutoff);
    }

    pub fn retention(&self) -> i64 {
        self.retention
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty() && self.gusts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VectorReading> {
        self.speeds.iter().chain(self.gusts.iter())
    }

    fn max_extreme(&self) -> Option<Extreme> {
        let mut best = None;
        for r in self.iter() {
            Extreme::offer_max(&mut best, extreme(r.timestamp, r.magnitude, r.direction));
        }
        best
    }

    fn min_extreme(&self) -> Option<Extreme> {
        let mut best = None;
        for r in self.iter() {
            Extreme::offer_min(&mut best, extreme(r.timestamp, r.magnitude, r.direction));
        }
        best
    }

    pub fn max(&self) -> Option<(f64, i64)> {
        self.max_extreme().map(|e| (e.value, e.timestamp))
    }

    pub fn min(&self) -> Option<(f64, i64)> {
        self.min_extreme().map(|e| (e.value, e.timestamp))
    }

    pub fn sum(&self) -> Option<f64> {
        if self.speeds.is_empty() {
            return None;
        }
        Some(self.speeds.iter().map(|r| r.magnitude).sum())
    }

    pub fn avg(&self) -> Option<f64> {
        self.sum().map(|s| s / self.speeds.len() as f64)
    }

    /// Root mean square of the speed magnitudes
    pub fn rms(&self) -> Option<f64> {
        if self.speeds.is_empty() {
            return None;
        }
        let sum_sq: f64 = self.speeds.iter().map(|r| r.magnitude * r.magnitude).sum();
        Some((sum_sq / self.speeds.len() as f64).sqrt())
    }

    fn vector_sum(&self) -> (f64, f64) {
        self.speeds
            .iter()
            .filter_map(|r| r.direction.map(|d| (r.magnitude, d.to_radians())))
            .fold((0.0, 0.0), |(x, y), (m, d)| (x + m * d.cos(), y + m * d.sin()))
    }

    /// Magnitude of the vector sum divided by the number of speed samples
    pub fn vector_avg(&self) -> Option<f64> {
        if self.speeds.is_empty() {
            return None;
        }
        let (x, y) = self.vector_sum();
        Some(x.hypot(y) / self.speeds.len() as f64)
    }

    /// Magnitude-weighted average direction, modulo 360
    pub fn vector_direction(&self) -> Option<f64> {
        let (x, y) = self.vector_sum();
        vector_direction(x, y)
    }

    /// Direction of the strongest sample
    pub fn gust_direction(&self) -> Option<f64> {
        self.max_extreme().and_then(|e| e.direction)
    }
}

fn reading(timestamp: i64, polar: Polar) -> VectorReading {
    VectorReading {
        timestamp,
        magnitude: polar.magnitude,
        direction: polar.direction,
    }
}

impl Statistics for VectorWindow {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        if let Sample::Wind { speed, gust } = sample {
            if let Some(speed) = speed {
                self.ingest_speed(timestamp, *speed);
            }
            if let Some(gust) = gust {
                self.ingest_gust(timestamp, *gust);
            }
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
            Aggregate::VecAvg => self.vector_avg().map(Value),
            Aggregate::VecDir => self.vector_direction().map(Value),
            Aggregate::GustDir => self.gust_direction().map(Value),
            Aggregate::MaxTime => self.max().map(|(_, t)| Time(t)),
            Aggregate::MinTime => self.min().map(|(_, t)| Time(t)),
        }
    }

    fn count(&self) -> usize {
        self.speeds.len()
    }
}

/// Window for one observation of a sliding period
#[derive(Debug, Clone)]
pub enum ObservationWindow {
    Scalar(ScalarWindow),
    Vector(VectorWindow),
}

impl ObservationWindow {
    pub fn new(vector: bool, retention: i64) -> Self {
        if vector {
            ObservationWindow::Vector(VectorWindow::new(retention))
        } else {
            ObservationWindow::Scalar(ScalarWindow::new(retention))
        }
    }

    pub fn trim(&mut self, now: i64) {
        match self {
            ObservationWindow::Scalar(w) => w.trim(now),
            ObservationWindow::Vector(w) => w.trim(now),
        }
    }
}

impl Statistics for ObservationWindow {
    fn add(&mut self, timestamp: i64, sample: &Sample) {
        match self {
            ObservationWindow::Scalar(w) => w.add(timestamp, sample),
            ObservationWindow::Vector(w) => w.add(timestamp, sample),
        }
    }

    fn aggregate(&self, aggregate: Aggregate) -> Option<AggregateValue> {
        match self {
            ObservationWindow::Scalar(w) => w.aggregate(aggregate),
            ObservationWindow::Vector(w) => w.aggregate(aggregate),
        }
    }

    fn count(&self) -> usize {
        match self {
            ObservationWindow::Scalar(w) => w.count(),
            ObservationWindow::Vector(w) => w.count(),
        }
    }
}
