//! The set of live accumulators, one slot per period in use
//!
//! Slots are created only for periods and observations that some requested
//! field reads. Sliding windows are keyed by their length in seconds, so
//! `60m` and `1h` share one window.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::accumulator::CalendarAccumulator;
use crate::calendar::{span_containing, CalendarPeriod, CalendarRules};
use crate::error::{LoopDataError, Result};
use crate::field::{Aggregate, FieldKind, Period, SlidingPeriod};
use crate::packet::{is_vector_observation, Packet, PacketKind};
use crate::window::{AggregateValue, ObservationWindow, ScalarWindow, Statistics};

#[derive(Debug, Clone)]
struct CalendarSlot {
    observations: BTreeSet<String>,
    accumulator: Option<CalendarAccumulator>,
}

/// Accumulators for every period a requested field reads from
#[derive(Debug, Clone)]
pub struct PeriodAccumulatorSet {
    rules: CalendarRules,
    trend_retention: i64,
    sliding: BTreeMap<i64, BTreeMap<String, ObservationWindow>>,
    calendar: BTreeMap<CalendarPeriod, CalendarSlot>,
    trends: BTreeMap<String, ScalarWindow>,
    current: Option<Packet>,
}

impl PeriodAccumulatorSet {
    /// Create an empty set; `trend_retention` is the trend window in seconds
    pub fn new(rules: CalendarRules, trend_retention: i64) -> Self {
        Self {
            rules,
            trend_retention,
            sliding: BTreeMap::new(),
            calendar: BTreeMap::new(),
            trends: BTreeMap::new(),
            current: None,
        }
    }

    /// Make sure the accumulator a field reads from exists
    pub fn require(&mut self, kind: &FieldKind) {
        match kind {
            FieldKind::Aggregate {
                period, observation, ..
            } => match period {
                Period::Sliding(sliding) => {
                    let retention = sliding.seconds();
                    self.sliding
                        .entry(retention)
                        .or_default()
                        .entry(observation.clone())
                        .or_insert_with(|| {
                            ObservationWindow::new(is_vector_observation(observation), retention)
                        });
                }
                Period::Calendar(calendar) => {
                    let slot = self.calendar.entry(*calendar).or_insert_with(|| CalendarSlot {
                        observations: BTreeSet::new(),
                        accumulator: None,
                    });
                    slot.observations.insert(observation.clone());
                }
            },
            FieldKind::Trend { observation, .. } => {
                let retention = self.trend_retention;
                self.trends
                    .entry(observation.clone())
                    .or_insert_with(|| ScalarWindow::new(retention));
            }
            FieldKind::Current { .. } | FieldKind::UnitLabel { .. } => {}
        }
    }

    /// Fold one packet into every slot
    ///
    /// Archive packets only reach the trend windows. A calendar slot whose
    /// span does not contain the packet is replaced before the packet is
    /// folded in. On error the set is left as it was.
    pub fn ingest(&mut self, packet: &Packet) -> Result<()> {
        packet.validate()?;
        let now = packet.date_time;

        let mut fresh_spans = Vec::new();
        if packet.kind == PacketKind::Loop {
            for (period, slot) in &self.calendar {
                let stale = slot
                    .accumulator
                    .as_ref()
                    .is_none_or(|acc| !acc.contains(now));
                if stale {
                    let span = span_containing(now, *period, &self.rules).map_err(|e| {
                        LoopDataError::Packet(format!("dateTime {} rejected: {}", now, e))
                    })?;
                    fresh_spans.push((*period, span));
                }
            }
        }

        for (observation, window) in &mut self.trends {
            match packet.value(observation) {
                Some(value) => window.ingest(now, value),
                None => window.trim(now),
            }
        }

        if packet.kind == PacketKind::Archive {
            return Ok(());
        }

        for windows in self.sliding.values_mut() {
            for (observation, window) in windows.iter_mut() {
                if let Some(sample) = packet.sample(observation) {
                    window.add(now, &sample);
                }
                window.trim(now);
            }
        }

        for (period, span) in fresh_spans {
            if let Some(slot) = self.calendar.get_mut(&period) {
                debug!(
                    "{} accumulator starts span [{}, {}) at {}",
                    period, span.start, span.end, now
                );
                slot.accumulator = Some(CalendarAccumulator::new(
                    period,
                    span,
                    &slot.observations,
                    is_vector_observation,
                ));
            }
        }
        for slot in self.calendar.values_mut() {
            if let Some(acc) = slot.accumulator.as_mut() {
                for observation in &slot.observations {
                    if let Some(sample) = packet.sample(observation) {
                        acc.add(observation, now, &sample);
                    }
                }
            }
        }

        self.current = Some(packet.clone());
        Ok(())
    }

    /// Latest loop packet
    pub fn current(&self) -> Option<&Packet> {
        self.current.as_ref()
    }

    pub fn trend_window(&self, observation: &str) -> Option<&ScalarWindow> {
        self.trends.get(observation)
    }

    pub fn calendar_accumulator(&self, period: CalendarPeriod) -> Option<&CalendarAccumulator> {
        self.calendar.get(&period)?.accumulator.as_ref()
    }

    pub fn sliding_window(
        &self,
        period: SlidingPeriod,
        observation: &str,
    ) -> Option<&ObservationWindow> {
        self.sliding.get(&period.seconds())?.get(observation)
    }

    /// Evaluate `aggregate` of `observation` over `period`
    pub fn aggregate(
        &self,
        period: Period,
        observation: &str,
        aggregate: Aggregate,
    ) -> Option<AggregateValue> {
        match period {
            Period::Sliding(sliding) => self
                .sliding_window(sliding, observation)?
                .aggregate(aggregate),
            Period::Calendar(calendar) => self
                .calendar_accumulator(calendar)?
                .aggregate(observation, aggregate),
        }
    }

    /// Number of allocated period slots (sliding lengths plus calendar periods)
    pub fn slot_count(&self) -> usize {
        self.sliding.len() + self.calendar.len()
    }

    /// Every observation some slot reads
    pub fn observations_in_use(&self) -> BTreeSet<String> {
        let mut observations: BTreeSet<String> = self.trends.keys().cloned().collect();
        for windows in self.sliding.values() {
            observations.extend(windows.keys().cloned());
        }
        for slot in self.calendar.values() {
            observations.extend(slot.observations.iter().cloned());
        }
        observations
    }

    /// Oldest timestamp any slot would still hold at `now`
    ///
    /// `None` when no slot is allocated.
    pub fn earliest_needed(&self, now: i64) -> Result<Option<i64>> {
        let mut earliest: Option<i64> = None;
        let mut consider = |ts: i64| {
            earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
        };

        for retention in self.sliding.keys() {
            consider(now - retention);
        }
        if !self.trends.is_empty() {
            consider(now - self.trend_retention);
        }
        for period in self.calendar.keys() {
            if *period == CalendarPeriod::AllTime {
                consider(0);
            } else {
                consider(span_containing(now, *period, &self.rules)?.start);
            }
        }
        Ok(earliest)
    }
}
