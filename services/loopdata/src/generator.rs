//! Building the output record from the accumulator set
//!
//! [`RecordGenerator`] holds the validated list of requested fields. After
//! every loop packet it reads each field's accumulator, converts the value
//! into the target unit system and renders it in the requested form.
//! Fields with nothing to report are left out of the record.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LoopDataError, Result};
use crate::field::{FieldDescriptor, FieldKind, OutputForm};
use crate::packet::{is_vector_observation, Packet, WIND, WIND_SPEED};
use crate::periods::PeriodAccumulatorSet;
use crate::trend::{classify, trend_delta, TrendDescriptions, TrendSettings};
use crate::units::{Unit, UnitFormatter, UnitGroup, UnitSystem};
use crate::window::AggregateValue;

const DATE_TIME: &str = "dateTime";

/// A single rendered value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Text(_) => None,
        }
    }
}

/// Field identifier to rendered value
pub type OutputRecord = BTreeMap<String, FieldValue>;

/// Rendering options shared by all fields
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub target: UnitSystem,
    /// `.raw` values are converted to `target` (otherwise left in packet units)
    pub raw_converted: bool,
    pub trend: TrendSettings,
    pub descriptions: TrendDescriptions,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            target: UnitSystem::Us,
            raw_converted: true,
            trend: TrendSettings::default(),
            descriptions: TrendDescriptions::default(),
        }
    }
}

/// Renders requested fields from the live accumulators
#[derive(Debug)]
pub struct RecordGenerator {
    fields: Vec<FieldDescriptor>,
    units: Arc<dyn UnitFormatter>,
    settings: GeneratorSettings,
}

impl RecordGenerator {
    /// Validate `fields` against their observations
    ///
    /// Fails with `InvalidField` for combinations that cannot be computed and
    /// `UnknownObservation` when a converted field names an observation with
    /// no unit group.
    pub fn new(
        fields: Vec<FieldDescriptor>,
        units: Arc<dyn UnitFormatter>,
        settings: GeneratorSettings,
    ) -> Result<Self> {
        for field in &fields {
            validate(field, units.as_ref())?;
        }
        Ok(Self {
            fields,
            units,
            settings,
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Render every field that has a value
    pub fn generate(&self, set: &PeriodAccumulatorSet) -> Result<OutputRecord> {
        let mut record = OutputRecord::new();
        let Some(packet) = set.current() else {
            return Ok(record);
        };
        for field in &self.fields {
            if let Some(value) = self.render_field(field, set, packet)? {
                record.insert(field.field().to_string(), value);
            }
        }
        Ok(record)
    }

    fn render_field(
        &self,
        field: &FieldDescriptor,
        set: &PeriodAccumulatorSet,
        packet: &Packet,
    ) -> Result<Option<FieldValue>> {
        let units = self.units.as_ref();
        let source = packet.us_units;
        match field.kind() {
            FieldKind::UnitLabel { observation } => {
                let group = units
                    .group_of(observation)
                    .ok_or_else(|| LoopDataError::UnknownObservation(observation.clone()))?;
                let converted =
                    units.convert(None, source.unit_for(group), group, self.settings.target)?;
                Ok(Some(FieldValue::Text(units.label(converted.unit))))
            }
            FieldKind::Current { observation, form } => {
                if observation == DATE_TIME {
                    return Ok(Some(self.render_time(packet.date_time, *form)));
                }
                let Some(value) = current_value(packet, observation) else {
                    return Ok(None);
                };
                let group = units.group_of(observation);
                self.render_value(value, group, source, *form).map(Some)
            }
            FieldKind::Trend { observation, form } => {
                let Some(delta) = set
                    .trend_window(observation)
                    .and_then(|w| trend_delta(w, &self.settings.trend))
                else {
                    return Ok(None);
                };
                self.render_trend(observation, delta, source, *form).map(Some)
            }
            FieldKind::Aggregate {
                period,
                observation,
                aggregate,
                form,
            } => match set.aggregate(*period, observation, *aggregate) {
                None => Ok(None),
                Some(AggregateValue::Time(ts)) => Ok(Some(self.render_time(ts, *form))),
                Some(AggregateValue::Value(value)) => {
                    let group = if aggregate.is_direction() {
                        Some(UnitGroup::Direction)
                    } else {
                        units.group_of(observation)
                    };
                    self.render_value(value, group, source, *form).map(Some)
                }
            },
        }
    }

    fn render_time(&self, timestamp: i64, form: OutputForm) -> FieldValue {
        match form {
            OutputForm::Raw => FieldValue::Integer(timestamp),
            _ => FieldValue::Text(self.units.format_time(timestamp)),
        }
    }

    fn render_value(
        &self,
        value: f64,
        group: Option<UnitGroup>,
        source: UnitSystem,
        form: OutputForm,
    ) -> Result<FieldValue> {
        let units = self.units.as_ref();
        if form == OutputForm::OrdinalCompass {
            return Ok(FieldValue::Text(units.ordinal_compass(value)));
        }
        let Some(group) = group else {
            return Ok(FieldValue::Number(value));
        };
        if group == UnitGroup::Time {
            return Ok(self.render_time(value.round() as i64, form));
        }
        if form == OutputForm::Raw && !self.settings.raw_converted {
            return Ok(FieldValue::Number(value));
        }

        let converted = units.convert(
            Some(value),
            source.unit_for(group),
            group,
            self.settings.target,
        )?;
        let number = converted.value.unwrap_or(value);
        Ok(self.render_number(number, converted.unit, form))
    }

    fn render_number(&self, number: f64, unit: Unit, form: OutputForm) -> FieldValue {
        let units = self.units.as_ref();
        match form {
            OutputForm::Raw => FieldValue::Number(number),
            OutputForm::Formatted => FieldValue::Text(units.format(number, unit)),
            _ => FieldValue::Text(format!(
                "{}{}",
                units.format(number, unit),
                units.label(unit)
            )),
        }
    }

    fn render_trend(
        &self,
        observation: &str,
        delta: f64,
        source: UnitSystem,
        form: OutputForm,
    ) -> Result<FieldValue> {
        let units = self.units.as_ref();
        let group = units
            .group_of(observation)
            .ok_or_else(|| LoopDataError::UnknownObservation(observation.to_string()))?;
        let source_unit = source.unit_for(group);

        match form {
            OutputForm::Code | OutputForm::Desc => {
                let trend = classify(delta, source_unit, self.settings.trend.duration);
                Ok(match form {
                    OutputForm::Code => FieldValue::Integer(i64::from(trend.code())),
                    _ => FieldValue::Text(self.settings.descriptions.describe(trend).to_string()),
                })
            }
            OutputForm::Raw if !self.settings.raw_converted => Ok(FieldValue::Number(delta)),
            _ => {
                // Deltas convert as differences so offsets (degree F) cancel.
                let target = self.settings.target;
                let moved = units.convert(Some(delta), source_unit, group, target)?;
                let origin = units.convert(Some(0.0), source_unit, group, target)?;
                let number = moved.value.unwrap_or(delta) - origin.value.unwrap_or(0.0);
                Ok(self.render_number(number, moved.unit, form))
            }
        }
    }
}

fn current_value(packet: &Packet, observation: &str) -> Option<f64> {
    match packet.value(observation) {
        Some(v) => Some(v),
        None if observation == WIND => packet.value(WIND_SPEED),
        None => None,
    }
}

fn validate(field: &FieldDescriptor, units: &dyn UnitFormatter) -> Result<()> {
    let invalid = |reason: &str| {
        Err(LoopDataError::InvalidField(format!(
            "{} ({})",
            field.field(),
            reason
        )))
    };
    let observation = field.observation();
    let group = units.group_of(observation);
    let unknown = || Err(LoopDataError::UnknownObservation(observation.to_string()));

    match field.kind() {
        FieldKind::UnitLabel { .. } => {
            if group.is_none() {
                return unknown();
            }
        }
        FieldKind::Current { form, .. } => {
            let needs_group = matches!(form, OutputForm::Labeled | OutputForm::Formatted);
            if needs_group && observation != DATE_TIME && group.is_none() {
                return unknown();
            }
        }
        FieldKind::Trend { form, .. } => {
            if is_vector_observation(observation) {
                return invalid("trend needs a scalar observation");
            }
            if group.is_none() {
                return unknown();
            }
            if matches!(form, OutputForm::Code | OutputForm::Desc)
                && group != Some(UnitGroup::Pressure)
            {
                return invalid("tendency code and description need a pressure observation");
            }
        }
        FieldKind::Aggregate {
            aggregate, form, ..
        } => {
            if aggregate.is_vector() && !is_vector_observation(observation) {
                return invalid("vector aggregate needs the wind observation");
            }
            let needs_group = !aggregate.is_time()
                && !aggregate.is_direction()
                && matches!(form, OutputForm::Labeled | OutputForm::Formatted);
            if needs_group && group.is_none() {
                return unknown();
            }
        }
    }
    Ok(())
}
