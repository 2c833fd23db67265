use std::sync::Arc;

use cucumber::{given, then, when};
use loopdata::units::{StandardUnits, UnitFormatter};
use loopdata::LoopDataEngine;

use crate::world::LoopDataWorld;

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[given(expr = "the requested fields {string}")]
fn requested_fields(world: &mut LoopDataWorld, fields: String) {
    world.config_mut().fields = split_list(&fields);
}

#[given(expr = "field {string} is renamed to {string}")]
fn renamed_field(world: &mut LoopDataWorld, field: String, key: String) {
    world.config_mut().rename.insert(field, key);
}

#[given(expr = "the week starts on day {int}")]
fn week_starts_on(world: &mut LoopDataWorld, day: u8) {
    world.config_mut().calendar.week_start = day;
}

#[given(expr = "the rain year starts in month {int}")]
fn rain_year_starts_in(world: &mut LoopDataWorld, month: u32) {
    world.config_mut().calendar.rain_year_start = month;
}

#[given(expr = "the target unit system is {word}")]
fn target_unit_system(world: &mut LoopDataWorld, system: String) {
    world.config_mut().units.target = system.parse().expect("unit system");
}

#[given(expr = "trend normalization is disabled")]
fn trend_not_normalized(world: &mut LoopDataWorld) {
    world.config_mut().trend.normalize = false;
}

#[given(expr = "the trend description for {word} is {string}")]
fn trend_description(world: &mut LoopDataWorld, name: String, text: String) {
    world.config_mut().trend.descriptions.insert(name, text);
}

#[given(expr = "the station time is {int}")]
fn station_time(world: &mut LoopDataWorld, epoch: i64) {
    world.base_time = Some(epoch);
}

#[when("I build the engine")]
fn build_engine(world: &mut LoopDataWorld) {
    let config = world.config_mut().clone();
    let units: Arc<dyn UnitFormatter> = Arc::new(
        StandardUnits::new(
            &config.units.group_overrides,
            &config.units.time_format,
            config.calendar.timezone,
        )
        .expect("units"),
    );
    match LoopDataEngine::new(&config, units) {
        Ok(engine) => {
            world.engine = Some(engine);
            world.last_error = None;
        }
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[then(expr = "building fails with {string}")]
fn building_fails(world: &mut LoopDataWorld, message: String) {
    let error = world
        .last_error
        .as_ref()
        .expect("engine construction should have failed");
    assert!(
        error.contains(&message),
        "expected '{}' in '{}'",
        message,
        error
    );
}

#[then(expr = "the engine renders {int} fields")]
fn engine_renders(world: &mut LoopDataWorld, count: usize) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
    assert_eq!(world.engine_mut().generator().fields().len(), count);
}
