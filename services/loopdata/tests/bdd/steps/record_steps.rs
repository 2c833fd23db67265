use cucumber::then;
use loopdata::FieldValue;

use crate::world::LoopDataWorld;

#[then(expr = "field {string} is {string}")]
fn field_is_text(world: &mut LoopDataWorld, field: String, expected: String) {
    assert_eq!(
        world.record().get(&field),
        Some(&FieldValue::Text(expected)),
        "record: {:?}",
        world.record()
    );
}

#[then(expr = "field {string} is the integer {int}")]
fn field_is_integer(world: &mut LoopDataWorld, field: String, expected: i64) {
    assert_eq!(
        world.record().get(&field),
        Some(&FieldValue::Integer(expected)),
        "record: {:?}",
        world.record()
    );
}

#[then(expr = "field {string} is about {float}")]
fn field_is_about(world: &mut LoopDataWorld, field: String, expected: f64) {
    let value = world
        .record()
        .get(&field)
        .and_then(FieldValue::as_f64)
        .unwrap_or_else(|| panic!("no number for {}", field));
    assert!(
        (value - expected).abs() < 1e-6,
        "{} is {}, expected {}",
        field,
        value,
        expected
    );
}

#[then(expr = "field {string} is absent")]
fn field_is_absent(world: &mut LoopDataWorld, field: String) {
    assert!(
        !world.record().contains_key(&field),
        "{} unexpectedly present: {:?}",
        field,
        world.record()
    );
}

#[then("no record has been produced")]
fn no_record(world: &mut LoopDataWorld) {
    assert!(world.record.is_none(), "{:?}", world.record);
}
