#[cfg(not(miri))] // Skip property tests under miri as they're too slow
use loopdata::field::Aggregate;
#[cfg(not(miri))]
use loopdata::trend::classify;
#[cfg(not(miri))]
use loopdata::units::Unit;
#[cfg(not(miri))]
use loopdata::window::{Polar, ScalarWindow, VectorWindow};
#[cfg(not(miri))]
use loopdata::FieldDescriptor;
#[cfg(not(miri))]
use proptest::prelude::*;
#[cfg(not(miri))]
use std::time::Duration;

#[cfg(not(miri))]
fn observation() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["outTemp", "barometer", "rain", "wind", "windSpeed", "UV"])
        .prop_map(str::to_string)
}

#[cfg(not(miri))]
fn period() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u32..1_000, prop::sample::select(vec!["m", "h"]))
            .prop_map(|(n, unit)| format!("{}{}", n, unit)),
        prop::sample::select(vec!["hour", "day", "week", "month", "year", "rainyear", "alltime"])
            .prop_map(str::to_string),
    ]
}

#[cfg(not(miri))]
proptest! {
    #[test]
    fn test_window_holds_only_recent_readings(
        retention in 1i64..10_000,
        steps in prop::collection::vec(0i64..600, 1..200),
    ) {
        let mut window = ScalarWindow::new(retention);
        let mut now = 1_600_000_000i64;
        for (i, step) in steps.iter().enumerate() {
            now += step;
            window.ingest(now, i as f64);
            window.trim(now);
            prop_assert!(window.iter().all(|r| r.timestamp >= now - retention));
            prop_assert_eq!(window.last().map(|r| r.timestamp), Some(now));
        }
    }

    #[test]
    fn test_rms_is_at_least_mean_magnitude(values in prop::collection::vec(-1_000.0f64..1_000.0, 1..100)) {
        let mut window = ScalarWindow::new(i64::MAX / 2);
        for (i, value) in values.iter().enumerate() {
            window.ingest(i as i64, *value);
        }
        let rms = window.rms().unwrap();
        let avg = window.avg().unwrap();
        prop_assert!(rms + 1e-9 >= avg.abs());
        let (max, _) = window.max().unwrap();
        let (min, _) = window.min().unwrap();
        prop_assert!(min <= avg + 1e-9 && avg <= max + 1e-9);
    }

    #[test]
    fn test_wind_rms_is_at_least_mean_speed(
        speeds in prop::collection::vec((0.0f64..100.0, 0.0f64..360.0), 1..100),
    ) {
        let mut window = VectorWindow::new(i64::MAX / 2);
        for (i, (speed, direction)) in speeds.iter().enumerate() {
            window.ingest_speed(i as i64, Polar::new(*speed, Some(*direction)));
        }
        let rms = window.rms().unwrap();
        let avg = window.avg().unwrap();
        prop_assert!(rms + 1e-9 >= avg);
        // The vector average can never exceed the scalar average
        prop_assert!(window.vector_avg().unwrap() <= avg + 1e-9);
    }

    #[test]
    fn test_trend_classification_is_monotonic(a in -20.0f64..20.0, b in -20.0f64..20.0) {
        let three_hours = Duration::from_secs(3 * 3600);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_code = classify(low, Unit::Mbar, three_hours).code();
        let high_code = classify(high, Unit::Mbar, three_hours).code();
        prop_assert!(low_code <= high_code);
    }

    #[test]
    fn test_trend_classification_is_symmetric(delta in 0.0f64..20.0) {
        let three_hours = Duration::from_secs(3 * 3600);
        let up = classify(delta, Unit::Mbar, three_hours).code();
        let down = classify(-delta, Unit::Mbar, three_hours).code();
        prop_assert_eq!(up, -down);
    }

    #[test]
    fn test_aggregate_identifiers_round_trip(
        period in period(),
        observation in observation(),
        aggregate in prop::sample::select(Aggregate::ALL.to_vec()),
        raw in any::<bool>(),
    ) {
        let mut field = format!("{}.{}.{}", period, observation, aggregate);
        if raw {
            field.push_str(".raw");
        }
        let descriptor = FieldDescriptor::parse(&field).unwrap();
        prop_assert_eq!(descriptor.kind().to_string(), field);
        prop_assert_eq!(descriptor.aggregate(), Some(aggregate));
    }
}
