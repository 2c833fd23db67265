//! Startup seeding from historical readings
//!
//! Before the first live packet the engine is replayed with every stored
//! record that its windows and calendar spans would still contain, so a
//! restart does not begin with empty statistics.

use std::time::Duration;

use tracing::{info, warn};

use crate::engine::LoopDataEngine;
use crate::error::Result;
use crate::history::HistoricalReader;

/// Replay history up to `now` into `engine`
///
/// Returns the number of records replayed. Records that fail to ingest are
/// logged and skipped.
pub async fn seed(
    engine: &mut LoopDataEngine,
    reader: &dyn HistoricalReader,
    now: i64,
) -> Result<usize> {
    let Some(start) = engine.earliest_needed(now)? else {
        info!("No accumulators need seeding");
        return Ok(0);
    };
    let observations = engine.observations_needed();
    let records = reader
        .read_range(&observations, start, now.saturating_add(1))
        .await?;

    let mut replayed = 0;
    for record in records {
        let timestamp = record.date_time;
        match engine.ingest(record) {
            Ok(()) => replayed += 1,
            Err(e) => warn!("Skipping historical record at {}: {}", timestamp, e),
        }
    }

    let span = Duration::from_secs(now.saturating_sub(start).max(0) as u64);
    info!(
        "Seeded {} historical records covering {}",
        replayed,
        humantime::format_duration(span)
    );
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Zone;
    use crate::config::Config;
    use crate::field::{Aggregate, Period, SlidingPeriod};
    use crate::history::MockHistoricalReader;
    use crate::packet::Packet;
    use crate::units::{StandardUnits, UnitFormatter, UnitSystem};
    use crate::window::AggregateValue;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const NOW: i64 = 1_593_630_000;

    fn engine(fields: &[&str]) -> LoopDataEngine {
        let mut config: Config =
            serde_json::from_str(r#"{"calendar": {"timezone": "utc"}}"#).unwrap();
        config.fields = fields.iter().map(|s| s.to_string()).collect();
        let units: Arc<dyn UnitFormatter> =
            Arc::new(StandardUnits::new(&BTreeMap::new(), "%x %X", Zone::Utc).unwrap());
        LoopDataEngine::new(&config, units).unwrap()
    }

    #[tokio::test]
    async fn test_seed_replays_window() {
        let mut engine = engine(&["10m.outTemp.max"]);
        let mut reader = MockHistoricalReader::new();
        reader
            .expect_read_range()
            .withf(|observations, start, end| {
                observations.contains("outTemp") && *start == NOW - 600 && *end == NOW + 1
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    Packet::new(NOW - 300, UnitSystem::Us).with("outTemp", 80.0),
                    Packet::new(NOW - 60, UnitSystem::Us).with("outTemp", 75.0),
                ])
            });

        let replayed = seed(&mut engine, &reader, NOW).await.unwrap();
        assert_eq!(replayed, 2);
        assert_eq!(
            engine.accumulators().aggregate(
                Period::Sliding(SlidingPeriod::Minutes(10)),
                "outTemp",
                Aggregate::Max
            ),
            Some(AggregateValue::Value(80.0))
        );
    }

    #[tokio::test]
    async fn test_nothing_to_seed() {
        let mut engine = engine(&["current.outTemp"]);
        let mut reader = MockHistoricalReader::new();
        reader.expect_read_range().times(0);
        assert_eq!(seed(&mut engine, &reader, NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reader_error_propagates() {
        let mut engine = engine(&["day.outTemp.max"]);
        let mut reader = MockHistoricalReader::new();
        reader.expect_read_range().returning(|_, _, _| {
            Err(crate::LoopDataError::History("database offline".to_string()))
        });
        assert!(seed(&mut engine, &reader, NOW).await.is_err());
    }
}
