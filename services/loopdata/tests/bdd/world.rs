//! BDD test world for the loopdata service

use std::sync::Arc;

use cucumber::World;
use loopdata::units::{StandardUnits, UnitFormatter};
use loopdata::{Config, LoopDataEngine, OutputRecord};

#[derive(Debug, Default, World)]
pub struct LoopDataWorld {
    /// Packet offsets in feature tables are relative to this epoch time
    pub base_time: Option<i64>,
    pub config: Option<Config>,
    pub engine: Option<LoopDataEngine>,
    pub record: Option<OutputRecord>,
    pub last_error: Option<String>,
}

impl LoopDataWorld {
    pub fn config_mut(&mut self) -> &mut Config {
        self.config.get_or_insert_with(|| {
            serde_json::from_str(r#"{"calendar": {"timezone": "-07:00"}}"#)
                .expect("default test config")
        })
    }

    /// Build the engine from the configured fields on first use
    pub fn engine_mut(&mut self) -> &mut LoopDataEngine {
        if self.engine.is_none() {
            let config = self.config_mut().clone();
            let units: Arc<dyn UnitFormatter> = Arc::new(
                StandardUnits::new(
                    &config.units.group_overrides,
                    &config.units.time_format,
                    config.calendar.timezone,
                )
                .expect("units"),
            );
            self.engine = Some(LoopDataEngine::new(&config, units).expect("engine"));
        }
        self.engine.as_mut().expect("engine created")
    }

    pub fn base_time(&self) -> i64 {
        // 2020-07-04 10:17:34 -07:00
        self.base_time.unwrap_or(1_593_883_054)
    }

    pub fn record(&self) -> &OutputRecord {
        self.record.as_ref().expect("no record produced")
    }
}
