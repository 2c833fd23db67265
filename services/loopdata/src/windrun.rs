//! Wind run derived from consecutive loop packets

use crate::field::WINDRUN_BUCKET_PREFIX;
use crate::packet::{Packet, PacketKind, WIND_DIR, WIND_SPEED};
use crate::units::{compass_index, Unit, UnitGroup, COMPASS_POINTS};

pub const WINDRUN: &str = "windrun";

/// Adds `windrun` and `windrun_<POINT>` readings to loop packets
///
/// Each packet contributes the distance the wind travelled since the
/// previous loop packet, in the distance unit of the packet's unit system.
#[derive(Debug, Clone)]
pub struct WindrunTracker {
    max_interval: i64,
    last: Option<i64>,
}

impl WindrunTracker {
    pub fn new(max_interval: i64) -> Self {
        Self {
            max_interval,
            last: None,
        }
    }

    /// Insert the derived readings into `packet`
    ///
    /// Returns the distance that was added, if any.
    pub fn apply(&mut self, packet: &mut Packet) -> Option<f64> {
        if packet.kind != PacketKind::Loop {
            return None;
        }
        let previous = self.last.replace(packet.date_time)?;
        let elapsed = packet.date_time - previous;
        if elapsed <= 0 || elapsed > self.max_interval {
            return None;
        }

        let speed = packet.value(WIND_SPEED)?;
        let speed_unit = packet.us_units.unit_for(UnitGroup::Speed);
        let distance_unit = packet.us_units.unit_for(UnitGroup::Distance);
        let km = speed_unit.to_base(speed) * elapsed as f64 / 3600.0;
        let distance = distance_unit.from_base(Unit::Km.to_base(km));

        packet.set(WINDRUN, Some(distance));
        if speed > 0.0 {
            if let Some(direction) = packet.value(WIND_DIR) {
                let point = COMPASS_POINTS[compass_index(direction)];
                packet.set(&format!("{}{}", WINDRUN_BUCKET_PREFIX, point), Some(distance));
            }
        }
        Some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitSystem;

    fn loop_packet(ts: i64, system: UnitSystem, speed: f64, dir: f64) -> Packet {
        Packet::new(ts, system)
            .with(WIND_SPEED, speed)
            .with(WIND_DIR, dir)
    }

    #[test]
    fn test_first_packet_contributes_nothing() {
        let mut tracker = WindrunTracker::new(300);
        let mut pkt = loop_packet(1_000, UnitSystem::Us, 10.0, 90.0);
        assert_eq!(tracker.apply(&mut pkt), None);
        assert_eq!(pkt.value(WINDRUN), None);
    }

    #[test]
    fn test_miles_from_mph() {
        let mut tracker = WindrunTracker::new(300);
        tracker.apply(&mut loop_packet(1_000, UnitSystem::Us, 10.0, 90.0));
        let mut pkt = loop_packet(1_180, UnitSystem::Us, 10.0, 67.0);
        let distance = tracker.apply(&mut pkt).unwrap();
        assert!((distance - 0.5).abs() < 1e-9);
        assert_eq!(pkt.value(WINDRUN), Some(distance));
        assert_eq!(pkt.value("windrun_ENE"), Some(distance));
        assert_eq!(pkt.value("windrun_E"), None);
    }

    #[test]
    fn test_km_from_meters_per_second() {
        let mut tracker = WindrunTracker::new(300);
        tracker.apply(&mut loop_packet(0, UnitSystem::MetricWx, 5.0, 0.0));
        let mut pkt = loop_packet(200, UnitSystem::MetricWx, 5.0, 0.0);
        let distance = tracker.apply(&mut pkt).unwrap();
        assert!((distance - 1.0).abs() < 1e-9);
        assert!(pkt.value("windrun_N").is_some());
    }

    #[test]
    fn test_gap_contributes_nothing() {
        let mut tracker = WindrunTracker::new(300);
        tracker.apply(&mut loop_packet(0, UnitSystem::Us, 10.0, 90.0));
        let mut pkt = loop_packet(301, UnitSystem::Us, 10.0, 90.0);
        assert_eq!(tracker.apply(&mut pkt), None);
        let mut pkt = loop_packet(302, UnitSystem::Us, 36.0, 90.0);
        assert!((tracker.apply(&mut pkt).unwrap() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_calm_wind_has_no_bucket() {
        let mut tracker = WindrunTracker::new(300);
        tracker.apply(&mut loop_packet(0, UnitSystem::Us, 0.0, 90.0));
        let mut pkt = loop_packet(2, UnitSystem::Us, 0.0, 90.0);
        assert_eq!(tracker.apply(&mut pkt), Some(0.0));
        assert_eq!(pkt.value("windrun_E"), None);
    }

    #[test]
    fn test_archive_packets_are_ignored() {
        let mut tracker = WindrunTracker::new(300);
        tracker.apply(&mut loop_packet(0, UnitSystem::Us, 10.0, 90.0));
        let mut archive =
            loop_packet(100, UnitSystem::Us, 10.0, 90.0).with_kind(PacketKind::Archive);
        assert_eq!(tracker.apply(&mut archive), None);
        let mut pkt = loop_packet(200, UnitSystem::Us, 18.0, 90.0);
        assert!((tracker.apply(&mut pkt).unwrap() - 1.0).abs() < 1e-9);
    }
}
