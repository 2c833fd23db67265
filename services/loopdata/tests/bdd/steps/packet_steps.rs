use cucumber::gherkin::Step;
use cucumber::when;
use loopdata::packet::PacketKind;
use loopdata::units::UnitSystem;
use loopdata::Packet;

use crate::world::LoopDataWorld;

/// Build packets from a table whose first column is the offset in seconds
/// from the station time; empty cells are absent and `null` cells are null
fn packets_from_table(world: &LoopDataWorld, step: &Step, kind: PacketKind) -> Vec<Packet> {
    let table = step.table.as_ref().expect("packet table");
    let (header, rows) = table.rows.split_first().expect("table header");
    rows.iter()
        .map(|row| {
            let offset: i64 = row[0].trim().parse().expect("offset");
            let mut packet =
                Packet::new(world.base_time() + offset, UnitSystem::Us).with_kind(kind);
            for (name, cell) in header.iter().zip(row.iter()).skip(1) {
                match cell.trim() {
                    "" => {}
                    "null" => packet.set(name.trim(), None),
                    value => packet.set(name.trim(), Some(value.parse().expect("number"))),
                }
            }
            packet
        })
        .collect()
}

fn process_all(world: &mut LoopDataWorld, packets: Vec<Packet>) {
    for packet in packets {
        if let Some(record) = world.engine_mut().process(packet).expect("process packet") {
            world.record = Some(record);
        }
    }
}

#[when("the station sends loop packets:")]
fn station_sends_loop_packets(world: &mut LoopDataWorld, step: &Step) {
    let packets = packets_from_table(world, step, PacketKind::Loop);
    process_all(world, packets);
}

#[when("the station sends archive packets:")]
fn station_sends_archive_packets(world: &mut LoopDataWorld, step: &Step) {
    let packets = packets_from_table(world, step, PacketKind::Archive);
    process_all(world, packets);
}
