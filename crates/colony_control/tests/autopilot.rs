//! Integration test: the life-support autopilot keeps a stuffy station going
//! through a day of hourly accounting.

use colony_control::{
    Command, CommandSource, CountingWallet, LifeSupportAutopilot, MemoryStore, StationHost,
};
use colony_core::test_fixtures::{base_content, base_station};
use colony_core::*;

fn run_hours(
    host: &mut StationHost<MemoryStore, CountingWallet>,
    autopilot: &mut LifeSupportAutopilot,
    hours: u32,
) {
    for _ in 0..hours {
        let commands = autopilot.generate_commands(host.station(), host.content());
        for command in commands {
            host.apply(command).unwrap();
        }
        host.advance_accounting(3600).unwrap();
    }
}

#[test]
fn autopilot_scrubs_co2_and_collects_work() {
    let content = base_content();
    let mut station = base_station(&content);
    station.air.co2 = 60.0;
    station.ledger.solar_panels[0].output_per_hour = 140.0;
    station.ledger.boxes[4].level = Level::new(100.0, 5.0);
    let mut host =
        StationHost::create(content, station, MemoryStore::new(), CountingWallet::new(0)).unwrap();

    host.apply(Command::BeginActivity(ActivityRequest {
        def_id: ActivityDefId("recipe_ration".to_string()),
        workers: vec![],
        module: None,
    }))
    .unwrap();

    let mut autopilot = LifeSupportAutopilot;
    run_hours(&mut host, &mut autopilot, 24);

    let station = host.station();
    assert!(station.air.co2 < 40.0, "co2 still {}", station.air.co2);
    assert!(station.activities.is_empty());
    assert!(station.ledger.invariants_hold());
    assert!(station.air.invariants_hold());
    assert!(host.store().save_count() > 24);

    let events = host.drain_events();
    assert!(events.iter().any(|e| matches!(
        e.event,
        Event::PeripheralUsed {
            kind: PeripheralKind::Scrubber,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e.event, Event::ActivityCollected { applied: true, .. })));
}

#[test]
fn autopilot_is_idle_without_energy() {
    let content = base_content();
    let mut station = base_station(&content);
    station.air.co2 = 60.0;
    station.ledger.batteries[0].level = Level::new(150.0, 50.0);

    let commands = LifeSupportAutopilot.generate_commands(&station, &content);

    assert!(commands.is_empty(), "unexpected {commands:?}");
}
