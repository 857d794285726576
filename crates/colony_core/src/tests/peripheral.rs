use super::*;

fn electrolyzer() -> PeripheralId {
    PeripheralId("periph_electrolyzer".to_string())
}

#[test]
fn electrolyzer_conserves_mass_and_charges_energy() {
    let content = base_content();
    let mut station = base_station(&content);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &electrolyzer(), &mut events).unwrap();

    assert!(result.is_clean(), "issues: {:?}", result.issues);
    assert_close(tank_level(&station, "tank_water"), 40.0);
    assert_close(tank_level(&station, "tank_hydrogen"), 10.0);
    assert_close(station.air.o2, 105.0);
    assert_close(station.ledger.stored_energy(), 50.0);
    assert!(events
        .iter()
        .any(|e| matches!(e.event, Event::PeripheralUsed { .. })));
}

#[test]
fn missing_destination_destroys_input() {
    let content = base_content();
    let mut station = base_station(&content);
    station
        .ledger
        .tanks
        .retain(|t| t.fluid != Fluid::Hydrogen);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &electrolyzer(), &mut events).unwrap();

    assert_close(tank_level(&station, "tank_water"), 40.0);
    assert_close(station.air.o2, 100.0);
    assert_close(station.ledger.stored_energy(), 50.0);
    assert_eq!(
        result.issues,
        vec![Issue::NoDestinationContainer {
            resource: Resource::Fluid(Fluid::Hydrogen)
        }]
    );
}

#[test]
fn short_source_keeps_energy_spent_but_leaves_inputs() {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.tanks[0].level = ledger::Level::new(100.0, 4.0);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &electrolyzer(), &mut events).unwrap();

    assert!(matches!(
        result.issues.as_slice(),
        [Issue::InsufficientResource { .. }]
    ));
    assert_close(tank_level(&station, "tank_water"), 4.0);
    assert_close(tank_level(&station, "tank_hydrogen"), 0.0);
    assert_close(station.ledger.stored_energy(), 50.0);
}

#[test]
fn no_battery_large_enough_rejects_before_mutation() {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.batteries[0].level = ledger::Level::new(150.0, 99.0);
    let before = station.ledger.clone();
    let mut events = Vec::new();

    let err = instant_use(&mut station, &electrolyzer(), &mut events).unwrap_err();

    assert_eq!(
        err,
        PeripheralError::InsufficientEnergy {
            required: crate::peripheral::INSTANT_USE_ENERGY
        }
    );
    assert_eq!(station.ledger, before);
    assert!(events.is_empty());
}

#[test]
fn energy_draw_is_never_split_across_batteries() {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.batteries = vec![
        ledger::Battery {
            id: BatteryId("battery_a".to_string()),
            level: ledger::Level::new(100.0, 60.0),
        },
        ledger::Battery {
            id: BatteryId("battery_b".to_string()),
            level: ledger::Level::new(100.0, 60.0),
        },
    ];
    let mut events = Vec::new();

    let err = instant_use(&mut station, &electrolyzer(), &mut events).unwrap_err();

    assert!(matches!(err, PeripheralError::InsufficientEnergy { .. }));
    assert_close(station.ledger.stored_energy(), 120.0);
}

#[test]
fn broken_and_unknown_peripherals_are_rejected() {
    let content = base_content();
    let mut station = base_station(&content);
    let mut events = Vec::new();

    let unknown = PeripheralId("periph_missing".to_string());
    assert_eq!(
        instant_use(&mut station, &unknown, &mut events).unwrap_err(),
        PeripheralError::UnknownPeripheral(unknown)
    );

    station.peripherals[1].broken = true;
    assert_eq!(
        instant_use(&mut station, &electrolyzer(), &mut events).unwrap_err(),
        PeripheralError::PeripheralBroken(electrolyzer())
    );

    let heater = PeripheralId("periph_heater".to_string());
    assert_eq!(
        instant_use(&mut station, &heater, &mut events).unwrap_err(),
        PeripheralError::UnsupportedInstantUse(PeripheralKind::Heater)
    );
    assert_close(station.ledger.stored_energy(), 150.0);
}

#[test]
fn water_filter_yield_scales_with_level() {
    let content = base_content();
    let mut station = base_station(&content);
    station.peripherals[2].level = 3;
    let mut events = Vec::new();

    instant_use(
        &mut station,
        &PeripheralId("periph_water_filter".to_string()),
        &mut events,
    )
    .unwrap();

    assert_close(box_level(&station, "box_waste_liquid"), 10.0);
    assert_close(tank_level(&station, "tank_water"), 58.0);
}

#[test]
fn overflow_is_discarded_and_reported() {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.tanks[1].level = ledger::Level::new(100.0, 95.0);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &electrolyzer(), &mut events).unwrap();

    assert_close(tank_level(&station, "tank_hydrogen"), 100.0);
    assert_eq!(result.discarded.len(), 1);
    assert_close(result.discarded[0].1, 5.0);
    assert!(events.iter().any(|e| matches!(
        e.event,
        Event::ResourceDiscarded {
            resource: Resource::Fluid(Fluid::Hydrogen),
            ..
        }
    )));
    assert!(station.ledger.invariants_hold());
}

#[test]
fn outputs_fill_the_emptiest_tank() {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.tanks.push(ledger::Tank {
        id: TankId("tank_hydrogen_b".to_string()),
        fluid: Fluid::Hydrogen,
        level: ledger::Level::new(100.0, 30.0),
    });
    station.ledger.tanks[1].level = ledger::Level::new(100.0, 40.0);
    let mut events = Vec::new();

    instant_use(&mut station, &electrolyzer(), &mut events).unwrap();

    assert_close(tank_level(&station, "tank_hydrogen"), 40.0);
    assert_close(tank_level(&station, "tank_hydrogen_b"), 40.0);
}

#[test]
fn power_and_repair_emit_module_changes() {
    let content = base_content();
    let mut station = base_station(&content);
    station.peripherals[1].broken = true;
    let mut events = Vec::new();

    crate::peripheral::set_power(&mut station, &electrolyzer(), false, &mut events).unwrap();
    crate::peripheral::repair(&mut station, &electrolyzer(), 500, &mut events).unwrap();

    let p = &station.peripherals[1];
    assert!(!p.power_on);
    assert!(!p.broken);
    assert_eq!(p.last_fixed_at, 500);
    assert_eq!(events.len(), 2);
    // Unpowered peripherals still run their instant recipe.
    assert!(instant_use(&mut station, &electrolyzer(), &mut events).is_ok());
}

fn install(station: &mut StationState, id: &str, kind: PeripheralKind) -> PeripheralId {
    let id = PeripheralId(id.to_string());
    station.peripherals.push(PeripheralState {
        id: id.clone(),
        kind,
        level: 1,
        power_on: true,
        broken: false,
        last_fixed_at: 0,
    });
    id
}

fn add_tank(station: &mut StationState, id: &str, fluid: Fluid) {
    station.ledger.tanks.push(ledger::Tank {
        id: TankId(id.to_string()),
        fluid,
        level: ledger::Level::empty(100.0),
    });
}

/// Methanizer fed with 20 CO₂ in air and 30 hydrogen in the tank.
fn methanizer_station() -> (StationState, PeripheralId) {
    let content = base_content();
    let mut station = base_station(&content);
    station.ledger.tanks[1].level = ledger::Level::new(100.0, 30.0);
    add_tank(&mut station, "tank_methane", Fluid::Methane);
    let id = install(&mut station, "periph_methanizer", PeripheralKind::Methanizer);
    (station, id)
}

#[test]
fn methanizer_fills_methane_and_oxygen_tanks() {
    let (mut station, methanizer) = methanizer_station();
    add_tank(&mut station, "tank_oxygen", Fluid::Oxygen);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &methanizer, &mut events).unwrap();

    assert!(result.is_clean(), "issues: {:?}", result.issues);
    assert_close(station.air.co2, 10.0);
    assert_close(tank_level(&station, "tank_hydrogen"), 20.0);
    assert_close(tank_level(&station, "tank_methane"), 10.0);
    assert_close(tank_level(&station, "tank_oxygen"), 10.0);
    assert_close(station.air.o2, 100.0);
    assert_close(station.ledger.stored_energy(), 50.0);
}

#[test]
fn methanizer_without_oxygen_tank_keeps_methane_and_loses_oxygen() {
    let (mut station, methanizer) = methanizer_station();
    let mut events = Vec::new();

    let result = instant_use(&mut station, &methanizer, &mut events).unwrap();

    assert_close(station.air.co2, 10.0);
    assert_close(tank_level(&station, "tank_hydrogen"), 20.0);
    assert_close(tank_level(&station, "tank_methane"), 10.0);
    assert_close(station.air.o2, 100.0);
    assert_eq!(
        result.issues,
        vec![Issue::NoDestinationContainer {
            resource: Resource::Fluid(Fluid::Oxygen)
        }]
    );
}

#[test]
fn methanizer_short_on_hydrogen_deducts_nothing() {
    let (mut station, methanizer) = methanizer_station();
    add_tank(&mut station, "tank_oxygen", Fluid::Oxygen);
    station.ledger.tanks[1].level = ledger::Level::new(100.0, 6.0);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &methanizer, &mut events).unwrap();

    assert_eq!(
        result.issues,
        vec![Issue::InsufficientResource {
            resource: Resource::Fluid(Fluid::Hydrogen),
            required: 10.0,
            available: 6.0,
        }]
    );
    assert_close(station.air.co2, 20.0);
    assert_close(tank_level(&station, "tank_hydrogen"), 6.0);
    assert_close(tank_level(&station, "tank_methane"), 0.0);
    assert_close(tank_level(&station, "tank_oxygen"), 0.0);
    assert_close(station.ledger.stored_energy(), 50.0);
}

#[test]
fn scrubber_removes_carbon_dioxide() {
    let content = base_content();
    let mut station = base_station(&content);
    let mut events = Vec::new();

    let result = instant_use(
        &mut station,
        &PeripheralId("periph_scrubber".to_string()),
        &mut events,
    )
    .unwrap();

    assert!(result.is_clean());
    assert_close(station.air.co2, 16.0);
    assert_close(station.air.o2, 100.0);
}

#[test]
fn bio_solidifier_turns_waste_into_fertilizer() {
    let content = base_content();
    let mut station = base_station(&content);
    let solidifier = install(&mut station, "periph_bio", PeripheralKind::BioSolidifier);
    let mut events = Vec::new();

    let result = instant_use(&mut station, &solidifier, &mut events).unwrap();

    assert!(result.is_clean());
    assert_close(box_level(&station, "box_waste_solid"), 10.0);
    // Level 1 converts 60% of the batch.
    assert_close(box_level(&station, "box_fertilizer"), 6.0);
}
