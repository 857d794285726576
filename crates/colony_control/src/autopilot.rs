use colony_core::peripheral::INSTANT_USE_ENERGY;
use colony_core::scheduler::finished_activities;
use colony_core::{
    ActivityId, Fluid, GameContent, Ingredient, PeripheralId, PeripheralKind, ResourceLedger,
    StationState,
};

use crate::{Command, CommandSource};

/// Units an instant recipe moves; the autopilot skips uses that would fall short.
const BATCH: f32 = 10.0;
const SCRUB_BATCH: f32 = 4.0;

/// Keeps the habitat breathable without a player:
/// 1. Collect finished activities.
/// 2. Repair broken peripherals.
/// 3. Scrub CO₂ above the threshold.
/// 4. Electrolyze water while O₂ is below the threshold.
/// 5. Recycle waste into water and fertilizer.
///
/// Each peripheral kind runs at most once per call, and only while the
/// batteries can still cover a whole instant-use draw.
pub struct LifeSupportAutopilot;

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Number of instant uses the batteries can pay for without splitting a draw.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn affordable_uses(ledger: &ResourceLedger) -> u32 {
    ledger
        .batteries
        .iter()
        .map(|b| (b.level.current / INSTANT_USE_ENERGY).floor() as u32)
        .sum()
}

fn working(station: &StationState, kind: PeripheralKind) -> Option<PeripheralId> {
    station
        .peripherals
        .iter()
        .find(|p| p.kind == kind && !p.broken)
        .map(|p| p.id.clone())
}

fn fullest_tank(ledger: &ResourceLedger, fluid: Fluid) -> f32 {
    ledger
        .tanks
        .iter()
        .filter(|t| t.fluid == fluid)
        .map(|t| t.level.current)
        .fold(0.0, f32::max)
}

/// Headroom of the tank an instant use would deliver into.
fn tank_room(ledger: &ResourceLedger, fluid: Fluid) -> f32 {
    ledger.emptiest_tank(fluid).map_or(0.0, |t| t.level.headroom())
}

fn fullest_box(ledger: &ResourceLedger, ingredient: Ingredient) -> f32 {
    ledger
        .boxes
        .iter()
        .filter(|b| b.ingredient == ingredient)
        .map(|b| b.level.current)
        .fold(0.0, f32::max)
}

fn box_room(ledger: &ResourceLedger, ingredient: Ingredient) -> f32 {
    ledger.emptiest_box(ingredient).map_or(0.0, |b| b.level.headroom())
}

/// Peripheral uses worth running right now, in priority order.
fn life_support_uses(station: &StationState, content: &GameContent) -> Vec<PeripheralKind> {
    let constants = &content.constants;
    let air = &station.air;
    let ledger = &station.ledger;
    let mut wanted = Vec::new();

    if air.co2 > constants.autopilot_co2_threshold && air.co2 >= SCRUB_BATCH {
        wanted.push(PeripheralKind::Scrubber);
    }
    if air.o2 < constants.autopilot_o2_threshold
        && fullest_tank(ledger, Fluid::Water) >= BATCH
        && tank_room(ledger, Fluid::Hydrogen) >= BATCH
    {
        wanted.push(PeripheralKind::Electrolyzer);
    }
    if fullest_box(ledger, Ingredient::WasteLiquid) >= BATCH && tank_room(ledger, Fluid::Water) > 0.0
    {
        wanted.push(PeripheralKind::WaterFilter);
    }
    if fullest_box(ledger, Ingredient::WasteSolid) >= BATCH
        && box_room(ledger, Ingredient::Fertilizer) > 0.0
    {
        wanted.push(PeripheralKind::BioSolidifier);
    }
    wanted
}

/// The running activity that finishes soonest, if any is still unfinished.
pub fn boost_candidate(station: &StationState) -> Option<ActivityId> {
    let now = station.meta.clock_secs;
    station
        .activities
        .iter()
        .filter(|a| a.ends_at > now)
        .min_by_key(|a| a.ends_at)
        .map(|a| a.id.clone())
}

// ---------------------------------------------------------------------------
// LifeSupportAutopilot
// ---------------------------------------------------------------------------

impl CommandSource for LifeSupportAutopilot {
    fn generate_commands(&mut self, station: &StationState, content: &GameContent) -> Vec<Command> {
        let mut commands: Vec<Command> = finished_activities(station, station.meta.clock_secs)
            .into_iter()
            .map(|activity_id| Command::CollectActivity { activity_id })
            .collect();

        commands.extend(
            station
                .peripherals
                .iter()
                .filter(|p| p.broken)
                .map(|p| Command::Repair {
                    peripheral_id: p.id.clone(),
                }),
        );

        let mut budget = affordable_uses(&station.ledger);
        for kind in life_support_uses(station, content) {
            if budget == 0 {
                break;
            }
            if let Some(peripheral_id) = working(station, kind) {
                commands.push(Command::InstantUse { peripheral_id });
                budget -= 1;
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::test_fixtures::{base_content, base_station};
    use colony_core::Level;

    fn uses(commands: &[Command]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::InstantUse { peripheral_id } => Some(peripheral_id.0.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn calm_station_needs_nothing_but_recycling() {
        let content = base_content();
        let station = base_station(&content);

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);

        assert_eq!(uses(&commands), vec!["periph_water_filter".to_string()]);
    }

    #[test]
    fn high_co2_triggers_scrubber_first() {
        let content = base_content();
        let mut station = base_station(&content);
        station.air.co2 = 45.0;

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);

        assert_eq!(uses(&commands)[0], "periph_scrubber");
    }

    #[test]
    fn electrolyzer_waits_for_a_hydrogen_tank_with_room() {
        let content = base_content();
        let mut station = base_station(&content);
        station.air.o2 = 20.0;
        station.ledger.tanks[1].level = Level::new(100.0, 95.0);

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);
        assert!(!uses(&commands).contains(&"periph_electrolyzer".to_string()));

        station.ledger.tanks[1].level = Level::new(100.0, 0.0);
        let commands = LifeSupportAutopilot.generate_commands(&station, &content);
        assert!(uses(&commands).contains(&"periph_electrolyzer".to_string()));
    }

    #[test]
    fn room_is_measured_on_the_tank_that_would_receive() {
        let content = base_content();
        let mut station = base_station(&content);
        station.air.o2 = 20.0;
        // The small tank holds less, so it receives the hydrogen.
        station.ledger.tanks[1].level = Level::new(12.0, 8.0);
        station.ledger.tanks.push(colony_core::Tank {
            id: colony_core::TankId("tank_hydrogen_big".to_string()),
            fluid: Fluid::Hydrogen,
            level: Level::new(500.0, 20.0),
        });

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);
        assert!(!uses(&commands).contains(&"periph_electrolyzer".to_string()));

        station.ledger.tanks[1].level = Level::new(12.0, 0.0);
        let commands = LifeSupportAutopilot.generate_commands(&station, &content);
        assert!(uses(&commands).contains(&"periph_electrolyzer".to_string()));
    }

    #[test]
    fn boost_goes_to_the_activity_closest_to_done() {
        let content = base_content();
        let mut station = base_station(&content);
        assert_eq!(boost_candidate(&station), None);

        let mut events = Vec::new();
        for (def, worker, module) in [
            ("recipe_battery", "worker_ada", Some("module_workshop")),
            ("research_methanizer", "worker_lin", Some("module_lab")),
        ] {
            colony_core::begin_activity(
                &mut station,
                &content,
                &colony_core::ActivityRequest {
                    def_id: colony_core::ActivityDefId(def.to_string()),
                    workers: vec![colony_core::WorkerId(worker.to_string())],
                    module: module.map(|m| colony_core::ModuleId(m.to_string())),
                },
                0,
                &mut events,
            )
            .unwrap();
        }
        let battery = station.activities[0].clone();
        assert!(battery.ends_at < station.activities[1].ends_at);
        assert_eq!(boost_candidate(&station), Some(battery.id.clone()));

        station.meta.clock_secs = battery.ends_at;
        assert_eq!(boost_candidate(&station), Some(station.activities[1].id.clone()));
    }

    #[test]
    fn battery_budget_limits_uses() {
        let content = base_content();
        let mut station = base_station(&content);
        station.air.co2 = 45.0;
        station.air.o2 = 20.0;
        station.ledger.batteries[0].level = Level::new(150.0, 120.0);

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);

        assert_eq!(uses(&commands), vec!["periph_scrubber".to_string()]);
    }

    #[test]
    fn broken_peripherals_are_repaired_not_used() {
        let content = base_content();
        let mut station = base_station(&content);
        station.air.co2 = 45.0;
        station.peripherals[0].broken = true;

        let commands = LifeSupportAutopilot.generate_commands(&station, &content);

        assert!(matches!(commands[0], Command::Repair { .. }));
        assert!(!uses(&commands).contains(&"periph_scrubber".to_string()));
    }
}
