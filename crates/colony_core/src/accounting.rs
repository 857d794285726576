//! Offline catch-up: reconciles energy and life support over elapsed time.
//!
//! A pass walks the interval in fixed periods so a long absence produces the
//! same state as the equivalent sequence of short ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::air::AirComposition;
use crate::{Event, EventEnvelope, Fluid, GameContent, Ingredient, StationState};

const SECS_PER_HOUR: f32 = 3600.0;
const DEFAULT_PERIOD_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Problem {
    EnergyShortfall { missing: f32 },
    OxygenShortage { missing: f32 },
    WaterShortage { missing: f32 },
    FoodShortage { missing: f32 },
    /// Forecast: the crew will use up the habitat's oxygen within `hours`.
    OxygenRunningOut { hours: f32 },
}

impl Problem {
    fn merge(&mut self, other: Problem) -> bool {
        match (self, other) {
            (Problem::EnergyShortfall { missing }, Problem::EnergyShortfall { missing: more })
            | (Problem::OxygenShortage { missing }, Problem::OxygenShortage { missing: more })
            | (Problem::WaterShortage { missing }, Problem::WaterShortage { missing: more })
            | (Problem::FoodShortage { missing }, Problem::FoodShortage { missing: more }) => {
                *missing += more;
                true
            }
            (Problem::OxygenRunningOut { hours }, Problem::OxygenRunningOut { hours: other }) => {
                *hours = hours.min(other);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::EnergyShortfall { missing } => {
                write!(f, "batteries ran dry, {missing:.1} energy short")
            }
            Problem::OxygenShortage { missing } => {
                write!(f, "crew lacked {missing:.1} oxygen")
            }
            Problem::WaterShortage { missing } => write!(f, "crew lacked {missing:.1} water"),
            Problem::FoodShortage { missing } => write!(f, "crew lacked {missing:.1} food"),
            Problem::OxygenRunningOut { hours } => {
                write!(f, "oxygen depleted in {hours:.0} hours")
            }
        }
    }
}

/// Aggregate levels at one instant, for before/after comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub energy: f32,
    pub energy_capacity: f32,
    pub water: f32,
    pub food: f32,
    pub air: AirComposition,
}

impl Snapshot {
    pub fn capture(station: &StationState) -> Self {
        Self {
            energy: station.ledger.stored_energy(),
            energy_capacity: station.ledger.energy_capacity(),
            water: station.ledger.total_fluid(Fluid::Water),
            food: station.ledger.total_ingredient(Ingredient::Food),
            air: station.air,
        }
    }
}

/// Flows of one accounting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodDelta {
    pub index: u32,
    pub secs: u64,
    pub energy_produced: f32,
    pub energy_consumed: f32,
    pub energy_discarded: f32,
    pub oxygen_consumed: f32,
    pub co2_exhaled: f32,
    pub water_consumed: f32,
    pub food_consumed: f32,
    pub waste_discarded: f32,
    pub problems: Vec<Problem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingReport {
    pub elapsed_secs: u64,
    pub periods: u32,
    pub start: Snapshot,
    pub end: Snapshot,
    pub problems: Vec<Problem>,
    pub notes: Vec<String>,
}

fn push_merged(problems: &mut Vec<Problem>, problem: Problem) {
    if !problems.iter_mut().any(|p| p.merge(problem)) {
        problems.push(problem);
    }
}

pub fn advance(
    station: &mut StationState,
    content: &GameContent,
    elapsed_secs: u64,
    events: &mut Vec<EventEnvelope>,
) -> AccountingReport {
    advance_with(station, content, elapsed_secs, events, |_| {})
}

/// Same as [`advance`], calling `on_period` after each period is applied.
pub fn advance_with(
    station: &mut StationState,
    content: &GameContent,
    elapsed_secs: u64,
    events: &mut Vec<EventEnvelope>,
    mut on_period: impl FnMut(&PeriodDelta),
) -> AccountingReport {
    let period_secs = match content.constants.accounting_period_secs {
        0 => DEFAULT_PERIOD_SECS,
        secs => secs,
    };
    let start = Snapshot::capture(station);
    let mut problems = Vec::new();
    let mut energy_discarded = 0.0;
    let mut waste_discarded = 0.0;
    let mut periods = 0u32;
    let mut remaining = elapsed_secs;

    while remaining > 0 {
        let secs = remaining.min(period_secs);
        let delta = run_period(station, content, periods, secs);
        energy_discarded += delta.energy_discarded;
        waste_discarded += delta.waste_discarded;
        for problem in &delta.problems {
            push_merged(&mut problems, *problem);
        }
        on_period(&delta);
        remaining -= secs;
        periods += 1;
    }

    if let Some(hours) = oxygen_forecast(station, content) {
        push_merged(&mut problems, Problem::OxygenRunningOut { hours });
    }

    let mut notes = Vec::new();
    if energy_discarded > 0.0 {
        notes.push(format!(
            "{energy_discarded:.1} energy discarded: batteries full"
        ));
    }
    if waste_discarded > 0.0 {
        notes.push(format!("{waste_discarded:.1} waste discarded: boxes full"));
    }

    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::AccountingCompleted {
            elapsed_secs,
            periods,
            problem_count: problems.len(),
        },
    ));

    AccountingReport {
        elapsed_secs,
        periods,
        start,
        end: Snapshot::capture(station),
        problems,
        notes,
    }
}

#[allow(clippy::cast_precision_loss)]
fn run_period(station: &mut StationState, content: &GameContent, index: u32, secs: u64) -> PeriodDelta {
    let constants = &content.constants;
    let hours = secs as f32 / SECS_PER_HOUR;
    let mut delta = PeriodDelta {
        index,
        secs,
        ..PeriodDelta::default()
    };

    // --- energy ---
    let peripheral_draw: f32 = station
        .peripherals
        .iter()
        .filter(|p| p.draws_power())
        .map(|p| content.peripheral_energy_per_hour(p.kind))
        .sum();
    let module_draw = station.modules.len() as f32 * constants.module_energy_per_hour;
    delta.energy_produced = station.ledger.solar_output_per_hour() * hours;
    delta.energy_consumed = (peripheral_draw + module_draw) * hours;

    let net = delta.energy_produced - delta.energy_consumed;
    if net >= 0.0 {
        delta.energy_discarded = station.ledger.charge(net);
    } else {
        let missing = station.ledger.discharge(-net);
        if missing > 0.0 {
            delta.problems.push(Problem::EnergyShortfall { missing });
        }
    }

    // --- inhabitants ---
    let crew = station.crew.len() as f32 * hours;
    if crew > 0.0 {
        let oxygen_need = constants.o2_per_inhabitant_per_hour * crew;
        let missing = station.air.drain(Fluid::Oxygen, oxygen_need);
        delta.oxygen_consumed = oxygen_need - missing;
        if missing > 0.0 {
            delta.problems.push(Problem::OxygenShortage { missing });
        }

        delta.co2_exhaled = constants.co2_per_inhabitant_per_hour * crew;
        station.air.add(Fluid::CarbonDioxide, delta.co2_exhaled);

        let water_need = constants.water_per_inhabitant_per_hour * crew;
        let missing = station.ledger.drain_fluid(Fluid::Water, water_need);
        delta.water_consumed = water_need - missing;
        if missing > 0.0 {
            delta.problems.push(Problem::WaterShortage { missing });
        }

        let food_need = constants.food_per_inhabitant_per_hour * crew;
        let missing = station.ledger.drain_ingredient(Ingredient::Food, food_need);
        delta.food_consumed = food_need - missing;
        if missing > 0.0 {
            delta.problems.push(Problem::FoodShortage { missing });
        }

        delta.waste_discarded = station.ledger.absorb_ingredient(
            Ingredient::WasteLiquid,
            constants.waste_liquid_per_inhabitant_per_hour * crew,
        ) + station.ledger.absorb_ingredient(
            Ingredient::WasteSolid,
            constants.waste_solid_per_inhabitant_per_hour * crew,
        );
    }

    station.meta.clock_secs += secs;
    delta
}

/// Hours until the crew exhausts habitat oxygen, when that falls inside the
/// warning window.
#[allow(clippy::cast_precision_loss)]
fn oxygen_forecast(station: &StationState, content: &GameContent) -> Option<f32> {
    let hourly = station.crew.len() as f32 * content.constants.o2_per_inhabitant_per_hour;
    if hourly <= 0.0 {
        return None;
    }
    let hours = station.air.o2 / hourly;
    (hours < content.constants.oxygen_warning_hours).then_some(hours)
}
