//! One-shot peripheral transformations (electrolysis, methanation, filtering).
//!
//! A peripheral kind is resolved once into an `InstantRecipe` at the call
//! boundary; `process` then runs the recipe against the ledger and air.
//! The energy charge and the transformation are not atomic: once inputs are
//! deducted they stay deducted, even when no output container exists.

use std::fmt;

use crate::air::AirComposition;
use crate::ledger::ResourceLedger;
use crate::{
    Event, EventEnvelope, Fluid, Ingredient, ModuleChange, PeripheralId, PeripheralKind,
    Resource, StationState,
};

/// Energy drawn by every instant use.
pub const INSTANT_USE_ENERGY: f32 = 100.0;

/// Units moved per instant use.
const BATCH: f32 = 10.0;

/// Where a recipe input is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Air(Fluid),
    Tank(Fluid),
    Box(Ingredient),
}

/// Where a recipe output is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Air(Fluid),
    Tank(Fluid),
    Box(Ingredient),
}

impl Source {
    fn resource(self) -> Resource {
        match self {
            Source::Air(fluid) | Source::Tank(fluid) => Resource::Fluid(fluid),
            Source::Box(ingredient) => Resource::Ingredient(ingredient),
        }
    }
}

impl Destination {
    fn resource(self) -> Resource {
        match self {
            Destination::Air(fluid) | Destination::Tank(fluid) => Resource::Fluid(fluid),
            Destination::Box(ingredient) => Resource::Ingredient(ingredient),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstantRecipe {
    pub kind: PeripheralKind,
    pub energy_cost: f32,
    pub inputs: Vec<(Source, f32)>,
    /// Applied in order; the first missing destination skips the rest.
    pub outputs: Vec<(Destination, f32)>,
}

/// Output fraction for filtering peripherals: 50% plus 10% per level, capped at 100%.
pub fn conversion_yield(level: u8) -> f32 {
    (0.5 + 0.1 * f32::from(level)).min(1.0)
}

impl InstantRecipe {
    /// Resolves the fixed transformation for `kind`. Kinds without one are
    /// rejected here, before anything is mutated.
    pub fn for_peripheral(kind: PeripheralKind, level: u8) -> Result<Self, PeripheralError> {
        let (inputs, outputs) = match kind {
            PeripheralKind::Scrubber => (vec![(Source::Air(Fluid::CarbonDioxide), 4.0)], vec![]),
            PeripheralKind::Electrolyzer => (
                vec![(Source::Tank(Fluid::Water), BATCH)],
                vec![
                    (Destination::Tank(Fluid::Hydrogen), BATCH),
                    (Destination::Air(Fluid::Oxygen), BATCH / 2.0),
                ],
            ),
            PeripheralKind::Methanizer => (
                vec![
                    (Source::Air(Fluid::CarbonDioxide), BATCH),
                    (Source::Tank(Fluid::Hydrogen), BATCH),
                ],
                vec![
                    (Destination::Tank(Fluid::Methane), BATCH),
                    (Destination::Tank(Fluid::Oxygen), BATCH),
                ],
            ),
            PeripheralKind::WaterFilter => (
                vec![(Source::Box(Ingredient::WasteLiquid), BATCH)],
                vec![(
                    Destination::Tank(Fluid::Water),
                    conversion_yield(level) * BATCH,
                )],
            ),
            PeripheralKind::BioSolidifier => (
                vec![(Source::Box(Ingredient::WasteSolid), BATCH)],
                vec![(
                    Destination::Box(Ingredient::Fertilizer),
                    conversion_yield(level) * BATCH,
                )],
            ),
            PeripheralKind::Heater | PeripheralKind::Radiator | PeripheralKind::Refrigerator => {
                return Err(PeripheralError::UnsupportedInstantUse(kind));
            }
        };
        Ok(Self {
            kind,
            energy_cost: INSTANT_USE_ENERGY,
            inputs,
            outputs,
        })
    }
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeripheralError {
    #[error("peripheral {0} does not exist")]
    UnknownPeripheral(PeripheralId),
    #[error("peripheral {0} is broken")]
    PeripheralBroken(PeripheralId),
    #[error("{0:?} has no instant-use recipe")]
    UnsupportedInstantUse(PeripheralKind),
    #[error("no single battery holds {required} energy")]
    InsufficientEnergy { required: f32 },
}

/// Non-fatal problem recorded while running a recipe.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    NoSourceContainer {
        resource: Resource,
    },
    InsufficientResource {
        resource: Resource,
        required: f32,
        available: f32,
    },
    /// Inputs were already deducted and are lost.
    NoDestinationContainer {
        resource: Resource,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::NoSourceContainer { resource } => write!(f, "no container holds {resource}"),
            Issue::InsufficientResource {
                resource,
                required,
                available,
            } => write!(
                f,
                "not enough {resource}: needs {required:.1}, has {available:.1}"
            ),
            Issue::NoDestinationContainer { resource } => write!(
                f,
                "no container for {resource}; processed input was discarded"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResult {
    pub messages: Vec<String>,
    pub issues: Vec<Issue>,
    pub energy_spent: f32,
    /// Output that did not fit its destination.
    pub discarded: Vec<(Resource, f32)>,
}

impl ProcessResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

fn largest(values: impl Iterator<Item = f32>) -> Option<f32> {
    values.fold(None, |best, v| Some(best.map_or(v, |b: f32| b.max(v))))
}

/// Quantity in the source that would be drained, or `None` when no
/// container of that type exists.
fn available(source: Source, ledger: &ResourceLedger, air: &AirComposition) -> Option<f32> {
    match source {
        Source::Air(fluid) => air.component(fluid),
        Source::Tank(fluid) => largest(
            ledger
                .tanks
                .iter()
                .filter(|t| t.fluid == fluid)
                .map(|t| t.level.current),
        ),
        Source::Box(ingredient) => largest(
            ledger
                .boxes
                .iter()
                .filter(|b| b.ingredient == ingredient)
                .map(|b| b.level.current),
        ),
    }
}

fn deduct(source: Source, amount: f32, ledger: &mut ResourceLedger, air: &mut AirComposition) {
    match source {
        Source::Air(fluid) => {
            air.withdraw(fluid, amount);
        }
        Source::Tank(fluid) => {
            if let Some(tank) = ledger.fullest_tank_mut(fluid) {
                tank.level.withdraw(amount);
            }
        }
        Source::Box(ingredient) => {
            if let Some(storage) = ledger.fullest_box_mut(ingredient) {
                storage.level.withdraw(amount);
            }
        }
    }
}

/// Delivers into the emptiest matching container. Returns the capped overflow,
/// or `None` when no destination exists.
fn deliver(
    destination: Destination,
    amount: f32,
    ledger: &mut ResourceLedger,
    air: &mut AirComposition,
) -> Option<f32> {
    match destination {
        Destination::Air(fluid) => air.add(fluid, amount).then_some(0.0),
        Destination::Tank(fluid) => ledger
            .emptiest_tank_mut(fluid)
            .map(|tank| tank.level.deposit(amount)),
        Destination::Box(ingredient) => ledger
            .emptiest_box_mut(ingredient)
            .map(|storage| storage.level.deposit(amount)),
    }
}

/// Runs a resolved recipe. Only an energy shortfall fails the call; every
/// later problem is recorded as an issue on the result.
pub fn process(
    recipe: &InstantRecipe,
    ledger: &mut ResourceLedger,
    air: &mut AirComposition,
) -> Result<ProcessResult, PeripheralError> {
    if ledger.draw_energy(recipe.energy_cost).is_none() {
        return Err(PeripheralError::InsufficientEnergy {
            required: recipe.energy_cost,
        });
    }
    let mut result = ProcessResult {
        energy_spent: recipe.energy_cost,
        ..ProcessResult::default()
    };

    for &(source, required) in &recipe.inputs {
        match available(source, ledger, air) {
            None => {
                result.issues.push(Issue::NoSourceContainer {
                    resource: source.resource(),
                });
                return Ok(result);
            }
            Some(have) if have < required => {
                result.issues.push(Issue::InsufficientResource {
                    resource: source.resource(),
                    required,
                    available: have,
                });
                return Ok(result);
            }
            Some(_) => {}
        }
    }

    for &(source, amount) in &recipe.inputs {
        deduct(source, amount, ledger, air);
        result
            .messages
            .push(format!("consumed {amount:.1} {}", source.resource()));
    }

    for &(destination, amount) in &recipe.outputs {
        let resource = destination.resource();
        let Some(overflow) = deliver(destination, amount, ledger, air) else {
            result
                .issues
                .push(Issue::NoDestinationContainer { resource });
            break;
        };
        result
            .messages
            .push(format!("produced {:.1} {resource}", amount - overflow));
        if overflow > 0.0 {
            result
                .messages
                .push(format!("discarded {overflow:.1} {resource}: container full"));
            result.discarded.push((resource, overflow));
        }
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// Station operations
// ---------------------------------------------------------------------------

/// Runs the instant-use recipe of a station peripheral.
pub fn instant_use(
    station: &mut StationState,
    peripheral_id: &PeripheralId,
    events: &mut Vec<EventEnvelope>,
) -> Result<ProcessResult, PeripheralError> {
    let Some(peripheral) = station.peripherals.iter().find(|p| &p.id == peripheral_id) else {
        return Err(PeripheralError::UnknownPeripheral(peripheral_id.clone()));
    };
    if peripheral.broken {
        return Err(PeripheralError::PeripheralBroken(peripheral_id.clone()));
    }
    let recipe = InstantRecipe::for_peripheral(peripheral.kind, peripheral.level)?;

    let result = process(&recipe, &mut station.ledger, &mut station.air)?;

    let clock = station.meta.clock_secs;
    events.push(crate::emit(
        &mut station.counters,
        clock,
        Event::PeripheralUsed {
            peripheral_id: peripheral_id.clone(),
            kind: recipe.kind,
            energy_spent: result.energy_spent,
        },
    ));
    for &(resource, amount) in &result.discarded {
        events.push(crate::emit(
            &mut station.counters,
            clock,
            Event::ResourceDiscarded { resource, amount },
        ));
    }
    Ok(result)
}

pub fn set_power(
    station: &mut StationState,
    peripheral_id: &PeripheralId,
    on: bool,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), PeripheralError> {
    let Some(peripheral) = station
        .peripherals
        .iter_mut()
        .find(|p| &p.id == peripheral_id)
    else {
        return Err(PeripheralError::UnknownPeripheral(peripheral_id.clone()));
    };
    if peripheral.power_on == on {
        return Ok(());
    }
    peripheral.power_on = on;
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ModuleChanged {
            change: ModuleChange::PeripheralPowered,
            target: peripheral_id.0.clone(),
        },
    ));
    Ok(())
}

pub fn repair(
    station: &mut StationState,
    peripheral_id: &PeripheralId,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), PeripheralError> {
    let Some(peripheral) = station
        .peripherals
        .iter_mut()
        .find(|p| &p.id == peripheral_id)
    else {
        return Err(PeripheralError::UnknownPeripheral(peripheral_id.clone()));
    };
    peripheral.broken = false;
    peripheral.last_fixed_at = now;
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ModuleChanged {
            change: ModuleChange::PeripheralRepaired,
            target: peripheral_id.0.clone(),
        },
    ));
    Ok(())
}
