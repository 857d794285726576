//! Type definitions for `colony_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the simulation.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::air::AirComposition;
use crate::genetics::BioPopulation;
use crate::ledger::ResourceLedger;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(StationId);
string_id!(TankId);
string_id!(BoxId);
string_id!(BatteryId);
string_id!(PanelId);
string_id!(PeripheralId);
string_id!(ModuleId);
string_id!(WorkerId);
string_id!(ActivityId);
string_id!(ActivityDefId);
string_id!(BioBoxId);
string_id!(EventId);

/// Workers attached to a single activity. Crews rarely exceed four per job.
pub type WorkerList = SmallVec<[WorkerId; 4]>;

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Contents of a tank. The air-borne subset also appears in `AirComposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fluid {
    Water,
    Hydrogen,
    Oxygen,
    Methane,
    CarbonDioxide,
    Nitrogen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ingredient {
    Food,
    Metal,
    Plastic,
    Silicon,
    Polymer,
    WasteLiquid,
    WasteSolid,
    Fertilizer,
}

impl Ingredient {
    /// Waste boxes only ever receive from inhabitants; peripherals drain them.
    pub fn is_waste(self) -> bool {
        matches!(self, Ingredient::WasteLiquid | Ingredient::WasteSolid)
    }
}

/// Anything the ledger or air can hold, used for labelling issues and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Fluid(Fluid),
    Ingredient(Ingredient),
    Energy,
}

impl fmt::Display for Fluid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Fluid::Water => "water",
            Fluid::Hydrogen => "hydrogen",
            Fluid::Oxygen => "oxygen",
            Fluid::Methane => "methane",
            Fluid::CarbonDioxide => "carbon dioxide",
            Fluid::Nitrogen => "nitrogen",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Ingredient::Food => "food",
            Ingredient::Metal => "metal",
            Ingredient::Plastic => "plastic",
            Ingredient::Silicon => "silicon",
            Ingredient::Polymer => "polymer",
            Ingredient::WasteLiquid => "liquid waste",
            Ingredient::WasteSolid => "solid waste",
            Ingredient::Fertilizer => "fertilizer",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Fluid(fluid) => fluid.fmt(f),
            Resource::Ingredient(ingredient) => ingredient.fmt(f),
            Resource::Energy => f.write_str("energy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeripheralKind {
    Scrubber,
    Electrolyzer,
    Methanizer,
    WaterFilter,
    BioSolidifier,
    Heater,
    Radiator,
    Refrigerator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    Lab,
    Workshop,
    Biology,
    Habitat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Biology,
    Electric,
    Mechanical,
    Medical,
    Computer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Recipe,
    Research,
    Other,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationState {
    pub id: StationId,
    pub meta: MetaState,
    pub ledger: ResourceLedger,
    pub air: AirComposition,
    pub peripherals: Vec<PeripheralState>,
    pub modules: Vec<ProductionModule>,
    pub crew: Vec<Worker>,
    pub activities: Vec<Activity>,
    pub research: ResearchState,
    pub bio_boxes: Vec<BioBox>,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    /// Simulated seconds reconciled by accounting passes so far.
    pub clock_secs: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_activity_id: u64,
    pub next_entity_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralState {
    pub id: PeripheralId,
    pub kind: PeripheralKind,
    pub level: u8,
    pub power_on: bool,
    pub broken: bool,
    pub last_fixed_at: u64,
}

impl PeripheralState {
    /// Only powered, functional peripherals draw energy during accounting.
    pub fn draws_power(&self) -> bool {
        self.power_on && !self.broken
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionModule {
    pub id: ModuleId,
    pub kind: ModuleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevel {
    pub skill: Skill,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    /// Attributes are nominally 0–100; out-of-range values are clamped on use.
    pub intelligence: f32,
    pub happiness: f32,
    pub teamwork: f32,
    pub skills: Vec<SkillLevel>,
    /// Set while the worker is busy on an activity.
    pub activity: Option<ActivityId>,
}

impl Worker {
    pub fn skill_level(&self, skill: Skill) -> u32 {
        self.skills
            .iter()
            .filter(|s| s.skill == skill)
            .map(|s| s.level)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub def_id: ActivityDefId,
    pub kind: ActivityKind,
    pub started_at: u64,
    /// Always strictly greater than `started_at`.
    pub ends_at: u64,
    pub workers: WorkerList,
    pub module: Option<ModuleId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchState {
    pub completed: HashSet<ActivityDefId>,
    pub unlocked_peripherals: HashSet<PeripheralKind>,
    pub capabilities: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BioBox {
    pub id: BioBoxId,
    pub population: BioPopulation,
    /// Bumped every time an evolution run starts; results carrying an older
    /// version are discarded.
    pub run_version: u64,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    /// Station clock (accounted seconds) when the event was produced.
    pub clock_secs: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleChange {
    PeripheralAdded,
    PeripheralPowered,
    PeripheralRepaired,
    ModuleAdded,
    ContainerAdded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ModuleChanged {
        change: ModuleChange,
        target: String,
    },
    /// Presentation hint: something visible in the station scene changed.
    SceneUpdate {
        reason: String,
    },
    PeripheralUsed {
        peripheral_id: PeripheralId,
        kind: PeripheralKind,
        energy_spent: f32,
    },
    ResourceDiscarded {
        resource: Resource,
        amount: f32,
    },
    ActivityStarted {
        activity_id: ActivityId,
        def_id: ActivityDefId,
        ends_at: u64,
    },
    ActivityCollected {
        activity_id: ActivityId,
        def_id: ActivityDefId,
        applied: bool,
    },
    ActivityBoosted {
        activity_id: ActivityId,
        ends_at: u64,
    },
    ActivityAbandoned {
        activity_id: ActivityId,
    },
    AccountingCompleted {
        elapsed_secs: u64,
        periods: u32,
        problem_count: usize,
    },
    GenerationEvolved {
        bio_box_id: BioBoxId,
        generation: u32,
        best_fitness: u32,
    },
    BioBoxCreated {
        bio_box_id: BioBoxId,
    },
    BioBoxRemoved {
        bio_box_id: BioBoxId,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub peripherals: Vec<PeripheralDef>,
    pub activities: Vec<ActivityDef>,
    pub constants: Constants,
}

impl GameContent {
    pub fn activity_def(&self, id: &ActivityDefId) -> Option<&ActivityDef> {
        self.activities.iter().find(|def| &def.id == id)
    }

    /// Hourly draw for a peripheral kind; kinds without a def draw nothing.
    pub fn peripheral_energy_per_hour(&self, kind: PeripheralKind) -> f32 {
        self.peripherals
            .iter()
            .find(|def| def.kind == kind)
            .map_or(0.0, |def| def.energy_per_hour)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralDef {
    pub kind: PeripheralKind,
    pub name: String,
    pub energy_per_hour: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDef {
    pub id: ActivityDefId,
    pub name: String,
    pub kind: ActivityKind,
    /// Duration before worker discounts.
    pub duration_secs: u64,
    #[serde(default)]
    pub ingredients: Vec<IngredientCost>,
    #[serde(default)]
    pub skills: Vec<SkillRequirement>,
    /// Production slot kind the activity occupies, if any.
    #[serde(default)]
    pub module_kind: Option<ModuleKind>,
    pub effect: ActivityEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngredientCost {
    pub ingredient: Ingredient,
    pub amount: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub skill: Skill,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActivityEffect {
    UnlockPeripheral { kind: PeripheralKind },
    AddPeripheral { kind: PeripheralKind },
    AddTank { fluid: Fluid, capacity: f32 },
    AddStorageBox { ingredient: Ingredient, capacity: f32 },
    AddBattery { capacity: f32 },
    AddSolarPanel { output_per_hour: f32 },
    AddInventory { ingredient: Ingredient, amount: f32 },
    IncrementCapability { capability: String },
    AddProductionModule { kind: ModuleKind },
    Nothing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// Length of one accounting step; catch-up passes iterate in these.
    pub accounting_period_secs: u64,
    pub module_energy_per_hour: f32,
    pub o2_per_inhabitant_per_hour: f32,
    pub co2_per_inhabitant_per_hour: f32,
    pub water_per_inhabitant_per_hour: f32,
    pub food_per_inhabitant_per_hour: f32,
    pub waste_liquid_per_inhabitant_per_hour: f32,
    pub waste_solid_per_inhabitant_per_hour: f32,
    /// Forecast window for the "oxygen depleted in N hours" problem.
    pub oxygen_warning_hours: f32,
    /// Fraction of `duration_secs` removed by a perfect crew.
    pub max_duration_discount: f32,
    pub boost_secs: u64,
    /// Mutation probability per character is `1 / mutation_chance`.
    pub mutation_chance: u32,
    pub max_generations: u32,
    pub gene_alphabet: String,
    pub autopilot_co2_threshold: f32,
    pub autopilot_o2_threshold: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, base_station};

    #[test]
    fn effects_are_tagged_by_type() {
        let effect = ActivityEffect::AddTank {
            fluid: Fluid::Hydrogen,
            capacity: 100.0,
        };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "AddTank", "fluid": "Hydrogen", "capacity": 100.0 })
        );

        let parsed: ActivityEffect =
            serde_json::from_str(r#"{ "type": "IncrementCapability", "capability": "farming" }"#)
                .unwrap();
        assert_eq!(
            parsed,
            ActivityEffect::IncrementCapability {
                capability: "farming".to_string()
            }
        );
        assert!(serde_json::from_str::<ActivityEffect>(r#"{ "type": "Teleport" }"#).is_err());
    }

    #[test]
    fn station_survives_a_json_round_trip() {
        let content = base_content();
        let mut station = base_station(&content);
        station.research.completed.insert(ActivityDefId("research_methanizer".to_string()));
        station.meta.clock_secs = 7200;

        let json = serde_json::to_value(&station).unwrap();
        let restored: StationState = serde_json::from_value(json.clone()).unwrap();

        assert_eq!(serde_json::to_value(&restored).unwrap(), json);
        assert_eq!(restored.ledger, station.ledger);
        assert_eq!(restored.meta.clock_secs, 7200);
    }
}
