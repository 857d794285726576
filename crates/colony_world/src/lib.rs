//! Content loading, starter stations and save files shared between
//! colony_cli and colony_daemon.

use anyhow::{Context, Result};
use colony_control::{PersistenceError, PersistenceStore};
use colony_core::ledger::{Battery, Level, ResourceLedger, SolarPanel, StorageBox, Tank};
use colony_core::{
    ActivityDef, ActivityEffect, AirComposition, BatteryId, BoxId, Constants, Counters, Fluid,
    GameContent, Ingredient, MetaState, ModuleId, ModuleKind, PanelId, PeripheralDef,
    PeripheralId, PeripheralKind, PeripheralState, ProductionModule, ResearchState, Skill,
    SkillLevel, StationId, StationState, TankId, Worker, WorkerId,
};
use rand::Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct ActivitiesFile {
    content_version: String,
    activities: Vec<ActivityDef>,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

fn validate_constants(c: &Constants) {
    assert!(
        c.accounting_period_secs > 0,
        "constants.accounting_period_secs must be positive"
    );
    assert!(
        c.mutation_chance > 0,
        "constants.mutation_chance must be at least 1"
    );
    assert!(
        !c.gene_alphabet.is_empty(),
        "constants.gene_alphabet must not be empty"
    );
    assert!(
        (0.0..1.0).contains(&c.max_duration_discount),
        "constants.max_duration_discount must be in [0, 1), got {}",
        c.max_duration_discount,
    );
    let rates = [
        ("module_energy_per_hour", c.module_energy_per_hour),
        ("o2_per_inhabitant_per_hour", c.o2_per_inhabitant_per_hour),
        ("co2_per_inhabitant_per_hour", c.co2_per_inhabitant_per_hour),
        ("water_per_inhabitant_per_hour", c.water_per_inhabitant_per_hour),
        ("food_per_inhabitant_per_hour", c.food_per_inhabitant_per_hour),
        (
            "waste_liquid_per_inhabitant_per_hour",
            c.waste_liquid_per_inhabitant_per_hour,
        ),
        (
            "waste_solid_per_inhabitant_per_hour",
            c.waste_solid_per_inhabitant_per_hour,
        ),
    ];
    for (name, value) in rates {
        assert!(value >= 0.0, "constants.{name} is negative: {value}");
    }
}

fn validate_effect(def: &ActivityDef) {
    let capacity = match &def.effect {
        ActivityEffect::AddTank { capacity, .. }
        | ActivityEffect::AddStorageBox { capacity, .. }
        | ActivityEffect::AddBattery { capacity } => Some(*capacity),
        ActivityEffect::AddInventory { amount, .. } => Some(*amount),
        ActivityEffect::AddSolarPanel { output_per_hour } => Some(*output_per_hour),
        ActivityEffect::IncrementCapability { capability } => {
            assert!(
                !capability.is_empty(),
                "activity '{}' increments an unnamed capability",
                def.id,
            );
            None
        }
        ActivityEffect::UnlockPeripheral { .. }
        | ActivityEffect::AddPeripheral { .. }
        | ActivityEffect::AddProductionModule { .. }
        | ActivityEffect::Nothing => None,
    };
    if let Some(value) = capacity {
        assert!(
            value > 0.0,
            "activity '{}' effect quantity must be positive, got {value}",
            def.id,
        );
    }
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like duplicate ids, zero durations, non-positive costs or
/// capacities, and constants that would stall accounting or evolution.
pub fn validate_content(content: &GameContent) {
    validate_constants(&content.constants);

    let mut kinds = HashSet::new();
    for def in &content.peripherals {
        assert!(
            kinds.insert(def.kind),
            "peripheral kind {:?} is defined twice",
            def.kind,
        );
        assert!(
            def.energy_per_hour >= 0.0,
            "peripheral {:?} has negative energy_per_hour",
            def.kind,
        );
    }

    let mut ids = HashSet::new();
    for def in &content.activities {
        assert!(!def.id.0.is_empty(), "activity has empty id");
        assert!(ids.insert(&def.id), "activity '{}' is defined twice", def.id);
        assert!(
            def.duration_secs > 0,
            "activity '{}' has zero duration",
            def.id,
        );
        let mut listed = HashSet::new();
        for cost in &def.ingredients {
            assert!(
                cost.amount > 0.0,
                "activity '{}' ingredient {} has non-positive amount",
                def.id,
                cost.ingredient,
            );
            assert!(
                listed.insert(cost.ingredient),
                "activity '{}' lists ingredient {} twice",
                def.id,
                cost.ingredient,
            );
        }
        for req in &def.skills {
            assert!(
                req.level > 0,
                "activity '{}' requires level 0 of {:?}",
                def.id,
                req.skill,
            );
        }
        validate_effect(def);
    }
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let peripherals: Vec<PeripheralDef> = serde_json::from_str(
        &std::fs::read_to_string(dir.join("peripherals.json"))
            .context("reading peripherals.json")?,
    )
    .context("parsing peripherals.json")?;
    let activities_file: ActivitiesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("activities.json"))
            .context("reading activities.json")?,
    )
    .context("parsing activities.json")?;
    let content = GameContent {
        content_version: activities_file.content_version,
        peripherals,
        activities: activities_file.activities,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

// ---------------------------------------------------------------------------
// Starter station
// ---------------------------------------------------------------------------

const CREW_NAMES: [&str; 3] = ["Ada", "Yuri", "Mae"];
const CREW_SKILLS: [[Skill; 2]; 3] = [
    [Skill::Electric, Skill::Computer],
    [Skill::Mechanical, Skill::Electric],
    [Skill::Biology, Skill::Medical],
];

fn tank(id: &str, fluid: Fluid, capacity: f32, current: f32) -> Tank {
    Tank {
        id: TankId(id.to_string()),
        fluid,
        level: Level::new(capacity, current),
    }
}

fn storage(id: &str, ingredient: Ingredient, capacity: f32, current: f32) -> StorageBox {
    StorageBox {
        id: BoxId(id.to_string()),
        ingredient,
        level: Level::new(capacity, current),
    }
}

fn starter_ledger() -> ResourceLedger {
    ResourceLedger {
        tanks: vec![
            tank("tank_water_0001", Fluid::Water, 200.0, 120.0),
            tank("tank_hydrogen_0001", Fluid::Hydrogen, 100.0, 0.0),
            tank("tank_oxygen_0001", Fluid::Oxygen, 100.0, 20.0),
        ],
        boxes: vec![
            storage("box_food_0001", Ingredient::Food, 200.0, 120.0),
            storage("box_metal_0001", Ingredient::Metal, 150.0, 80.0),
            storage("box_plastic_0001", Ingredient::Plastic, 100.0, 30.0),
            storage("box_silicon_0001", Ingredient::Silicon, 100.0, 20.0),
            storage("box_polymer_0001", Ingredient::Polymer, 50.0, 10.0),
            storage("box_waste_liquid_0001", Ingredient::WasteLiquid, 100.0, 0.0),
            storage("box_waste_solid_0001", Ingredient::WasteSolid, 100.0, 0.0),
            storage("box_fertilizer_0001", Ingredient::Fertilizer, 100.0, 10.0),
        ],
        batteries: vec![Battery {
            id: BatteryId("battery_0001".to_string()),
            level: Level::new(500.0, 500.0),
        }],
        solar_panels: vec![SolarPanel {
            id: PanelId("panel_0001".to_string()),
            output_per_hour: 60.0,
        }],
    }
}

fn starter_peripherals() -> Vec<PeripheralState> {
    [
        PeripheralKind::Scrubber,
        PeripheralKind::Electrolyzer,
        PeripheralKind::WaterFilter,
        PeripheralKind::BioSolidifier,
        PeripheralKind::Heater,
    ]
    .into_iter()
    .enumerate()
    .map(|(n, kind)| PeripheralState {
        id: PeripheralId(format!("peripheral_{:04}", n + 1)),
        kind,
        level: 1,
        power_on: true,
        broken: false,
        last_fixed_at: 0,
    })
    .collect()
}

fn starter_modules() -> Vec<ProductionModule> {
    [
        ModuleKind::Workshop,
        ModuleKind::Lab,
        ModuleKind::Biology,
        ModuleKind::Habitat,
    ]
    .into_iter()
    .enumerate()
    .map(|(n, kind)| ProductionModule {
        id: ModuleId(format!("module_{:04}", n + 1)),
        kind,
    })
    .collect()
}

fn starter_crew(rng: &mut impl Rng) -> Vec<Worker> {
    CREW_NAMES
        .iter()
        .zip(CREW_SKILLS)
        .enumerate()
        .map(|(n, (name, [primary, secondary]))| Worker {
            id: WorkerId(format!("worker_{:04}", n + 1)),
            name: (*name).to_string(),
            intelligence: rng.gen_range(40.0..=90.0),
            happiness: rng.gen_range(50.0..=90.0),
            teamwork: rng.gen_range(40.0..=90.0),
            skills: vec![
                SkillLevel {
                    skill: primary,
                    level: rng.gen_range(2..=3),
                },
                SkillLevel {
                    skill: secondary,
                    level: 1,
                },
            ],
            activity: None,
        })
        .collect()
}

/// A three-person outpost with the basic life-support loop installed.
/// The same rng seed always yields the same station.
pub fn build_initial_station(content: &GameContent, rng: &mut impl Rng) -> StationState {
    let uuid = colony_core::generate_uuid(rng);
    StationState {
        id: StationId(format!("station_{uuid}")),
        meta: MetaState {
            clock_secs: 0,
            schema_version: colony_core::SCHEMA_VERSION,
            content_version: content.content_version.clone(),
        },
        ledger: starter_ledger(),
        air: AirComposition {
            o2: 210.0,
            co2: 4.0,
            n2: 780.0,
            h2o: 10.0,
            ..AirComposition::default()
        },
        peripherals: starter_peripherals(),
        modules: starter_modules(),
        crew: starter_crew(rng),
        activities: vec![],
        research: ResearchState::default(),
        bio_boxes: vec![],
        counters: Counters {
            next_event_id: 0,
            next_activity_id: 0,
            // Built entities number above the starter ids.
            next_entity_id: 100,
        },
    }
}

// ---------------------------------------------------------------------------
// Save files
// ---------------------------------------------------------------------------

/// Saves the station as pretty JSON. Writes go to a sibling temp file first
/// and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl PersistenceStore for JsonFileStore {
    fn save(&mut self, station: &StationState) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(station)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<StationState, PersistenceError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| PersistenceError::Corrupt(e.to_string()))
    }
}
