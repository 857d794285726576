//! Shared test fixtures for colony_core and downstream crates.
//!
//! `base_content()` carries one def of every effect family with short
//! durations. `base_station()` is a small two-person outpost whose levels
//! match the electrolyzer walk-through: water 50/100, hydrogen 0/100, one
//! full 150 battery.

use crate::ledger::{Battery, Level, ResourceLedger, SolarPanel, StorageBox, Tank};
use crate::{
    ActivityDef, ActivityDefId, ActivityEffect, ActivityKind, AirComposition, BatteryId, BoxId,
    Constants, Counters, Fluid, GameContent, Ingredient, IngredientCost, MetaState, ModuleId,
    ModuleKind, PanelId, PeripheralDef, PeripheralId, PeripheralKind, PeripheralState,
    ProductionModule, ResearchState, Skill, SkillLevel, SkillRequirement, StationId,
    StationState, TankId, Worker, WorkerId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn base_constants() -> Constants {
    Constants {
        accounting_period_secs: 3600,
        module_energy_per_hour: 5.0,
        o2_per_inhabitant_per_hour: 1.0,
        co2_per_inhabitant_per_hour: 0.8,
        water_per_inhabitant_per_hour: 0.5,
        food_per_inhabitant_per_hour: 0.3,
        waste_liquid_per_inhabitant_per_hour: 0.4,
        waste_solid_per_inhabitant_per_hour: 0.2,
        oxygen_warning_hours: 24.0,
        max_duration_discount: 0.6,
        boost_secs: 600,
        mutation_chance: 20,
        max_generations: 200,
        gene_alphabet: "ACGT".to_string(),
        autopilot_co2_threshold: 30.0,
        autopilot_o2_threshold: 50.0,
    }
}

fn peripheral_def(kind: PeripheralKind, energy_per_hour: f32) -> PeripheralDef {
    PeripheralDef {
        kind,
        name: format!("{kind:?}"),
        energy_per_hour,
    }
}

pub fn base_content() -> GameContent {
    GameContent {
        content_version: "test".to_string(),
        peripherals: vec![
            peripheral_def(PeripheralKind::Scrubber, 2.0),
            peripheral_def(PeripheralKind::Electrolyzer, 3.0),
            peripheral_def(PeripheralKind::Methanizer, 3.0),
            peripheral_def(PeripheralKind::WaterFilter, 1.0),
            peripheral_def(PeripheralKind::BioSolidifier, 1.0),
            peripheral_def(PeripheralKind::Heater, 4.0),
        ],
        activities: vec![
            ActivityDef {
                id: ActivityDefId("recipe_battery".to_string()),
                name: "Battery".to_string(),
                kind: ActivityKind::Recipe,
                duration_secs: 1200,
                ingredients: vec![IngredientCost {
                    ingredient: Ingredient::Metal,
                    amount: 10.0,
                }],
                skills: vec![SkillRequirement {
                    skill: Skill::Electric,
                    level: 2,
                }],
                module_kind: Some(ModuleKind::Workshop),
                effect: ActivityEffect::AddBattery { capacity: 100.0 },
            },
            ActivityDef {
                id: ActivityDefId("recipe_hydrogen_tank".to_string()),
                name: "Hydrogen Tank".to_string(),
                kind: ActivityKind::Recipe,
                duration_secs: 900,
                ingredients: vec![IngredientCost {
                    ingredient: Ingredient::Metal,
                    amount: 5.0,
                }],
                skills: vec![],
                module_kind: Some(ModuleKind::Workshop),
                effect: ActivityEffect::AddTank {
                    fluid: Fluid::Hydrogen,
                    capacity: 100.0,
                },
            },
            ActivityDef {
                id: ActivityDefId("recipe_ration".to_string()),
                name: "Ration".to_string(),
                kind: ActivityKind::Recipe,
                duration_secs: 600,
                ingredients: vec![IngredientCost {
                    ingredient: Ingredient::Fertilizer,
                    amount: 5.0,
                }],
                skills: vec![],
                module_kind: None,
                effect: ActivityEffect::AddInventory {
                    ingredient: Ingredient::Food,
                    amount: 10.0,
                },
            },
            ActivityDef {
                id: ActivityDefId("research_methanizer".to_string()),
                name: "Methanation".to_string(),
                kind: ActivityKind::Research,
                duration_secs: 3600,
                ingredients: vec![],
                skills: vec![SkillRequirement {
                    skill: Skill::Computer,
                    level: 1,
                }],
                module_kind: Some(ModuleKind::Lab),
                effect: ActivityEffect::UnlockPeripheral {
                    kind: PeripheralKind::Methanizer,
                },
            },
            ActivityDef {
                id: ActivityDefId("research_hydroponics".to_string()),
                name: "Hydroponics".to_string(),
                kind: ActivityKind::Research,
                duration_secs: 1800,
                ingredients: vec![],
                skills: vec![],
                module_kind: None,
                effect: ActivityEffect::IncrementCapability {
                    capability: "hydroponics".to_string(),
                },
            },
        ],
        constants: base_constants(),
    }
}

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

fn peripheral(id: &str, kind: PeripheralKind) -> PeripheralState {
    PeripheralState {
        id: PeripheralId(id.to_string()),
        kind,
        level: 1,
        power_on: true,
        broken: false,
        last_fixed_at: 0,
    }
}

pub fn base_station(content: &GameContent) -> StationState {
    StationState {
        id: StationId("station_test".to_string()),
        meta: MetaState {
            clock_secs: 0,
            schema_version: crate::SCHEMA_VERSION,
            content_version: content.content_version.clone(),
        },
        ledger: ResourceLedger {
            tanks: vec![
                tank("tank_water", Fluid::Water, 100.0, 50.0),
                tank("tank_hydrogen", Fluid::Hydrogen, 100.0, 0.0),
            ],
            boxes: vec![
                storage("box_food", Ingredient::Food, 100.0, 50.0),
                storage("box_metal", Ingredient::Metal, 100.0, 40.0),
                storage("box_waste_liquid", Ingredient::WasteLiquid, 100.0, 20.0),
                storage("box_waste_solid", Ingredient::WasteSolid, 100.0, 20.0),
                storage("box_fertilizer", Ingredient::Fertilizer, 100.0, 0.0),
            ],
            batteries: vec![Battery {
                id: BatteryId("battery_main".to_string()),
                level: Level::new(150.0, 150.0),
            }],
            solar_panels: vec![SolarPanel {
                id: PanelId("panel_main".to_string()),
                output_per_hour: 20.0,
            }],
        },
        air: AirComposition {
            o2: 100.0,
            co2: 20.0,
            n2: 300.0,
            ..AirComposition::default()
        },
        peripherals: vec![
            peripheral("periph_scrubber", PeripheralKind::Scrubber),
            peripheral("periph_electrolyzer", PeripheralKind::Electrolyzer),
            peripheral("periph_water_filter", PeripheralKind::WaterFilter),
            peripheral("periph_heater", PeripheralKind::Heater),
        ],
        modules: vec![
            ProductionModule {
                id: ModuleId("module_workshop".to_string()),
                kind: ModuleKind::Workshop,
            },
            ProductionModule {
                id: ModuleId("module_lab".to_string()),
                kind: ModuleKind::Lab,
            },
        ],
        crew: vec![
            Worker {
                id: WorkerId("worker_ada".to_string()),
                name: "Ada".to_string(),
                intelligence: 80.0,
                happiness: 70.0,
                teamwork: 60.0,
                skills: vec![
                    SkillLevel {
                        skill: Skill::Electric,
                        level: 2,
                    },
                    SkillLevel {
                        skill: Skill::Mechanical,
                        level: 1,
                    },
                ],
                activity: None,
            },
            Worker {
                id: WorkerId("worker_lin".to_string()),
                name: "Lin".to_string(),
                intelligence: 60.0,
                happiness: 50.0,
                teamwork: 90.0,
                skills: vec![
                    SkillLevel {
                        skill: Skill::Computer,
                        level: 2,
                    },
                    SkillLevel {
                        skill: Skill::Biology,
                        level: 1,
                    },
                ],
                activity: None,
            },
        ],
        activities: vec![],
        research: ResearchState::default(),
        bio_boxes: vec![],
        counters: Counters {
            next_event_id: 0,
            next_activity_id: 0,
            next_entity_id: 1,
        },
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
