//! Validation of the shipped `content/*.json` files.
//!
//! Loads the real content once and checks ranges, cross-references between
//! activities, peripherals and modules, and that the starter station can
//! actually run the recipes the content offers.

use colony_core::{
    advance, ActivityEffect, ActivityKind, GameContent, PeripheralKind, Problem, Skill,
};
use colony_world::{build_initial_station, load_content};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::OnceLock;

fn content_dir() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    format!("{manifest}/../../content")
}

fn load_test_content() -> &'static GameContent {
    static CONTENT: OnceLock<GameContent> = OnceLock::new();
    CONTENT.get_or_init(|| {
        load_content(&content_dir()).expect("load_content should succeed for production content")
    })
}

// =========================================================================
// Schema
// =========================================================================

#[test]
fn content_loads_successfully() {
    let content = load_test_content();
    assert!(!content.content_version.is_empty());
    assert!(!content.activities.is_empty());
}

#[test]
fn missing_directory_is_an_error() {
    let err = load_content("/definitely/not/a/content/dir").unwrap_err();
    assert!(
        format!("{err:#}").contains("constants.json"),
        "error should name the file: {err:#}"
    );
}

// =========================================================================
// Ranges
// =========================================================================

#[test]
fn activity_ids_follow_kind_prefix() {
    let content = load_test_content();
    for def in &content.activities {
        let prefix = match def.kind {
            ActivityKind::Recipe => "recipe_",
            ActivityKind::Research => "research_",
            ActivityKind::Other => "",
        };
        assert!(
            def.id.0.starts_with(prefix),
            "activity '{}' should start with '{prefix}'",
            def.id,
        );
    }
}

#[test]
fn research_never_produces_inventory() {
    let content = load_test_content();
    for def in content
        .activities
        .iter()
        .filter(|d| d.kind == ActivityKind::Research)
    {
        assert!(
            !matches!(def.effect, ActivityEffect::AddInventory { .. }),
            "research '{}' should not yield consumables",
            def.id,
        );
    }
}

#[test]
fn constants_leave_headroom_for_the_crew() {
    let c = &load_test_content().constants;
    assert!(c.oxygen_warning_hours > 0.0);
    assert!(c.boost_secs > 0);
    assert!(c.max_generations > 0);
    assert!(c.co2_per_inhabitant_per_hour < c.o2_per_inhabitant_per_hour);
}

// =========================================================================
// Cross references
// =========================================================================

#[test]
fn every_peripheral_kind_has_a_def() {
    let content = load_test_content();
    let defined: HashSet<PeripheralKind> = content.peripherals.iter().map(|d| d.kind).collect();
    for def in &content.activities {
        let referenced = match def.effect {
            ActivityEffect::UnlockPeripheral { kind } | ActivityEffect::AddPeripheral { kind } => {
                kind
            }
            _ => continue,
        };
        assert!(
            defined.contains(&referenced),
            "activity '{}' references undefined peripheral {referenced:?}",
            def.id,
        );
    }
}

#[test]
fn unlocked_peripherals_can_be_built() {
    let content = load_test_content();
    for def in &content.activities {
        let ActivityEffect::UnlockPeripheral { kind } = def.effect else {
            continue;
        };
        let buildable = content
            .activities
            .iter()
            .any(|d| d.effect == ActivityEffect::AddPeripheral { kind });
        assert!(buildable, "{kind:?} is unlocked by '{}' but never built", def.id);
    }
}

// =========================================================================
// Playability
// =========================================================================

#[test]
fn starter_station_hosts_every_module_kind_used() {
    let content = load_test_content();
    let station = build_initial_station(content, &mut ChaCha8Rng::seed_from_u64(0));
    for def in &content.activities {
        let Some(kind) = def.module_kind else {
            continue;
        };
        assert!(
            station.modules.iter().any(|m| m.kind == kind),
            "activity '{}' needs a {kind:?} module the starter station lacks",
            def.id,
        );
    }
}

#[test]
fn starter_crew_covers_every_skill_requirement() {
    let content = load_test_content();
    for seed in 0..8 {
        let station = build_initial_station(content, &mut ChaCha8Rng::seed_from_u64(seed));
        let total = |skill: Skill| -> u32 { station.crew.iter().map(|w| w.skill_level(skill)).sum() };
        for def in &content.activities {
            for req in &def.skills {
                assert!(
                    total(req.skill) >= req.level,
                    "seed {seed}: crew cannot staff '{}' ({:?} {})",
                    def.id,
                    req.skill,
                    req.level,
                );
            }
        }
    }
}

#[test]
fn starter_station_survives_a_day_unattended() {
    let content = load_test_content();
    let mut station = build_initial_station(content, &mut ChaCha8Rng::seed_from_u64(3));
    let mut events = Vec::new();

    let report = advance(&mut station, content, 24 * 3600, &mut events);

    assert_eq!(report.periods, 24);
    assert!(
        !report
            .problems
            .iter()
            .any(|p| matches!(p, Problem::EnergyShortfall { .. })),
        "starter power budget should be positive: {:?}",
        report.problems,
    );
    assert!(report.end.food > 0.0);
    assert!(report.end.water > 0.0);
    assert!(station.ledger.invariants_hold());
    assert!(station.air.invariants_hold());
}
