use super::*;
use crate::test_fixtures::{base_content, base_station, make_rng};

mod genetics;
mod peripheral;

// --- Shared test helpers ------------------------------------------------

fn tank_level(station: &StationState, id: &str) -> f32 {
    station
        .ledger
        .tanks
        .iter()
        .find(|t| t.id.0 == id)
        .map(|t| t.level.current)
        .unwrap()
}

fn box_level(station: &StationState, id: &str) -> f32 {
    station
        .ledger
        .boxes
        .iter()
        .find(|b| b.id.0 == id)
        .map(|b| b.level.current)
        .unwrap()
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}

fn worker(station: &StationState, id: &str) -> Worker {
    station.crew.iter().find(|w| w.id.0 == id).unwrap().clone()
}
