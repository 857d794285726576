use super::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn alphabet() -> Vec<char> {
    "ACGT".chars().collect()
}

fn station_with_box(target: &str) -> (StationState, BioBoxId) {
    let content = base_content();
    let mut station = base_station(&content);
    let mut rng = make_rng();
    let mut events = Vec::new();
    let id = create_bio_box(&mut station, target, 12, &alphabet(), &mut rng, &mut events)
        .unwrap();
    (station, id)
}

#[test]
fn created_box_has_target_length_members() {
    let (station, id) = station_with_box("GATTACA");
    let bio_box = station.bio_boxes.iter().find(|b| b.id == id).unwrap();
    assert_eq!(bio_box.population.members.len(), 12);
    assert!(bio_box
        .population
        .members
        .iter()
        .all(|m| m.chars().count() == 7 && m.chars().all(|c| "ACGT".contains(c))));
    assert_eq!(bio_box.run_version, 0);
}

#[test]
fn best_fitness_never_increases() {
    let (mut station, id) = station_with_box("GATTACAGATTACA");
    let run = start_evolution(&mut station, &id).unwrap();
    let params = EvolutionParams::from_constants(&base_content().constants);

    let results: Vec<_> = Evolution::new(run.population, params, ChaCha8Rng::seed_from_u64(5))
        .unwrap()
        .collect();

    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[1].best_fitness <= pair[0].best_fitness);
        assert_eq!(pair[1].generation, pair[0].generation + 1);
    }
    for result in &results {
        assert!(result.best_fitness <= result.generation_best_fitness);
        assert_eq!(crate::genetics::fitness(&result.best, "GATTACAGATTACA"), result.best_fitness);
    }
}

#[test]
fn stale_run_results_are_discarded() {
    let (mut station, id) = station_with_box("GATTACA");
    let mut events = Vec::new();
    let params = EvolutionParams::from_constants(&base_content().constants);

    let stale = start_evolution(&mut station, &id).unwrap();
    let fresh = start_evolution(&mut station, &id).unwrap();
    assert!(fresh.token.version > stale.token.version);

    let stale_result = Evolution::new(stale.population, params.clone(), ChaCha8Rng::seed_from_u64(1))
        .unwrap()
        .last()
        .unwrap();
    let fresh_result = Evolution::new(fresh.population, params, ChaCha8Rng::seed_from_u64(2))
        .unwrap()
        .last()
        .unwrap();

    // The fresh run lands first, the stale one arrives afterwards.
    assert!(apply_generation(&mut station, &fresh.token, &fresh_result, &mut events));
    assert!(!apply_generation(&mut station, &stale.token, &stale_result, &mut events));

    let population = &station.bio_boxes[0].population;
    assert_eq!(population.members, fresh_result.members);
    assert_eq!(population.generation, fresh_result.generation);
    assert_eq!(events.len(), 1);
}

#[test]
fn removed_box_ignores_late_results() {
    let (mut station, id) = station_with_box("ACGT");
    let mut events = Vec::new();
    let run = start_evolution(&mut station, &id).unwrap();
    let params = EvolutionParams::from_constants(&base_content().constants);
    let result = Evolution::new(run.population, params, make_rng())
        .unwrap()
        .next()
        .unwrap();

    remove_bio_box(&mut station, &id, &mut events).unwrap();

    assert!(!apply_generation(&mut station, &run.token, &result, &mut events));
    assert!(station.bio_boxes.is_empty());
    assert_eq!(
        start_evolution(&mut station, &id).unwrap_err(),
        GeneticsError::UnknownBioBox(id)
    );
}

#[test]
fn synchronous_run_applies_every_generation() {
    let (mut station, id) = station_with_box("GATTACA");
    let mut events = Vec::new();
    let params = EvolutionParams::from_constants(&base_content().constants);

    let results = run_evolution(&mut station, &id, params, make_rng(), &mut events).unwrap();

    let last = results.last().unwrap();
    let population = &station.bio_boxes[0].population;
    assert_eq!(population.generation, last.generation);
    assert_eq!(population.members, last.members);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.event, Event::GenerationEvolved { .. }))
            .count(),
        results.len()
    );
}

#[test]
fn bad_box_parameters_are_rejected() {
    let content = base_content();
    let mut station = base_station(&content);
    let mut rng = make_rng();
    let mut events = Vec::new();

    assert_eq!(
        create_bio_box(&mut station, "", 4, &alphabet(), &mut rng, &mut events).unwrap_err(),
        GeneticsError::EmptyTarget
    );
    assert_eq!(
        create_bio_box(&mut station, "ACGT", 0, &alphabet(), &mut rng, &mut events).unwrap_err(),
        GeneticsError::EmptyPopulation
    );
    assert_eq!(
        create_bio_box(&mut station, "ACGT", 4, &[], &mut rng, &mut events).unwrap_err(),
        GeneticsError::EmptyAlphabet
    );
    assert!(station.bio_boxes.is_empty());
    assert!(events.is_empty());
}
