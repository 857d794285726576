//! Roulette-wheel genetic search that cultivates bio boxes toward a target
//! gene string.
//!
//! An [`Evolution`] owns its population and rng, so a run can be moved onto a
//! worker thread. Results come back tagged with a [`RunToken`]; only the
//! newest run for a box may write to it.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{BioBox, BioBoxId, Constants, Event, EventEnvelope, StationState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioPopulation {
    pub target: String,
    /// Every member has the same character count as `target`.
    pub members: Vec<String>,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionParams {
    /// Each child character mutates with probability `1 / mutation_chance`.
    pub mutation_chance: u32,
    /// Generations bred after the starting one before giving up.
    pub max_generations: u32,
    pub alphabet: Vec<char>,
}

impl EvolutionParams {
    pub fn from_constants(constants: &Constants) -> Self {
        Self {
            mutation_chance: constants.mutation_chance,
            max_generations: constants.max_generations,
            alphabet: constants.gene_alphabet.chars().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunToken {
    pub box_id: BioBoxId,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionRun {
    pub token: RunToken,
    pub population: BioPopulation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub generation: u32,
    /// Best member found so far in the run.
    pub best: String,
    pub best_fitness: u32,
    /// Best fitness within this generation alone.
    pub generation_best_fitness: u32,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneticsError {
    #[error("bio box {0} does not exist")]
    UnknownBioBox(BioBoxId),
    #[error("target gene string is empty")]
    EmptyTarget,
    #[error("member has {found} genes, target has {expected}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("population is empty")]
    EmptyPopulation,
    #[error("mutation chance must be at least 1")]
    InvalidMutationChance,
    #[error("gene alphabet is empty")]
    EmptyAlphabet,
}

// ---------------------------------------------------------------------------
// Fitness
// ---------------------------------------------------------------------------

/// Sum of per-position code point distances. Zero is a perfect match.
pub fn fitness(member: &str, target: &str) -> u32 {
    member
        .chars()
        .zip(target.chars())
        .map(|(m, t)| u32::from(m).abs_diff(u32::from(t)))
        .fold(0u32, u32::saturating_add)
}

fn fitness_of(member: &[char], target: &[char]) -> u32 {
    member
        .iter()
        .zip(target)
        .map(|(m, t)| u32::from(*m).abs_diff(u32::from(*t)))
        .fold(0u32, u32::saturating_add)
}

fn selection_weight(fitness: u32) -> f64 {
    if fitness == 0 {
        1.0
    } else {
        1.0 / f64::from(fitness)
    }
}

// ---------------------------------------------------------------------------
// Evolution iterator
// ---------------------------------------------------------------------------

/// Lazy, finite sequence of generations. The first item evaluates the
/// starting population; iteration ends after a perfect match or after
/// `max_generations` bred generations.
pub struct Evolution<R> {
    target: Vec<char>,
    members: Vec<Vec<char>>,
    generation: u32,
    bred: u32,
    params: EvolutionParams,
    best: Option<(Vec<char>, u32)>,
    started: bool,
    finished: bool,
    rng: R,
}

impl<R: Rng> Evolution<R> {
    pub fn new(
        population: BioPopulation,
        params: EvolutionParams,
        rng: R,
    ) -> Result<Self, GeneticsError> {
        let target: Vec<char> = population.target.chars().collect();
        if target.is_empty() {
            return Err(GeneticsError::EmptyTarget);
        }
        if population.members.is_empty() {
            return Err(GeneticsError::EmptyPopulation);
        }
        if params.mutation_chance == 0 {
            return Err(GeneticsError::InvalidMutationChance);
        }
        if params.alphabet.is_empty() {
            return Err(GeneticsError::EmptyAlphabet);
        }
        let members: Vec<Vec<char>> = population
            .members
            .iter()
            .map(|m| m.chars().collect())
            .collect();
        if let Some(bad) = members.iter().find(|m| m.len() != target.len()) {
            return Err(GeneticsError::LengthMismatch {
                expected: target.len(),
                found: bad.len(),
            });
        }
        Ok(Self {
            target,
            members,
            generation: population.generation,
            bred: 0,
            params,
            best: None,
            started: false,
            finished: false,
            rng,
        })
    }

    fn breed(&mut self) -> Vec<Vec<char>> {
        let weights: Vec<f64> = self
            .members
            .iter()
            .map(|m| selection_weight(fitness_of(m, &self.target)))
            .collect();
        // Fails only on an empty population, which `new` rejects.
        let Ok(wheel) = WeightedIndex::new(&weights) else {
            return self.members.clone();
        };
        let len = self.target.len();
        (0..self.members.len())
            .map(|_| {
                let mother = &self.members[wheel.sample(&mut self.rng)];
                let father = &self.members[wheel.sample(&mut self.rng)];
                let split = self.rng.gen_range(0..=len);
                let mut child: Vec<char> = mother[..split]
                    .iter()
                    .chain(&father[split..])
                    .copied()
                    .collect();
                for gene in &mut child {
                    if self.rng.gen_range(0..self.params.mutation_chance) == 0 {
                        let pick = self.rng.gen_range(0..self.params.alphabet.len());
                        *gene = self.params.alphabet[pick];
                    }
                }
                child
            })
            .collect()
    }
}

impl<R: Rng> Iterator for Evolution<R> {
    type Item = GenerationResult;

    fn next(&mut self) -> Option<GenerationResult> {
        if self.finished {
            return None;
        }
        if self.started {
            self.members = self.breed();
            self.generation += 1;
            self.bred += 1;
        }
        self.started = true;

        let (leader_idx, leader_fitness) = self
            .members
            .iter()
            .enumerate()
            .map(|(idx, m)| (idx, fitness_of(m, &self.target)))
            .min_by_key(|(_, f)| *f)?;
        let improved = match &self.best {
            Some((_, best)) => leader_fitness < *best,
            None => true,
        };
        if improved {
            self.best = Some((self.members[leader_idx].clone(), leader_fitness));
        }
        let (best, best_fitness) = self.best.clone()?;

        if best_fitness == 0 || self.bred >= self.params.max_generations {
            self.finished = true;
        }
        Some(GenerationResult {
            generation: self.generation,
            best: best.into_iter().collect(),
            best_fitness,
            generation_best_fitness: leader_fitness,
            members: self.members.iter().map(|m| m.iter().collect()).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Station operations
// ---------------------------------------------------------------------------

fn bio_box_mut<'a>(
    station: &'a mut StationState,
    box_id: &BioBoxId,
) -> Result<&'a mut BioBox, GeneticsError> {
    station
        .bio_boxes
        .iter_mut()
        .find(|b| &b.id == box_id)
        .ok_or_else(|| GeneticsError::UnknownBioBox(box_id.clone()))
}

/// Opens a new run for a box. Any run started earlier becomes stale.
pub fn start_evolution(
    station: &mut StationState,
    box_id: &BioBoxId,
) -> Result<EvolutionRun, GeneticsError> {
    let bio_box = bio_box_mut(station, box_id)?;
    bio_box.run_version += 1;
    Ok(EvolutionRun {
        token: RunToken {
            box_id: box_id.clone(),
            version: bio_box.run_version,
        },
        population: bio_box.population.clone(),
    })
}

/// Writes a generation into its box. Returns false, leaving the box as it
/// was, when the token is stale or the box is gone.
pub fn apply_generation(
    station: &mut StationState,
    token: &RunToken,
    result: &GenerationResult,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    let Ok(bio_box) = bio_box_mut(station, &token.box_id) else {
        return false;
    };
    if bio_box.run_version != token.version {
        return false;
    }
    bio_box.population.members.clone_from(&result.members);
    bio_box.population.generation = result.generation;
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::GenerationEvolved {
            bio_box_id: token.box_id.clone(),
            generation: result.generation,
            best_fitness: result.best_fitness,
        },
    ));
    true
}

/// Runs a whole evolution in place and applies every generation.
pub fn run_evolution<R: Rng>(
    station: &mut StationState,
    box_id: &BioBoxId,
    params: EvolutionParams,
    rng: R,
    events: &mut Vec<EventEnvelope>,
) -> Result<Vec<GenerationResult>, GeneticsError> {
    let run = start_evolution(station, box_id)?;
    let results: Vec<GenerationResult> = Evolution::new(run.population, params, rng)?.collect();
    for result in &results {
        apply_generation(station, &run.token, result, events);
    }
    Ok(results)
}

pub fn random_genes(rng: &mut impl Rng, alphabet: &[char], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

pub fn create_bio_box(
    station: &mut StationState,
    target: &str,
    population_size: usize,
    alphabet: &[char],
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<BioBoxId, GeneticsError> {
    let len = target.chars().count();
    if len == 0 {
        return Err(GeneticsError::EmptyTarget);
    }
    if population_size == 0 {
        return Err(GeneticsError::EmptyPopulation);
    }
    if alphabet.is_empty() {
        return Err(GeneticsError::EmptyAlphabet);
    }
    let members = (0..population_size)
        .map(|_| random_genes(rng, alphabet, len))
        .collect();
    let id = BioBoxId(crate::next_entity_id(&mut station.counters, "biobox"));
    station.bio_boxes.push(BioBox {
        id: id.clone(),
        population: BioPopulation {
            target: target.to_string(),
            members,
            generation: 0,
        },
        run_version: 0,
    });
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::BioBoxCreated {
            bio_box_id: id.clone(),
        },
    ));
    Ok(id)
}

/// Removes a box. Results still in flight for it are dropped on arrival.
pub fn remove_bio_box(
    station: &mut StationState,
    box_id: &BioBoxId,
    events: &mut Vec<EventEnvelope>,
) -> Result<BioBox, GeneticsError> {
    let idx = station
        .bio_boxes
        .iter()
        .position(|b| &b.id == box_id)
        .ok_or_else(|| GeneticsError::UnknownBioBox(box_id.clone()))?;
    let removed = station.bio_boxes.remove(idx);
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::BioBoxRemoved {
            bio_box_id: removed.id.clone(),
        },
    ));
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(max_generations: u32) -> EvolutionParams {
        EvolutionParams {
            mutation_chance: 20,
            max_generations,
            alphabet: "ACGT".chars().collect(),
        }
    }

    fn population(target: &str, members: &[&str]) -> BioPopulation {
        BioPopulation {
            target: target.to_string(),
            members: members.iter().map(|m| (*m).to_string()).collect(),
            generation: 0,
        }
    }

    #[test]
    fn fitness_sums_code_point_distance() {
        assert_eq!(fitness("AAAA", "AAAA"), 0);
        assert_eq!(fitness("CAAA", "AAAA"), 2);
        assert_eq!(fitness("AAAA", "TTTT"), 4 * (u32::from('T') - u32::from('A')));
    }

    #[test]
    fn perfect_population_stops_at_generation_zero() {
        let rng = ChaCha8Rng::seed_from_u64(1);
        let results: Vec<_> = Evolution::new(population("AAAA", &["AAAA"]), params(50), rng)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].generation, 0);
        assert_eq!(results[0].best_fitness, 0);
        assert_eq!(results[0].best, "AAAA");
    }

    #[test]
    fn run_is_capped_by_max_generations() {
        let rng = ChaCha8Rng::seed_from_u64(2);
        let start = population("GATTACAGATTACA", &["AAAAAAAAAAAAAA", "CCCCCCCCCCCCCC"]);
        let results: Vec<_> = Evolution::new(start, params(5), rng).unwrap().collect();
        assert!(results.len() <= 6);
        let last = results.last().unwrap();
        assert!(last.best_fitness == 0 || last.generation == 5);
    }

    #[test]
    fn rejects_malformed_populations() {
        let rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            Evolution::new(population("", &["A"]), params(5), rng.clone()),
            Err(GeneticsError::EmptyTarget)
        ));
        assert!(matches!(
            Evolution::new(population("ACGT", &["ACG"]), params(5), rng.clone()),
            Err(GeneticsError::LengthMismatch {
                expected: 4,
                found: 3
            })
        ));
        assert!(matches!(
            Evolution::new(population("ACGT", &[]), params(5), rng.clone()),
            Err(GeneticsError::EmptyPopulation)
        ));
        let zero = EvolutionParams {
            mutation_chance: 0,
            ..params(5)
        };
        assert!(matches!(
            Evolution::new(population("ACGT", &["AAAA"]), zero, rng),
            Err(GeneticsError::InvalidMutationChance)
        ));
    }

    #[test]
    fn same_seed_same_run() {
        let start = population("GATTACA", &["AAAAAAA", "TTTTTTT", "CCCCCCC", "GGGGGGG"]);
        let a: Vec<_> = Evolution::new(start.clone(), params(30), ChaCha8Rng::seed_from_u64(9))
            .unwrap()
            .collect();
        let b: Vec<_> = Evolution::new(start, params(30), ChaCha8Rng::seed_from_u64(9))
            .unwrap()
            .collect();
        assert_eq!(a, b);
    }
}
