//! Host-side owner of one station: runs engine operations, keeps the event
//! log and saves after every successful mutation.

use colony_core::{
    accounting, genetics, peripheral, scheduler, AccountingReport, Activity, ActivityId,
    ActivityRequest, BioBoxId, CollectedEffect, EventEnvelope, Evolution, EvolutionParams,
    GameContent, GenerationResult, GeneticsError, PeriodDelta, PeripheralError, PeripheralId,
    ProcessResult, RunToken, SchedulingError, StationState, Token, TokenWallet,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandOutcome};
use crate::persistence::{PersistenceError, PersistenceStore};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Peripheral(#[from] PeripheralError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    #[error(transparent)]
    Genetics(#[from] GeneticsError),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),
}

pub struct StationHost<S, W> {
    station: StationState,
    content: GameContent,
    store: S,
    wallet: W,
    events: Vec<EventEnvelope>,
}

impl<S: PersistenceStore, W: TokenWallet> StationHost<S, W> {
    /// Resumes the station saved in `store`.
    pub fn open(content: GameContent, store: S, wallet: W) -> Result<Self, HostError> {
        let station = store.load()?;
        info!(
            station = %station.id,
            clock_secs = station.meta.clock_secs,
            "station loaded"
        );
        Ok(Self {
            station,
            content,
            store,
            wallet,
            events: Vec::new(),
        })
    }

    /// Starts hosting a fresh station and writes its first save.
    pub fn create(
        content: GameContent,
        station: StationState,
        mut store: S,
        wallet: W,
    ) -> Result<Self, HostError> {
        store.save(&station)?;
        info!(station = %station.id, "station created");
        Ok(Self {
            station,
            content,
            store,
            wallet,
            events: Vec::new(),
        })
    }

    pub fn station(&self) -> &StationState {
        &self.station
    }

    pub fn content(&self) -> &GameContent {
        &self.content
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Station time used to start, boost and collect activities.
    pub fn now(&self) -> u64 {
        self.station.meta.clock_secs
    }

    /// Takes every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.events)
    }

    fn commit(&mut self) -> Result<(), HostError> {
        self.store.save(&self.station)?;
        Ok(())
    }

    // --- peripherals -----------------------------------------------------

    pub fn instant_use(&mut self, peripheral_id: &PeripheralId) -> Result<ProcessResult, HostError> {
        let result = peripheral::instant_use(&mut self.station, peripheral_id, &mut self.events)?;
        for issue in &result.issues {
            warn!(peripheral = %peripheral_id, %issue, "instant use issue");
        }
        info!(
            peripheral = %peripheral_id,
            energy = result.energy_spent,
            "peripheral used"
        );
        self.commit()?;
        Ok(result)
    }

    pub fn set_power(&mut self, peripheral_id: &PeripheralId, on: bool) -> Result<(), HostError> {
        peripheral::set_power(&mut self.station, peripheral_id, on, &mut self.events)?;
        info!(peripheral = %peripheral_id, on, "peripheral power set");
        self.commit()
    }

    pub fn repair(&mut self, peripheral_id: &PeripheralId) -> Result<(), HostError> {
        let now = self.now();
        peripheral::repair(&mut self.station, peripheral_id, now, &mut self.events)?;
        info!(peripheral = %peripheral_id, "peripheral repaired");
        self.commit()
    }

    // --- activities ------------------------------------------------------

    pub fn begin_activity(&mut self, request: &ActivityRequest) -> Result<Activity, HostError> {
        let now = self.now();
        let activity = scheduler::begin_activity(
            &mut self.station,
            &self.content,
            request,
            now,
            &mut self.events,
        )?;
        info!(
            activity = %activity.id,
            def = %activity.def_id,
            ends_at = activity.ends_at,
            "activity started"
        );
        self.commit()?;
        Ok(activity)
    }

    pub fn collect_activity(&mut self, activity_id: &ActivityId) -> Result<CollectedEffect, HostError> {
        let now = self.now();
        let collected = scheduler::collect_activity(
            &mut self.station,
            &self.content,
            activity_id,
            now,
            &mut self.events,
        )?;
        info!(
            activity = %activity_id,
            def = %collected.def_id,
            applied = collected.applied,
            "activity collected"
        );
        self.commit()?;
        Ok(collected)
    }

    pub fn boost_activity(&mut self, activity_id: &ActivityId, token: Token) -> Result<bool, HostError> {
        let now = self.now();
        let ready = scheduler::boost_activity(
            &mut self.station,
            activity_id,
            token,
            &mut self.wallet,
            &self.content.constants,
            now,
            &mut self.events,
        )?;
        info!(activity = %activity_id, ready, "activity boosted");
        self.commit()?;
        Ok(ready)
    }

    /// Boosts using a token drawn from the host's own wallet.
    pub fn boost_with_wallet(&mut self, activity_id: &ActivityId) -> Result<bool, HostError> {
        let Some(token) = self.wallet.request_token() else {
            warn!(activity = %activity_id, "no boost token left");
            return Err(SchedulingError::TokenUnavailable.into());
        };
        self.boost_activity(activity_id, token)
    }

    pub fn abandon_activity(&mut self, activity_id: &ActivityId) -> Result<Activity, HostError> {
        let activity =
            scheduler::abandon_activity(&mut self.station, activity_id, &mut self.events)?;
        info!(activity = %activity_id, "activity abandoned");
        self.commit()?;
        Ok(activity)
    }

    // --- accounting ------------------------------------------------------

    pub fn advance_accounting(&mut self, elapsed_secs: u64) -> Result<AccountingReport, HostError> {
        self.advance_accounting_with(elapsed_secs, |_| {})
    }

    /// Like [`Self::advance_accounting`], handing each period to `on_period`.
    pub fn advance_accounting_with(
        &mut self,
        elapsed_secs: u64,
        mut on_period: impl FnMut(&PeriodDelta),
    ) -> Result<AccountingReport, HostError> {
        let report = accounting::advance_with(
            &mut self.station,
            &self.content,
            elapsed_secs,
            &mut self.events,
            |delta| {
                debug!(
                    period = delta.index,
                    secs = delta.secs,
                    produced = delta.energy_produced,
                    consumed = delta.energy_consumed,
                    "accounting period"
                );
                on_period(delta);
            },
        );
        for problem in &report.problems {
            warn!(%problem, "accounting problem");
        }
        info!(
            elapsed_secs,
            periods = report.periods,
            clock_secs = self.station.meta.clock_secs,
            "accounting complete"
        );
        self.commit()?;
        Ok(report)
    }

    // --- bio boxes -------------------------------------------------------

    pub fn create_bio_box(
        &mut self,
        target: &str,
        population_size: usize,
        rng: &mut impl Rng,
    ) -> Result<BioBoxId, HostError> {
        let alphabet: Vec<char> = self.content.constants.gene_alphabet.chars().collect();
        let id = genetics::create_bio_box(
            &mut self.station,
            target,
            population_size,
            &alphabet,
            rng,
            &mut self.events,
        )?;
        info!(bio_box = %id, gene_target = target, population_size, "bio box created");
        self.commit()?;
        Ok(id)
    }

    pub fn remove_bio_box(&mut self, bio_box_id: &BioBoxId) -> Result<(), HostError> {
        genetics::remove_bio_box(&mut self.station, bio_box_id, &mut self.events)?;
        info!(bio_box = %bio_box_id, "bio box removed");
        self.commit()
    }

    /// Runs an evolution to completion on the calling thread.
    pub fn evolve_population<R: Rng>(
        &mut self,
        bio_box_id: &BioBoxId,
        rng: R,
    ) -> Result<Vec<GenerationResult>, HostError> {
        let params = EvolutionParams::from_constants(&self.content.constants);
        let results = genetics::run_evolution(
            &mut self.station,
            bio_box_id,
            params,
            rng,
            &mut self.events,
        )?;
        if let Some(last) = results.last() {
            info!(
                bio_box = %bio_box_id,
                generation = last.generation,
                best_fitness = last.best_fitness,
                "evolution finished"
            );
        }
        self.commit()?;
        Ok(results)
    }

    /// Opens a run for a box and returns its token with a ready-to-drive
    /// evolution. The box keeps its members until results are applied.
    pub fn start_evolution<R: Rng>(
        &mut self,
        bio_box_id: &BioBoxId,
        rng: R,
    ) -> Result<(RunToken, Evolution<R>), HostError> {
        let population = self
            .station
            .bio_boxes
            .iter()
            .find(|b| &b.id == bio_box_id)
            .map(|b| b.population.clone())
            .ok_or_else(|| GeneticsError::UnknownBioBox(bio_box_id.clone()))?;
        let params = EvolutionParams::from_constants(&self.content.constants);
        let evolution = Evolution::new(population, params, rng)?;
        let run = genetics::start_evolution(&mut self.station, bio_box_id)?;
        info!(bio_box = %bio_box_id, version = run.token.version, "evolution started");
        self.commit()?;
        Ok((run.token, evolution))
    }

    /// Applies one generation produced off-thread. Stale results are
    /// dropped and reported as `false`.
    pub fn apply_generation(
        &mut self,
        token: &RunToken,
        result: &GenerationResult,
    ) -> Result<bool, HostError> {
        if !genetics::apply_generation(&mut self.station, token, result, &mut self.events) {
            warn!(
                bio_box = %token.box_id,
                version = token.version,
                generation = result.generation,
                "stale generation discarded"
            );
            return Ok(false);
        }
        debug!(
            bio_box = %token.box_id,
            generation = result.generation,
            best_fitness = result.best_fitness,
            "generation applied"
        );
        self.commit()?;
        Ok(true)
    }

    // --- dispatch --------------------------------------------------------

    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, HostError> {
        let outcome = match command {
            Command::InstantUse { peripheral_id } => {
                CommandOutcome::Processed(self.instant_use(&peripheral_id)?)
            }
            Command::SetPower { peripheral_id, on } => {
                self.set_power(&peripheral_id, on)?;
                CommandOutcome::PowerSet
            }
            Command::Repair { peripheral_id } => {
                self.repair(&peripheral_id)?;
                CommandOutcome::Repaired
            }
            Command::BeginActivity(request) => {
                CommandOutcome::Started(self.begin_activity(&request)?)
            }
            Command::CollectActivity { activity_id } => {
                CommandOutcome::Collected(self.collect_activity(&activity_id)?)
            }
            Command::BoostActivity { activity_id } => CommandOutcome::Boosted {
                ready: self.boost_with_wallet(&activity_id)?,
            },
            Command::AbandonActivity { activity_id } => {
                CommandOutcome::Abandoned(self.abandon_activity(&activity_id)?)
            }
            Command::AdvanceAccounting { elapsed_secs } => {
                CommandOutcome::Accounted(self.advance_accounting(elapsed_secs)?)
            }
            Command::CreateBioBox {
                target,
                population_size,
                seed,
            } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                CommandOutcome::BioBoxCreated(self.create_bio_box(
                    &target,
                    population_size,
                    &mut rng,
                )?)
            }
            Command::RemoveBioBox { bio_box_id } => {
                self.remove_bio_box(&bio_box_id)?;
                CommandOutcome::BioBoxRemoved(bio_box_id)
            }
            Command::EvolvePopulation { bio_box_id, seed } => CommandOutcome::Evolved(
                self.evolve_population(&bio_box_id, ChaCha8Rng::seed_from_u64(seed))?,
            ),
        };
        Ok(outcome)
    }
}
