//! Single-owner task for one station.
//!
//! All mutation happens inside [`StationActor::run`]. Evolution runs on
//! blocking workers, which send generations back tagged with a run token;
//! the actor applies them in arrival order and the host drops stale ones.
//! Starting a new run on a box stops the worker of the run it replaces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colony_control::{
    Command, CommandOutcome, CountingWallet, HostError, PersistenceStore, StationHost,
};
use colony_core::{BioBoxId, Evolution, GenerationResult, RunToken};
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::state::{CatchUp, EventTx, SharedSnapshot, StationHandle};

const REQUEST_QUEUE: usize = 64;
const GENERATION_QUEUE: usize = 256;
const EVENT_QUEUE: usize = 256;

pub enum Request {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome, HostError>>,
    },
    CatchUp {
        elapsed_secs: u64,
        reply: oneshot::Sender<Result<CatchUp, HostError>>,
    },
    Evolve {
        bio_box_id: BioBoxId,
        reply: oneshot::Sender<Result<RunToken, HostError>>,
    },
}

type GenerationMsg = (RunToken, GenerationResult);

pub struct StationActor<S> {
    host: StationHost<S, CountingWallet>,
    rng: ChaCha8Rng,
    requests: mpsc::Receiver<Request>,
    generations_tx: mpsc::Sender<GenerationMsg>,
    generations: mpsc::Receiver<GenerationMsg>,
    /// Stop flag of the newest run per box.
    runs: HashMap<BioBoxId, Arc<AtomicBool>>,
    snapshot: SharedSnapshot,
    event_tx: EventTx,
}

impl<S: PersistenceStore + Send + 'static> StationActor<S> {
    /// Builds the actor and the handle used to talk to it. Nothing runs until
    /// [`Self::spawn`] or [`Self::run`] is called.
    pub fn new(host: StationHost<S, CountingWallet>, seed: u64) -> (Self, StationHandle) {
        let (requests_tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let (generations_tx, generations) = mpsc::channel(GENERATION_QUEUE);
        let (event_tx, _) = broadcast::channel(EVENT_QUEUE);
        let handle = StationHandle {
            requests: requests_tx,
            snapshot: Arc::new(RwLock::new(host.station().clone())),
            event_tx,
        };
        let actor = Self {
            host,
            rng: ChaCha8Rng::seed_from_u64(seed),
            requests,
            generations_tx,
            generations,
            runs: HashMap::new(),
            snapshot: Arc::clone(&handle.snapshot),
            event_tx: handle.event_tx.clone(),
        };
        (actor, handle)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serves requests until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    self.handle_request(request);
                }
                Some((token, result)) = self.generations.recv() => {
                    self.handle_generation(&token, &result);
                }
            }
        }
        info!("station actor stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command { command, reply } => {
                let outcome = self.host.apply(command);
                self.publish();
                let _ = reply.send(outcome);
            }
            Request::CatchUp {
                elapsed_secs,
                reply,
            } => {
                let mut periods = Vec::new();
                let outcome = self
                    .host
                    .advance_accounting_with(elapsed_secs, |delta| periods.push(delta.clone()))
                    .map(|report| CatchUp { report, periods });
                self.publish();
                let _ = reply.send(outcome);
            }
            Request::Evolve { bio_box_id, reply } => {
                let outcome = self.begin_evolution(&bio_box_id);
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    /// Starts a run and moves it onto a blocking worker.
    pub(crate) fn begin_evolution(&mut self, bio_box_id: &BioBoxId) -> Result<RunToken, HostError> {
        let rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
        let (token, evolution) = self.host.start_evolution(bio_box_id, rng)?;
        let superseded = Arc::new(AtomicBool::new(false));
        if let Some(previous) = self.runs.insert(bio_box_id.clone(), Arc::clone(&superseded)) {
            previous.store(true, Ordering::Release);
        }
        spawn_evolution(token.clone(), evolution, superseded, self.generations_tx.clone());
        Ok(token)
    }

    /// Returns whether the generation was written to its box.
    pub(crate) fn handle_generation(&mut self, token: &RunToken, result: &GenerationResult) -> bool {
        match self.host.apply_generation(token, result) {
            Ok(applied) => {
                if applied {
                    self.publish();
                }
                applied
            }
            Err(err) => {
                warn!(bio_box = %token.box_id, error = %err, "failed to save generation");
                self.publish();
                false
            }
        }
    }

    fn publish(&mut self) {
        *self.snapshot.write() = self.host.station().clone();
        let events = self.host.drain_events();
        if !events.is_empty() {
            // No subscribers is fine.
            let _ = self.event_tx.send(events);
        }
    }
}

fn spawn_evolution(
    token: RunToken,
    evolution: Evolution<ChaCha8Rng>,
    superseded: Arc<AtomicBool>,
    tx: mpsc::Sender<GenerationMsg>,
) {
    tokio::task::spawn_blocking(move || breed(&token, evolution, &superseded, &tx));
}

/// Sends generations until the run ends or a newer run replaces it. Blocks
/// the calling thread.
fn breed(
    token: &RunToken,
    evolution: Evolution<ChaCha8Rng>,
    superseded: &AtomicBool,
    tx: &mpsc::Sender<GenerationMsg>,
) {
    for result in evolution {
        if superseded.load(Ordering::Acquire) {
            debug!(
                bio_box = %token.box_id,
                version = token.version,
                "superseded run stopped"
            );
            break;
        }
        debug!(
            bio_box = %token.box_id,
            version = token.version,
            generation = result.generation,
            "generation bred"
        );
        if tx.blocking_send((token.clone(), result)).is_err() {
            break;
        }
    }
}
