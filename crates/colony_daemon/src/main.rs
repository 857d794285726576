mod actor;
mod state;
mod tick_loop;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colony_control::{
    Command, CommandOutcome, CountingWallet, MemoryStore, PersistenceStore, StationHost,
};
use colony_core::{Event, EventEnvelope, GameContent};
use colony_world::{build_initial_station, load_content, JsonFileStore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::actor::StationActor;
use crate::state::StationHandle;
use crate::tick_loop::{run_accounting_loop, LoopConfig};

#[derive(Parser)]
#[command(name = "colony_daemon", about = "Colony station host")]
struct Args {
    #[arg(long, default_value = "./content")]
    content_dir: String,
    /// Save file. Loaded when present, otherwise created.
    #[arg(long = "state")]
    state_file: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1.0)]
    ticks_per_sec: f64,
    /// Station seconds reconciled per tick.
    #[arg(long, default_value_t = 3600)]
    secs_per_tick: u64,
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Boost tokens the autopilot spends on running activities.
    #[arg(long, default_value_t = 0)]
    tokens: u32,
    /// Let the life-support autopilot act before every tick.
    #[arg(long)]
    autopilot: bool,
    /// Cultivate a bio box toward this gene string in the background.
    #[arg(long)]
    evolve_target: Option<String>,
    #[arg(long, default_value_t = 30)]
    population: usize,
}

struct Cultivation {
    target: String,
    population: usize,
}

fn log_events(mut rx: broadcast::Receiver<Vec<EventEnvelope>>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(batch) => batch.iter().for_each(log_event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(envelope: &EventEnvelope) {
    match &envelope.event {
        Event::ActivityCollected {
            activity_id,
            def_id,
            applied,
        } => info!(
            id = %envelope.id,
            activity = %activity_id,
            def = %def_id,
            applied,
            "activity collected"
        ),
        Event::GenerationEvolved {
            bio_box_id,
            generation,
            best_fitness,
        } => debug!(
            id = %envelope.id,
            bio_box = %bio_box_id,
            generation,
            best_fitness,
            "generation evolved"
        ),
        other => debug!(id = %envelope.id, event = ?other, "event"),
    }
}

async fn start_cultivation(
    handle: &StationHandle,
    cultivation: Cultivation,
    seed: u64,
) -> Result<()> {
    let outcome = handle
        .apply(Command::CreateBioBox {
            target: cultivation.target,
            population_size: cultivation.population,
            seed,
        })
        .await?;
    let CommandOutcome::BioBoxCreated(bio_box_id) = outcome else {
        bail!("bio box creation returned an unexpected outcome");
    };
    let token = handle.evolve(bio_box_id).await?;
    info!(bio_box = %token.box_id, version = token.version, "cultivation started");
    Ok(())
}

async fn serve<S: PersistenceStore + Send + 'static>(
    host: StationHost<S, CountingWallet>,
    content: Arc<GameContent>,
    seed: u64,
    config: LoopConfig,
    cultivation: Option<Cultivation>,
) -> Result<()> {
    let (actor, handle) = StationActor::new(host, seed);
    log_events(handle.subscribe());
    let actor_task = actor.spawn();

    if let Some(cultivation) = cultivation {
        start_cultivation(&handle, cultivation, seed).await?;
    }

    run_accounting_loop(handle.clone(), content, config).await;

    let station = handle.snapshot();
    info!(
        station = %station.id,
        clock_secs = station.meta.clock_secs,
        "shutting down"
    );
    drop(handle);
    actor_task.await.context("station actor panicked")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let content = load_content(&args.content_dir)?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let wallet = CountingWallet::new(args.tokens);
    let config = LoopConfig {
        secs_per_tick: args.secs_per_tick,
        ticks_per_sec: args.ticks_per_sec,
        max_ticks: args.max_ticks,
        autopilot: args.autopilot,
    };
    let cultivation = args.evolve_target.map(|target| Cultivation {
        target,
        population: args.population,
    });
    info!(seed, content_version = %content.content_version, "starting colony daemon");

    if let Some(path) = args.state_file {
        let store = JsonFileStore::new(path);
        let host = if store.exists() {
            StationHost::open(content.clone(), store, wallet).context("opening saved station")?
        } else {
            let station = build_initial_station(&content, &mut rng);
            StationHost::create(content.clone(), station, store, wallet)
                .context("writing first save")?
        };
        serve(host, Arc::new(content), seed, config, cultivation).await
    } else {
        let station = build_initial_station(&content, &mut rng);
        let host = StationHost::create(content.clone(), station, MemoryStore::new(), wallet)?;
        serve(host, Arc::new(content), seed, config, cultivation).await
    }
}
