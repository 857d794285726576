use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colony_control::{
    boost_candidate, Command, CommandOutcome, CommandSource, CountingWallet,
    LifeSupportAutopilot, MemoryStore, PersistenceStore, StationHost,
};
use colony_core::genetics::random_genes;
use colony_core::{
    BioPopulation, Event, EventEnvelope, Evolution, EvolutionParams, Fluid, GameContent,
    Ingredient,
};
use colony_world::{build_initial_station, load_content, JsonFileStore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "colony_cli", about = "Colony resource economy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Advance a station hour by hour with the life-support autopilot.
    Run {
        #[arg(long)]
        hours: u64,
        /// Seed for a freshly generated station.
        #[arg(long)]
        seed: Option<u64>,
        /// Save file. Loaded when present, otherwise created; written after every change.
        #[arg(long = "state")]
        state_file: Option<String>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 6)]
        print_every: u64,
        /// Boost tokens, spent one per hour on the activity closest to done.
        #[arg(long, default_value_t = 0)]
        tokens: u32,
    },
    /// Evolve a random population toward a target gene string.
    Evolve {
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = 30)]
        population: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Overrides `max_generations` from constants.json.
        #[arg(long)]
        max_generations: Option<u32>,
        /// Overrides `mutation_chance` from constants.json.
        #[arg(long)]
        mutation_chance: Option<u32>,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

struct RunOptions {
    hours: u64,
    print_every: u64,
}

fn run(
    options: &RunOptions,
    seed: Option<u64>,
    state_file: Option<String>,
    content: GameContent,
    tokens: u32,
) -> Result<()> {
    let wallet = CountingWallet::new(tokens);
    let resolved_seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(resolved_seed);

    if let Some(path) = state_file {
        let store = JsonFileStore::new(path);
        let host = if store.exists() {
            StationHost::open(content, store, wallet).context("opening saved station")?
        } else {
            let station = build_initial_station(&content, &mut rng);
            StationHost::create(content, station, store, wallet).context("writing first save")?
        };
        drive(host, options)
    } else {
        let station = build_initial_station(&content, &mut rng);
        println!("Generated station {} from seed {resolved_seed}", station.id);
        let host = StationHost::create(content, station, MemoryStore::new(), wallet)?;
        drive(host, options)
    }
}

fn drive<S: PersistenceStore>(
    mut host: StationHost<S, CountingWallet>,
    options: &RunOptions,
) -> Result<()> {
    let mut autopilot = LifeSupportAutopilot;
    let period = host.content().constants.accounting_period_secs.max(1);

    println!(
        "Starting run: hours={} station={} crew={} content_version={}",
        options.hours,
        host.station().id,
        host.station().crew.len(),
        host.content().content_version,
    );
    println!("{}", "-".repeat(80));

    for hour in 1..=options.hours {
        let commands = autopilot.generate_commands(host.station(), host.content());
        for command in commands {
            if let Err(err) = host.apply(command) {
                warn!(error = %err, "autopilot command rejected");
            }
        }

        boost_next(&mut host);

        let report = host
            .advance_accounting(period)
            .context("advancing accounting")?;
        for problem in &report.problems {
            println!("!!! {problem}");
        }
        for event in host.drain_events() {
            print_notable(&event);
        }

        if hour % options.print_every.max(1) == 0 {
            print_status(&host);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done after {} hours:", options.hours);
    print_status(&host);
    Ok(())
}

fn boost_next<S: PersistenceStore>(host: &mut StationHost<S, CountingWallet>) {
    if host.wallet().balance() == 0 {
        return;
    }
    let Some(activity_id) = boost_candidate(host.station()) else {
        return;
    };
    match host.apply(Command::BoostActivity {
        activity_id: activity_id.clone(),
    }) {
        Ok(CommandOutcome::Boosted { ready }) => {
            let note = if ready { ", ready to collect" } else { "" };
            println!(
                "    boosted {activity_id}{note} ({} tokens left)",
                host.wallet().balance()
            );
        }
        Ok(_) => {}
        Err(err) => warn!(activity = %activity_id, error = %err, "boost rejected"),
    }
}

fn print_notable(envelope: &EventEnvelope) {
    match &envelope.event {
        Event::ActivityCollected {
            def_id, applied, ..
        } => {
            let note = if *applied { "" } else { " (already known)" };
            println!("*** COLLECTED: {def_id}{note} ***");
        }
        Event::ResourceDiscarded { resource, amount } => {
            println!("    discarded {amount:.1} {resource}");
        }
        _ => {}
    }
}

fn print_status<S: PersistenceStore>(host: &StationHost<S, CountingWallet>) {
    let station = host.station();
    let clock = station.meta.clock_secs;
    let day = clock / 86_400;
    let hour = (clock % 86_400) / 3600;
    let ledger = &station.ledger;

    println!(
        "[day={day} hour={hour:02}]  energy={energy:.0}/{capacity:.0}  \
         water={water:.1}  food={food:.1}  o2={o2:.1}  co2={co2:.1}  \
         activities={activities}",
        energy = ledger.stored_energy(),
        capacity = ledger.energy_capacity(),
        water = ledger.total_fluid(Fluid::Water),
        food = ledger.total_ingredient(Ingredient::Food),
        o2 = station.air.o2,
        co2 = station.air.co2,
        activities = station.activities.len(),
    );
}

// ---------------------------------------------------------------------------
// Evolution
// ---------------------------------------------------------------------------

fn evolve(
    content: &GameContent,
    target: String,
    population: usize,
    seed: Option<u64>,
    overrides: (Option<u32>, Option<u32>),
) -> Result<()> {
    let mut params = EvolutionParams::from_constants(&content.constants);
    if let Some(max) = overrides.0 {
        params.max_generations = max;
    }
    if let Some(chance) = overrides.1 {
        params.mutation_chance = chance;
    }

    let resolved_seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(resolved_seed);
    let len = target.chars().count();
    let members = (0..population)
        .map(|_| random_genes(&mut rng, &params.alphabet, len))
        .collect();
    let start = BioPopulation {
        target,
        members,
        generation: 0,
    };

    println!(
        "Evolving {population} members toward '{}' (seed {resolved_seed})",
        start.target
    );
    let mut last = None;
    for result in Evolution::new(start, params, rng)? {
        println!(
            "gen={:4}  best={}  fitness={:4}  generation_best={:4}",
            result.generation, result.best, result.best_fitness, result.generation_best_fitness,
        );
        last = Some(result);
    }

    match last {
        Some(result) if result.best_fitness == 0 => {
            println!("Matched target at generation {}", result.generation);
        }
        Some(result) => println!(
            "Stopped at generation {} with fitness {}",
            result.generation, result.best_fitness
        ),
        None => println!("No generations produced"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            hours,
            seed,
            state_file,
            content_dir,
            print_every,
            tokens,
        } => {
            let content = load_content(&content_dir)?;
            run(
                &RunOptions { hours, print_every },
                seed,
                state_file,
                content,
                tokens,
            )?;
        }
        Commands::Evolve {
            target,
            population,
            seed,
            content_dir,
            max_generations,
            mutation_chance,
        } => {
            let content = load_content(&content_dir)?;
            evolve(
                &content,
                target,
                population,
                seed,
                (max_generations, mutation_chance),
            )?;
        }
    }
    Ok(())
}
