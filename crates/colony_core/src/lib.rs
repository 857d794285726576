//! `colony_core`: station resource economy.
//!
//! No IO, no logging. Mutating calls report what happened by pushing
//! `EventEnvelope`s; all randomness comes through a passed-in Rng.

pub mod accounting;
pub mod air;
pub mod genetics;
mod id;
pub mod ledger;
pub mod peripheral;
pub mod scheduler;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use accounting::{advance, advance_with, AccountingReport, PeriodDelta, Problem, Snapshot};
pub use air::AirComposition;
pub use genetics::{
    apply_generation, create_bio_box, remove_bio_box, run_evolution, start_evolution,
    BioPopulation, Evolution, EvolutionParams, EvolutionRun, GenerationResult, GeneticsError,
    RunToken,
};
pub use id::generate_uuid;
pub use ledger::{Battery, Level, ResourceLedger, SolarPanel, StorageBox, Tank};
pub use peripheral::{instant_use, InstantRecipe, Issue, PeripheralError, ProcessResult};
pub use scheduler::{
    abandon_activity, begin_activity, boost_activity, collect_activity, remaining_time,
    ActivityRequest, CollectedEffect, SchedulingError, Token, TokenWallet,
};
pub use types::*;

/// Save layout version written into `MetaState`.
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) fn emit(counters: &mut Counters, clock_secs: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        clock_secs,
        event,
    }
}

pub(crate) fn next_entity_id(counters: &mut Counters, prefix: &str) -> String {
    let id = format!("{prefix}_{:04}", counters.next_entity_id);
    counters.next_entity_id += 1;
    id
}

#[cfg(test)]
mod tests;
