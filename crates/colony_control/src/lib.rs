//! `colony_control`: host-side facade and controllers around `colony_core`.
//!
//! `StationHost` owns a station, dispatches [`Command`]s and saves through a
//! [`PersistenceStore`]. Controllers implement [`CommandSource`].

mod autopilot;
mod command;
mod host;
mod persistence;
mod wallet;

pub use autopilot::{boost_candidate, LifeSupportAutopilot};
pub use command::{Command, CommandOutcome};
pub use host::{HostError, StationHost};
pub use persistence::{MemoryStore, PersistenceError, PersistenceStore};
pub use wallet::CountingWallet;

use colony_core::{GameContent, StationState};

pub trait CommandSource {
    fn generate_commands(&mut self, station: &StationState, content: &GameContent) -> Vec<Command>;
}
