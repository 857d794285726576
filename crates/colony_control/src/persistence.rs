//! Where a host keeps its station between sessions.

use colony_core::StationState;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("no saved station")]
    NotFound,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is corrupt: {0}")]
    Corrupt(String),
}

pub trait PersistenceStore {
    fn save(&mut self, station: &StationState) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<StationState, PersistenceError>;
}

/// Keeps the last saved snapshot in memory. Used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Option<StationState>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_station(station: StationState) -> Self {
        Self {
            saved: Some(station),
            saves: 0,
        }
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PersistenceStore for MemoryStore {
    fn save(&mut self, station: &StationState) -> Result<(), PersistenceError> {
        self.saved = Some(station.clone());
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<StationState, PersistenceError> {
        self.saved.clone().ok_or(PersistenceError::NotFound)
    }
}
