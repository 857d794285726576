use std::sync::Arc;

use anyhow::{anyhow, Result};
use colony_control::{Command, CommandOutcome};
use colony_core::{AccountingReport, BioBoxId, EventEnvelope, PeriodDelta, RunToken, StationState};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::actor::Request;

/// Read-only copy of the station, replaced after every mutation.
pub type SharedSnapshot = Arc<RwLock<StationState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

/// Result of a catch-up request, with the flows of each period.
#[derive(Debug, Clone)]
pub struct CatchUp {
    pub report: AccountingReport,
    pub periods: Vec<PeriodDelta>,
}

/// Cloneable front door to a running [`crate::actor::StationActor`].
#[derive(Clone)]
pub struct StationHandle {
    pub(crate) requests: mpsc::Sender<Request>,
    pub(crate) snapshot: SharedSnapshot,
    pub(crate) event_tx: EventTx,
}

impl StationHandle {
    pub async fn apply(&self, command: Command) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command { command, reply }).await?;
        rx.await
            .map_err(|_| anyhow!("station actor dropped the reply"))?
            .map_err(anyhow::Error::from)
    }

    pub async fn catch_up(&self, elapsed_secs: u64) -> Result<CatchUp> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::CatchUp {
            elapsed_secs,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| anyhow!("station actor dropped the reply"))?
            .map_err(anyhow::Error::from)
    }

    /// Starts a background evolution run. Generations are applied as they
    /// arrive; the returned token identifies the run.
    pub async fn evolve(&self, bio_box_id: BioBoxId) -> Result<RunToken> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Evolve { bio_box_id, reply }).await?;
        rx.await
            .map_err(|_| anyhow!("station actor dropped the reply"))?
            .map_err(anyhow::Error::from)
    }

    pub fn snapshot(&self) -> StationState {
        self.snapshot.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<EventEnvelope>> {
        self.event_tx.subscribe()
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| anyhow!("station actor stopped"))
    }
}
