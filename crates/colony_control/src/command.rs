use colony_core::{
    AccountingReport, Activity, ActivityId, ActivityRequest, BioBoxId, CollectedEffect,
    GenerationResult, PeripheralId, ProcessResult,
};
use serde::{Deserialize, Serialize};

/// One player or controller action against a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    InstantUse {
        peripheral_id: PeripheralId,
    },
    SetPower {
        peripheral_id: PeripheralId,
        on: bool,
    },
    Repair {
        peripheral_id: PeripheralId,
    },
    BeginActivity(ActivityRequest),
    CollectActivity {
        activity_id: ActivityId,
    },
    /// Requests a token from the host's wallet and spends it.
    BoostActivity {
        activity_id: ActivityId,
    },
    AbandonActivity {
        activity_id: ActivityId,
    },
    AdvanceAccounting {
        elapsed_secs: u64,
    },
    CreateBioBox {
        target: String,
        population_size: usize,
        seed: u64,
    },
    RemoveBioBox {
        bio_box_id: BioBoxId,
    },
    EvolvePopulation {
        bio_box_id: BioBoxId,
        seed: u64,
    },
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Processed(ProcessResult),
    PowerSet,
    Repaired,
    Started(Activity),
    Collected(CollectedEffect),
    Boosted { ready: bool },
    Abandoned(Activity),
    Accounted(AccountingReport),
    BioBoxCreated(BioBoxId),
    BioBoxRemoved(BioBoxId),
    Evolved(Vec<GenerationResult>),
}
