use std::sync::Arc;
use std::time::Duration;

use colony_control::{boost_candidate, Command, CommandSource, HostError, LifeSupportAutopilot};
use colony_core::{GameContent, SchedulingError, StationState};
use tracing::{debug, info, warn};

use crate::state::StationHandle;

pub struct LoopConfig {
    /// Station seconds reconciled per tick.
    pub secs_per_tick: u64,
    /// Wall-clock pacing; 0 runs as fast as the actor answers.
    pub ticks_per_sec: f64,
    pub max_ticks: Option<u64>,
    pub autopilot: bool,
}

/// Drives catch-up accounting, optionally letting the autopilot act before
/// each tick. With the autopilot on, one boost token per tick goes to the
/// activity closest to done until the wallet runs dry. Ends after
/// `max_ticks` or when the actor goes away.
pub async fn run_accounting_loop(
    handle: StationHandle,
    content: Arc<GameContent>,
    config: LoopConfig,
) {
    let mut interval = if config.ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / config.ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        Some(iv)
    } else {
        None
    };
    let mut autopilot = LifeSupportAutopilot;
    let mut boosting = config.autopilot;
    let mut ticks = 0u64;

    loop {
        if config.autopilot {
            let station = handle.snapshot();
            for command in autopilot.generate_commands(&station, &content) {
                if let Err(err) = handle.apply(command).await {
                    warn!(error = %err, "autopilot command rejected");
                }
            }
        }
        if boosting {
            boosting = boost_next(&handle, &handle.snapshot()).await;
        }

        match handle.catch_up(config.secs_per_tick).await {
            Ok(catch_up) => {
                for problem in &catch_up.report.problems {
                    warn!(%problem, "station problem");
                }
            }
            Err(err) => {
                warn!(error = %err, "accounting loop stopping");
                break;
            }
        }

        ticks += 1;
        if config.max_ticks.is_some_and(|max| ticks >= max) {
            info!(ticks, "accounting loop reached max ticks");
            break;
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

/// Returns false once the wallet has no tokens left.
async fn boost_next(handle: &StationHandle, station: &StationState) -> bool {
    let Some(activity_id) = boost_candidate(station) else {
        return true;
    };
    match handle
        .apply(Command::BoostActivity {
            activity_id: activity_id.clone(),
        })
        .await
    {
        Ok(_) => {
            debug!(activity = %activity_id, "autopilot boosted activity");
            true
        }
        Err(err) => {
            let exhausted = matches!(
                err.downcast_ref::<HostError>(),
                Some(HostError::Scheduling(SchedulingError::TokenUnavailable))
            );
            if exhausted {
                info!("boost tokens exhausted");
            } else {
                warn!(activity = %activity_id, error = %err, "boost rejected");
            }
            !exhausted
        }
    }
}
