//! Time-bounded crafting and research activities.
//!
//! Lifecycle: `begin_activity` validates and charges, `collect_activity` applies
//! the effect once the end time has passed, `abandon_activity` drops it without
//! a refund. Nothing here runs on a timer: callers ask `remaining_time`.

use serde::{Deserialize, Serialize};

use crate::ledger::{Battery, Level, SolarPanel, StorageBox, Tank};
use crate::{
    Activity, ActivityDefId, ActivityEffect, ActivityId, ActivityKind, BatteryId, BoxId,
    Constants, Event, EventEnvelope, GameContent, Ingredient, IngredientCost, ModuleChange,
    ModuleId, ModuleKind, PanelId, PeripheralId, PeripheralState, ProductionModule, Resource,
    Skill, StationState, TankId, Worker, WorkerId, WorkerList,
};

// ---------------------------------------------------------------------------
// Requests, results, errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub def_id: ActivityDefId,
    pub workers: Vec<WorkerId>,
    pub module: Option<ModuleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedEffect {
    pub activity_id: ActivityId,
    pub def_id: ActivityDefId,
    pub effect: ActivityEffect,
    /// False when a research item had already been applied.
    pub applied: bool,
    pub messages: Vec<String>,
}

/// Scarce currency spent to shorten an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token(pub String);

/// Source of boost tokens, owned by the host.
pub trait TokenWallet {
    fn request_token(&mut self) -> Option<Token>;
    fn spend_token(&mut self, token: Token) -> bool;
    /// Hands back a requested token that was never spent.
    fn release_token(&mut self, token: Token);
}

fn describe_ingredients(missing: &[(Ingredient, f32)]) -> String {
    missing
        .iter()
        .map(|(ingredient, amount)| format!("{amount:.1} {ingredient}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_skills(missing: &[(Skill, u32)]) -> String {
    missing
        .iter()
        .map(|(skill, level)| format!("{skill:?} +{level}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("activity definition {0} does not exist")]
    UnknownActivityDef(ActivityDefId),
    #[error("worker {0} does not exist")]
    UnknownWorker(WorkerId),
    #[error("module {0} does not exist")]
    UnknownModule(ModuleId),
    #[error("module {module} is {actual:?}, activity needs {expected:?}")]
    WrongModuleKind {
        module: ModuleId,
        expected: ModuleKind,
        actual: ModuleKind,
    },
    #[error("activity {0} needs a {1:?} module")]
    ModuleRequired(ActivityDefId, ModuleKind),
    #[error("{busy} is already occupied by activity {activity}")]
    ActivityAlreadyRunning { busy: String, activity: ActivityId },
    #[error("missing ingredients: {}", describe_ingredients(.missing))]
    InsufficientResource { missing: Vec<(Ingredient, f32)> },
    #[error("missing skills: {}", describe_skills(.missing))]
    InsufficientSkill { missing: Vec<(Skill, u32)> },
    #[error("activity {0} does not exist")]
    UnknownActivity(ActivityId),
    #[error("activity {activity} finishes in {remaining_secs}s")]
    NotFinished {
        activity: ActivityId,
        remaining_secs: u64,
    },
    #[error("boost token was not accepted")]
    TokenUnavailable,
}

// ---------------------------------------------------------------------------
// Duration discount
// ---------------------------------------------------------------------------

/// Average of intelligence, happiness and teamwork, each clamped to 0–100.
pub fn worker_score(worker: &Worker) -> f32 {
    let clamp = |v: f32| v.clamp(0.0, 100.0);
    (clamp(worker.intelligence) + clamp(worker.happiness) + clamp(worker.teamwork)) / 3.0
}

/// Fraction of the base duration removed by the crew: the mean score mapped
/// onto `0..=max_discount`. No workers means no discount.
pub fn duration_discount(workers: &[&Worker], max_discount: f32) -> f32 {
    if workers.is_empty() {
        return 0.0;
    }
    let mean = workers.iter().map(|w| worker_score(w)).sum::<f32>() / workers.len() as f32;
    (mean / 100.0) * max_discount.clamp(0.0, 1.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn discounted_duration(base_secs: u64, discount: f32) -> u64 {
    let secs = (base_secs as f64 * (1.0 - f64::from(discount.clamp(0.0, 1.0)))).round();
    (secs as u64).max(1)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn remaining_time(activity: &Activity, now: u64) -> u64 {
    activity.ends_at.saturating_sub(now)
}

/// Completion fraction in `[0, 1]`.
pub fn progress(activity: &Activity, now: u64) -> f32 {
    let total = activity.ends_at.saturating_sub(activity.started_at).max(1);
    let done = now.saturating_sub(activity.started_at).min(total);
    done as f32 / total as f32
}

/// Activities whose end time has passed, in start order.
pub fn finished_activities(station: &StationState, now: u64) -> Vec<ActivityId> {
    station
        .activities
        .iter()
        .filter(|a| a.ends_at <= now)
        .map(|a| a.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Costs merged per ingredient, in first-listed order.
fn summed_costs(costs: &[IngredientCost]) -> Vec<(Ingredient, f32)> {
    let mut summed: Vec<(Ingredient, f32)> = Vec::with_capacity(costs.len());
    for cost in costs {
        match summed.iter_mut().find(|(ingredient, _)| *ingredient == cost.ingredient) {
            Some((_, amount)) => *amount += cost.amount,
            None => summed.push((cost.ingredient, cost.amount)),
        }
    }
    summed
}

fn check_module(
    station: &StationState,
    def_id: &ActivityDefId,
    required: Option<ModuleKind>,
    module: Option<&ModuleId>,
) -> Result<(), SchedulingError> {
    let Some(module_id) = module else {
        return match required {
            Some(kind) => Err(SchedulingError::ModuleRequired(def_id.clone(), kind)),
            None => Ok(()),
        };
    };
    let Some(found) = station.modules.iter().find(|m| &m.id == module_id) else {
        return Err(SchedulingError::UnknownModule(module_id.clone()));
    };
    if let Some(expected) = required {
        if found.kind != expected {
            return Err(SchedulingError::WrongModuleKind {
                module: module_id.clone(),
                expected,
                actual: found.kind,
            });
        }
    }
    if let Some(running) = station
        .activities
        .iter()
        .find(|a| a.module.as_ref() == Some(module_id))
    {
        return Err(SchedulingError::ActivityAlreadyRunning {
            busy: module_id.0.clone(),
            activity: running.id.clone(),
        });
    }
    Ok(())
}

/// Starts an activity. Every validation runs before the first mutation, so
/// an error leaves the ledger and worker state untouched.
pub fn begin_activity(
    station: &mut StationState,
    content: &GameContent,
    request: &ActivityRequest,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) -> Result<Activity, SchedulingError> {
    let Some(def) = content.activity_def(&request.def_id) else {
        return Err(SchedulingError::UnknownActivityDef(request.def_id.clone()));
    };

    let mut crew: Vec<&Worker> = Vec::with_capacity(request.workers.len());
    for worker_id in &request.workers {
        let Some(worker) = station.crew.iter().find(|w| &w.id == worker_id) else {
            return Err(SchedulingError::UnknownWorker(worker_id.clone()));
        };
        if let Some(activity) = &worker.activity {
            return Err(SchedulingError::ActivityAlreadyRunning {
                busy: worker_id.0.clone(),
                activity: activity.clone(),
            });
        }
        if !crew.iter().any(|w| w.id == worker.id) {
            crew.push(worker);
        }
    }
    check_module(station, &def.id, def.module_kind, request.module.as_ref())?;

    let costs = summed_costs(&def.ingredients);
    let missing: Vec<(Ingredient, f32)> = costs
        .iter()
        .filter_map(|&(ingredient, amount)| {
            let have = station.ledger.total_ingredient(ingredient);
            (have < amount).then(|| (ingredient, amount - have))
        })
        .collect();
    if !missing.is_empty() {
        return Err(SchedulingError::InsufficientResource { missing });
    }

    let missing_skills: Vec<(Skill, u32)> = def
        .skills
        .iter()
        .filter_map(|req| {
            let total: u32 = crew.iter().map(|w| w.skill_level(req.skill)).sum();
            (total < req.level).then(|| (req.skill, req.level - total))
        })
        .collect();
    if !missing_skills.is_empty() {
        return Err(SchedulingError::InsufficientSkill {
            missing: missing_skills,
        });
    }

    let discount = duration_discount(&crew, content.constants.max_duration_discount);
    let duration = discounted_duration(def.duration_secs, discount);
    let workers: WorkerList = crew.iter().map(|w| w.id.clone()).collect();

    // Charged irrevocably: abandoning later refunds nothing.
    for &(ingredient, amount) in &costs {
        let charged = station.ledger.withdraw_ingredient(ingredient, amount);
        debug_assert!(charged, "{ingredient} passed the stock check but could not be charged");
    }

    let activity = Activity {
        id: ActivityId(format!("act_{:06}", station.counters.next_activity_id)),
        def_id: def.id.clone(),
        kind: def.kind,
        started_at: now,
        ends_at: now + duration,
        workers,
        module: request.module.clone(),
    };
    station.counters.next_activity_id += 1;

    for worker in &mut station.crew {
        if activity.workers.contains(&worker.id) {
            worker.activity = Some(activity.id.clone());
        }
    }
    station.activities.push(activity.clone());

    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ActivityStarted {
            activity_id: activity.id.clone(),
            def_id: activity.def_id.clone(),
            ends_at: activity.ends_at,
        },
    ));
    Ok(activity)
}

fn release_workers(station: &mut StationState, activity_id: &ActivityId) {
    for worker in &mut station.crew {
        if worker.activity.as_ref() == Some(activity_id) {
            worker.activity = None;
        }
    }
}

fn activity_index(station: &StationState, activity_id: &ActivityId) -> Result<usize, SchedulingError> {
    station
        .activities
        .iter()
        .position(|a| &a.id == activity_id)
        .ok_or_else(|| SchedulingError::UnknownActivity(activity_id.clone()))
}

/// Applies a finished activity's effect and clears it. Research already
/// applied once is not applied again, but the activity is still cleared.
pub fn collect_activity(
    station: &mut StationState,
    content: &GameContent,
    activity_id: &ActivityId,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) -> Result<CollectedEffect, SchedulingError> {
    let idx = activity_index(station, activity_id)?;
    let pending = &station.activities[idx];
    if now < pending.ends_at {
        return Err(SchedulingError::NotFinished {
            activity: activity_id.clone(),
            remaining_secs: remaining_time(pending, now),
        });
    }
    let Some(def) = content.activity_def(&pending.def_id) else {
        return Err(SchedulingError::UnknownActivityDef(pending.def_id.clone()));
    };

    let activity = station.activities.remove(idx);
    release_workers(station, &activity.id);

    let applied = match activity.kind {
        ActivityKind::Research => station.research.completed.insert(def.id.clone()),
        ActivityKind::Recipe | ActivityKind::Other => true,
    };
    let mut messages = Vec::new();
    if applied {
        apply_effect(station, &def.effect, now, &mut messages, events);
    } else {
        messages.push(format!("{} was already researched", def.name));
    }

    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ActivityCollected {
            activity_id: activity.id.clone(),
            def_id: def.id.clone(),
            applied,
        },
    ));
    Ok(CollectedEffect {
        activity_id: activity.id,
        def_id: def.id.clone(),
        effect: def.effect.clone(),
        applied,
        messages,
    })
}

fn announce(
    station: &mut StationState,
    change: ModuleChange,
    target: String,
    events: &mut Vec<EventEnvelope>,
) {
    let clock = station.meta.clock_secs;
    events.push(crate::emit(
        &mut station.counters,
        clock,
        Event::ModuleChanged {
            change,
            target: target.clone(),
        },
    ));
    events.push(crate::emit(
        &mut station.counters,
        clock,
        Event::SceneUpdate { reason: target },
    ));
}

fn apply_effect(
    station: &mut StationState,
    effect: &ActivityEffect,
    now: u64,
    messages: &mut Vec<String>,
    events: &mut Vec<EventEnvelope>,
) {
    match effect {
        ActivityEffect::UnlockPeripheral { kind } => {
            station.research.unlocked_peripherals.insert(*kind);
            messages.push(format!("unlocked {kind:?}"));
        }
        ActivityEffect::AddPeripheral { kind } => {
            let id = PeripheralId(crate::next_entity_id(&mut station.counters, "peripheral"));
            station.peripherals.push(PeripheralState {
                id: id.clone(),
                kind: *kind,
                level: 1,
                power_on: true,
                broken: false,
                last_fixed_at: now,
            });
            announce(station, ModuleChange::PeripheralAdded, id.0, events);
        }
        ActivityEffect::AddTank { fluid, capacity } => {
            let id = TankId(crate::next_entity_id(&mut station.counters, "tank"));
            station.ledger.tanks.push(Tank {
                id: id.clone(),
                fluid: *fluid,
                level: Level::empty(*capacity),
            });
            announce(station, ModuleChange::ContainerAdded, id.0, events);
        }
        ActivityEffect::AddStorageBox {
            ingredient,
            capacity,
        } => {
            let id = BoxId(crate::next_entity_id(&mut station.counters, "box"));
            station.ledger.boxes.push(StorageBox {
                id: id.clone(),
                ingredient: *ingredient,
                level: Level::empty(*capacity),
            });
            announce(station, ModuleChange::ContainerAdded, id.0, events);
        }
        ActivityEffect::AddBattery { capacity } => {
            let id = BatteryId(crate::next_entity_id(&mut station.counters, "battery"));
            station.ledger.batteries.push(Battery {
                id: id.clone(),
                level: Level::empty(*capacity),
            });
            announce(station, ModuleChange::ContainerAdded, id.0, events);
        }
        ActivityEffect::AddSolarPanel { output_per_hour } => {
            let id = PanelId(crate::next_entity_id(&mut station.counters, "panel"));
            station.ledger.solar_panels.push(SolarPanel {
                id: id.clone(),
                output_per_hour: *output_per_hour,
            });
            announce(station, ModuleChange::ContainerAdded, id.0, events);
        }
        ActivityEffect::AddInventory { ingredient, amount } => {
            add_inventory(station, *ingredient, *amount, messages, events);
        }
        ActivityEffect::IncrementCapability { capability } => {
            let level = station
                .research
                .capabilities
                .entry(capability.clone())
                .or_insert(0);
            *level += 1;
            messages.push(format!("{capability} is now level {level}"));
        }
        ActivityEffect::AddProductionModule { kind } => {
            let id = ModuleId(crate::next_entity_id(&mut station.counters, "module"));
            station.modules.push(ProductionModule {
                id: id.clone(),
                kind: *kind,
            });
            announce(station, ModuleChange::ModuleAdded, id.0, events);
        }
        ActivityEffect::Nothing => {}
    }
}

fn add_inventory(
    station: &mut StationState,
    ingredient: Ingredient,
    amount: f32,
    messages: &mut Vec<String>,
    events: &mut Vec<EventEnvelope>,
) {
    let discarded = match station.ledger.deposit_ingredient(ingredient, amount) {
        Some(discarded) => discarded,
        None => {
            messages.push(format!("no box for {ingredient}"));
            amount
        }
    };
    messages.push(format!("stored {:.1} {ingredient}", amount - discarded));
    if discarded > 0.0 {
        messages.push(format!("discarded {discarded:.1} {ingredient}"));
        events.push(crate::emit(
            &mut station.counters,
            station.meta.clock_secs,
            Event::ResourceDiscarded {
                resource: Resource::Ingredient(ingredient),
                amount: discarded,
            },
        ));
    }
}

/// Spends one token to pull the end time forward by `boost_secs`. Returns
/// whether the activity can now be collected. An unknown activity releases
/// the token back to the wallet.
pub fn boost_activity(
    station: &mut StationState,
    activity_id: &ActivityId,
    token: Token,
    wallet: &mut dyn TokenWallet,
    constants: &Constants,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) -> Result<bool, SchedulingError> {
    let idx = match activity_index(station, activity_id) {
        Ok(idx) => idx,
        Err(err) => {
            wallet.release_token(token);
            return Err(err);
        }
    };
    if !wallet.spend_token(token) {
        return Err(SchedulingError::TokenUnavailable);
    }
    let activity = &mut station.activities[idx];
    activity.ends_at = activity
        .ends_at
        .saturating_sub(constants.boost_secs)
        .max(activity.started_at + 1);
    let ends_at = activity.ends_at;

    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ActivityBoosted {
            activity_id: activity_id.clone(),
            ends_at,
        },
    ));
    Ok(now >= ends_at)
}

/// Drops a running activity without granting its effect or refunding its
/// ingredients.
pub fn abandon_activity(
    station: &mut StationState,
    activity_id: &ActivityId,
    events: &mut Vec<EventEnvelope>,
) -> Result<Activity, SchedulingError> {
    let idx = activity_index(station, activity_id)?;
    let activity = station.activities.remove(idx);
    release_workers(station, &activity.id);
    events.push(crate::emit(
        &mut station.counters,
        station.meta.clock_secs,
        Event::ActivityAbandoned {
            activity_id: activity.id.clone(),
        },
    ));
    Ok(activity)
}
