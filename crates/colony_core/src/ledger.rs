//! Bounded containers and the station resource ledger.
//!
//! Every container wraps a `Level`, which keeps `0 <= current <= capacity`.
//! Overflow is never an error: deposits report what did not fit and the caller
//! decides how to surface it.

use serde::{Deserialize, Serialize};

use crate::{BatteryId, BoxId, Fluid, Ingredient, PanelId, TankId};

/// A bounded quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub capacity: f32,
    pub current: f32,
}

impl Level {
    /// Builds a level, clamping `current` into `[0, capacity]`.
    pub fn new(capacity: f32, current: f32) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            capacity,
            current: current.clamp(0.0, capacity),
        }
    }

    pub fn empty(capacity: f32) -> Self {
        Self::new(capacity, 0.0)
    }

    pub fn headroom(&self) -> f32 {
        (self.capacity - self.current).max(0.0)
    }

    /// Adds up to the remaining headroom. Returns the amount that did not fit.
    pub fn deposit(&mut self, amount: f32) -> f32 {
        let amount = amount.max(0.0);
        let accepted = amount.min(self.headroom());
        self.current = (self.current + accepted).min(self.capacity);
        amount - accepted
    }

    /// Removes exactly `amount`, or nothing at all when not enough is stored.
    pub fn withdraw(&mut self, amount: f32) -> bool {
        if amount < 0.0 || self.current < amount {
            return false;
        }
        self.current = (self.current - amount).max(0.0);
        true
    }

    /// Removes as much of `amount` as is available. Returns the amount taken.
    pub fn drain(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.current);
        self.current = (self.current - taken).max(0.0);
        taken
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: TankId,
    pub fluid: Fluid,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBox {
    pub id: BoxId,
    pub ingredient: Ingredient,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub id: BatteryId,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarPanel {
    pub id: PanelId,
    pub output_per_hour: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub tanks: Vec<Tank>,
    pub boxes: Vec<StorageBox>,
    pub batteries: Vec<Battery>,
    pub solar_panels: Vec<SolarPanel>,
}

/// Index of the matching item with the highest (or lowest) key. Ties keep the
/// earliest item so routing is stable across calls.
fn pick_index<T>(
    items: &[T],
    matches: impl Fn(&T) -> bool,
    key: impl Fn(&T) -> f32,
    highest: bool,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, item) in items.iter().enumerate() {
        if !matches(item) {
            continue;
        }
        let value = key(item);
        let better = match best {
            None => true,
            Some((_, current)) if highest => value > current,
            Some((_, current)) => value < current,
        };
        if better {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Deposit into each level in order until `amount` is placed. Returns the
/// amount that fit nowhere.
fn absorb_sequential<'a>(levels: impl Iterator<Item = &'a mut Level>, amount: f32) -> f32 {
    let mut remaining = amount.max(0.0);
    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        remaining = level.deposit(remaining);
    }
    remaining
}

/// Drain each level in order until `amount` is taken. Returns the shortfall.
fn drain_sequential<'a>(levels: impl Iterator<Item = &'a mut Level>, amount: f32) -> f32 {
    let mut remaining = amount.max(0.0);
    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        remaining -= level.drain(remaining);
    }
    remaining.max(0.0)
}

impl ResourceLedger {
    // --- routing ---------------------------------------------------------

    /// The tank of `fluid` with the most stored: sources drain the fullest first.
    pub fn fullest_tank_mut(&mut self, fluid: Fluid) -> Option<&mut Tank> {
        let idx = pick_index(&self.tanks, |t| t.fluid == fluid, |t| t.level.current, true)?;
        self.tanks.get_mut(idx)
    }

    /// The tank of `fluid` with the least stored: destinations fill the emptiest first.
    pub fn emptiest_tank(&self, fluid: Fluid) -> Option<&Tank> {
        let idx = pick_index(&self.tanks, |t| t.fluid == fluid, |t| t.level.current, false)?;
        self.tanks.get(idx)
    }

    pub fn emptiest_tank_mut(&mut self, fluid: Fluid) -> Option<&mut Tank> {
        let idx = pick_index(&self.tanks, |t| t.fluid == fluid, |t| t.level.current, false)?;
        self.tanks.get_mut(idx)
    }

    pub fn fullest_box_mut(&mut self, ingredient: Ingredient) -> Option<&mut StorageBox> {
        let idx = pick_index(
            &self.boxes,
            |b| b.ingredient == ingredient,
            |b| b.level.current,
            true,
        )?;
        self.boxes.get_mut(idx)
    }

    pub fn emptiest_box(&self, ingredient: Ingredient) -> Option<&StorageBox> {
        let idx = pick_index(
            &self.boxes,
            |b| b.ingredient == ingredient,
            |b| b.level.current,
            false,
        )?;
        self.boxes.get(idx)
    }

    pub fn emptiest_box_mut(&mut self, ingredient: Ingredient) -> Option<&mut StorageBox> {
        let idx = pick_index(
            &self.boxes,
            |b| b.ingredient == ingredient,
            |b| b.level.current,
            false,
        )?;
        self.boxes.get_mut(idx)
    }

    // --- totals ----------------------------------------------------------

    pub fn total_fluid(&self, fluid: Fluid) -> f32 {
        self.tanks
            .iter()
            .filter(|t| t.fluid == fluid)
            .map(|t| t.level.current)
            .sum()
    }

    pub fn total_ingredient(&self, ingredient: Ingredient) -> f32 {
        self.boxes
            .iter()
            .filter(|b| b.ingredient == ingredient)
            .map(|b| b.level.current)
            .sum()
    }

    pub fn stored_energy(&self) -> f32 {
        self.batteries.iter().map(|b| b.level.current).sum()
    }

    pub fn energy_capacity(&self) -> f32 {
        self.batteries.iter().map(|b| b.level.capacity).sum()
    }

    pub fn solar_output_per_hour(&self) -> f32 {
        self.solar_panels.iter().map(|p| p.output_per_hour).sum()
    }

    // --- energy ----------------------------------------------------------

    /// Takes `amount` from the first battery that can cover it alone. A draw is
    /// never split across batteries.
    pub fn draw_energy(&mut self, amount: f32) -> Option<BatteryId> {
        let battery = self
            .batteries
            .iter_mut()
            .find(|b| b.level.current >= amount)?;
        battery.level.withdraw(amount);
        Some(battery.id.clone())
    }

    /// Charges batteries in ledger order. Returns energy that found no room.
    pub fn charge(&mut self, amount: f32) -> f32 {
        absorb_sequential(self.batteries.iter_mut().map(|b| &mut b.level), amount)
    }

    /// Discharges batteries in ledger order. Returns the uncovered shortfall.
    pub fn discharge(&mut self, amount: f32) -> f32 {
        drain_sequential(self.batteries.iter_mut().map(|b| &mut b.level), amount)
    }

    // --- bulk flows (accounting) -----------------------------------------

    pub fn absorb_fluid(&mut self, fluid: Fluid, amount: f32) -> f32 {
        absorb_sequential(
            self.tanks
                .iter_mut()
                .filter(|t| t.fluid == fluid)
                .map(|t| &mut t.level),
            amount,
        )
    }

    pub fn drain_fluid(&mut self, fluid: Fluid, amount: f32) -> f32 {
        drain_sequential(
            self.tanks
                .iter_mut()
                .filter(|t| t.fluid == fluid)
                .map(|t| &mut t.level),
            amount,
        )
    }

    pub fn absorb_ingredient(&mut self, ingredient: Ingredient, amount: f32) -> f32 {
        absorb_sequential(
            self.boxes
                .iter_mut()
                .filter(|b| b.ingredient == ingredient)
                .map(|b| &mut b.level),
            amount,
        )
    }

    pub fn drain_ingredient(&mut self, ingredient: Ingredient, amount: f32) -> f32 {
        drain_sequential(
            self.boxes
                .iter_mut()
                .filter(|b| b.ingredient == ingredient)
                .map(|b| &mut b.level),
            amount,
        )
    }

    // --- crafting --------------------------------------------------------

    /// All-or-nothing withdrawal across boxes, fullest box first.
    pub fn withdraw_ingredient(&mut self, ingredient: Ingredient, amount: f32) -> bool {
        if self.total_ingredient(ingredient) < amount {
            return false;
        }
        let mut remaining = amount;
        while remaining > 0.0 {
            let Some(storage) = self.fullest_box_mut(ingredient) else {
                break;
            };
            let taken = storage.level.drain(remaining);
            if taken <= 0.0 {
                break;
            }
            remaining -= taken;
        }
        true
    }

    /// Deposits across boxes, emptiest box first. Returns the discarded amount,
    /// or `None` when no box of that ingredient exists.
    pub fn deposit_ingredient(&mut self, ingredient: Ingredient, amount: f32) -> Option<f32> {
        if !self.boxes.iter().any(|b| b.ingredient == ingredient) {
            return None;
        }
        let mut remaining = amount.max(0.0);
        while remaining > 0.0 {
            let idx = pick_index(
                &self.boxes,
                |b| b.ingredient == ingredient && b.level.headroom() > 0.0,
                |b| b.level.current,
                false,
            );
            let Some(idx) = idx else {
                break;
            };
            remaining = self.boxes[idx].level.deposit(remaining);
        }
        Some(remaining)
    }

    /// True when every container satisfies `0 <= current <= capacity`.
    pub fn invariants_hold(&self) -> bool {
        let mut levels = self
            .tanks
            .iter()
            .map(|t| &t.level)
            .chain(self.boxes.iter().map(|b| &b.level))
            .chain(self.batteries.iter().map(|b| &b.level));
        levels.all(|l| l.current >= 0.0 && l.current <= l.capacity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
