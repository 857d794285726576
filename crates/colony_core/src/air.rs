//! Gas mixture of one habitable volume.

use serde::{Deserialize, Serialize};

use crate::Fluid;

/// Quantities of each gas in the habitat. Every component stays `>= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AirComposition {
    pub o2: f32,
    pub co2: f32,
    pub n2: f32,
    pub h2o: f32,
    pub ch4: f32,
    /// Untracked mixture released straight into the habitat.
    pub free_air: f32,
}

impl AirComposition {
    pub fn volume(&self) -> f32 {
        self.o2 + self.co2 + self.n2 + self.h2o + self.ch4 + self.free_air
    }

    /// Adds to the composite bucket used for free-air releases.
    pub fn merge_air(&mut self, amount: f32) {
        self.free_air += amount.max(0.0);
    }

    /// The air component for `fluid`. Hydrogen is never held in the habitat.
    pub fn component(&self, fluid: Fluid) -> Option<f32> {
        match fluid {
            Fluid::Oxygen => Some(self.o2),
            Fluid::CarbonDioxide => Some(self.co2),
            Fluid::Nitrogen => Some(self.n2),
            Fluid::Water => Some(self.h2o),
            Fluid::Methane => Some(self.ch4),
            Fluid::Hydrogen => None,
        }
    }

    fn component_mut(&mut self, fluid: Fluid) -> Option<&mut f32> {
        match fluid {
            Fluid::Oxygen => Some(&mut self.o2),
            Fluid::CarbonDioxide => Some(&mut self.co2),
            Fluid::Nitrogen => Some(&mut self.n2),
            Fluid::Water => Some(&mut self.h2o),
            Fluid::Methane => Some(&mut self.ch4),
            Fluid::Hydrogen => None,
        }
    }

    /// Adds gas to the habitat. Returns false for gases the air does not hold.
    pub fn add(&mut self, fluid: Fluid, amount: f32) -> bool {
        match self.component_mut(fluid) {
            Some(value) => {
                *value += amount.max(0.0);
                true
            }
            None => false,
        }
    }

    /// Removes exactly `amount`, or nothing when the habitat holds less.
    pub fn withdraw(&mut self, fluid: Fluid, amount: f32) -> bool {
        match self.component_mut(fluid) {
            Some(value) if *value >= amount && amount >= 0.0 => {
                *value = (*value - amount).max(0.0);
                true
            }
            _ => false,
        }
    }

    /// Removes up to `amount`. Returns the shortfall.
    pub fn drain(&mut self, fluid: Fluid, amount: f32) -> f32 {
        let Some(value) = self.component_mut(fluid) else {
            return amount.max(0.0);
        };
        let taken = amount.max(0.0).min(*value);
        *value = (*value - taken).max(0.0);
        amount.max(0.0) - taken
    }

    pub fn invariants_hold(&self) -> bool {
        [self.o2, self.co2, self.n2, self.h2o, self.ch4, self.free_air]
            .iter()
            .all(|v| *v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_sums_all_components() {
        let mut air = AirComposition {
            o2: 20.0,
            co2: 1.0,
            n2: 78.0,
            ..AirComposition::default()
        };
        air.merge_air(5.0);
        assert!((air.volume() - 104.0).abs() < 1e-5);
        assert!((air.free_air - 5.0).abs() < 1e-5);
    }

    #[test]
    fn withdraw_is_all_or_nothing() {
        let mut air = AirComposition {
            co2: 3.0,
            ..AirComposition::default()
        };
        assert!(!air.withdraw(Fluid::CarbonDioxide, 4.0));
        assert!((air.co2 - 3.0).abs() < 1e-6);
        assert!(air.withdraw(Fluid::CarbonDioxide, 3.0));
        assert!(air.co2.abs() < 1e-6);
    }

    #[test]
    fn hydrogen_is_not_an_air_component() {
        let mut air = AirComposition::default();
        assert!(!air.add(Fluid::Hydrogen, 1.0));
        assert!(air.component(Fluid::Hydrogen).is_none());
        assert!((air.drain(Fluid::Hydrogen, 2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn drain_clamps_at_zero_and_reports_shortfall() {
        let mut air = AirComposition {
            o2: 1.5,
            ..AirComposition::default()
        };
        let missing = air.drain(Fluid::Oxygen, 4.0);
        assert!((missing - 2.5).abs() < 1e-6);
        assert!(air.o2.abs() < 1e-6);
        assert!(air.invariants_hold());
    }
}
