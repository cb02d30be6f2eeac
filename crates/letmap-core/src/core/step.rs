use super::stopping_power::{MaterialId, ParticleId};
use serde::{Deserialize, Serialize};

/// One transport step, as handed over by the transport kernel.
///
/// `voxel_index` comes from the caller's indexing layer. Negative values mean
/// the step ended outside the scored volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub deposited_energy: f64,
    pub track_weight: f64,
    pub step_length: f64,
    pub pre_kinetic_energy: f64,
    pub post_kinetic_energy: f64,
    pub species: ParticleId,
    pub material: MaterialId,
    pub voxel_index: i64,
}

impl StepEvent {
    /// Deposited energy multiplied by the track weight.
    #[inline]
    pub fn weighted_deposit(&self) -> f64 {
        self.deposited_energy * self.track_weight
    }

    /// Mean of the pre- and post-step kinetic energies.
    #[inline]
    pub fn mean_kinetic_energy(&self) -> f64 {
        0.5 * (self.pre_kinetic_energy + self.post_kinetic_energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> StepEvent {
        StepEvent {
            deposited_energy: 2.0,
            track_weight: 0.5,
            step_length: 0.1,
            pre_kinetic_energy: 100.0,
            post_kinetic_energy: 98.0,
            species: ParticleId::new("proton"),
            material: MaterialId::new("G4_WATER"),
            voxel_index: 3,
        }
    }

    #[test]
    fn weighted_deposit_multiplies_by_track_weight() {
        assert_eq!(step().weighted_deposit(), 1.0);
    }

    #[test]
    fn mean_kinetic_energy_averages_pre_and_post() {
        assert_eq!(step().mean_kinetic_energy(), 99.0);
    }
}
