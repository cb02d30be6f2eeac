use super::config::AveragingPolicy;

/// Physical quantities of one depositing step, already weighted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepQuantities {
    /// Deposited energy times track weight.
    pub edep: f64,
    pub step_length: f64,
    /// Mean of pre- and post-step kinetic energy.
    pub kinetic_energy: f64,
    pub weight: f64,
    /// Electronic stopping power at `kinetic_energy` in the step material.
    pub dedx: f64,
}

/// What one step adds to each running sum of its voxel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contribution {
    pub numerator: f64,
    pub denominator: f64,
    pub second_moment: f64,
}

impl AveragingPolicy {
    pub fn contribution(self, q: &StepQuantities) -> Contribution {
        match self {
            AveragingPolicy::DoseAverage => Contribution {
                numerator: q.edep * q.dedx,
                denominator: q.edep,
                second_moment: q.edep * q.dedx * q.dedx,
            },
            AveragingPolicy::TrackAverage => Contribution {
                numerator: q.dedx * q.step_length,
                denominator: q.step_length,
                second_moment: q.step_length * q.dedx * q.dedx,
            },
            AveragingPolicy::TrackAverageEdep => Contribution {
                numerator: q.edep,
                denominator: q.step_length,
                second_moment: q.edep * q.edep / q.step_length,
            },
            AveragingPolicy::DoseAverageEdep => Contribution {
                numerator: q.edep * q.edep / q.step_length,
                denominator: q.edep,
                second_moment: q.edep * q.edep / q.step_length,
            },
            AveragingPolicy::AverageKineticEnergy => Contribution {
                numerator: q.kinetic_energy * q.weight,
                denominator: q.weight,
                second_moment: q.kinetic_energy * q.kinetic_energy * q.weight * q.weight,
            },
        }
    }

    /// Whether the numerator is built from the material stopping power.
    pub fn uses_stopping_power(self) -> bool {
        matches!(
            self,
            AveragingPolicy::DoseAverage | AveragingPolicy::TrackAverage
        )
    }

    /// Whether this policy divides by the step length, either in the
    /// numerator or, when tracked, in the second moment.
    pub fn divides_by_step_length(self, second_moment: bool) -> bool {
        match self {
            AveragingPolicy::DoseAverageEdep => true,
            AveragingPolicy::TrackAverageEdep => second_moment,
            AveragingPolicy::DoseAverage
            | AveragingPolicy::TrackAverage
            | AveragingPolicy::AverageKineticEnergy => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantities() -> StepQuantities {
        StepQuantities {
            edep: 2.0,
            step_length: 0.5,
            kinetic_energy: 100.0,
            weight: 1.0,
            dedx: 5.0,
        }
    }

    #[test]
    fn dose_average_weights_dedx_by_deposit() {
        let c = AveragingPolicy::DoseAverage.contribution(&quantities());
        assert_eq!(c.numerator, 10.0);
        assert_eq!(c.denominator, 2.0);
        assert_eq!(c.second_moment, 50.0);
    }

    #[test]
    fn track_average_weights_dedx_by_step_length() {
        let q = StepQuantities {
            dedx: 4.0,
            ..quantities()
        };
        let c = AveragingPolicy::TrackAverage.contribution(&q);
        assert_eq!(c.numerator, 2.0);
        assert_eq!(c.denominator, 0.5);
        assert_eq!(c.second_moment, 8.0);
    }

    #[test]
    fn track_average_edep_uses_deposit_over_length() {
        let c = AveragingPolicy::TrackAverageEdep.contribution(&quantities());
        assert_eq!(c.numerator, 2.0);
        assert_eq!(c.denominator, 0.5);
        assert_eq!(c.second_moment, 8.0);
    }

    #[test]
    fn dose_average_edep_squares_deposit() {
        let c = AveragingPolicy::DoseAverageEdep.contribution(&quantities());
        assert_eq!(c.numerator, 8.0);
        assert_eq!(c.denominator, 2.0);
        assert_eq!(c.second_moment, 8.0);
    }

    #[test]
    fn average_kinetic_energy_weights_by_track_weight() {
        let q = StepQuantities {
            weight: 0.5,
            ..quantities()
        };
        let c = AveragingPolicy::AverageKineticEnergy.contribution(&q);
        assert_eq!(c.numerator, 50.0);
        assert_eq!(c.denominator, 0.5);
        assert_eq!(c.second_moment, 2500.0);
    }

    #[test]
    fn only_edep_policies_divide_by_step_length() {
        assert!(AveragingPolicy::DoseAverageEdep.divides_by_step_length(false));
        assert!(!AveragingPolicy::TrackAverageEdep.divides_by_step_length(false));
        assert!(AveragingPolicy::TrackAverageEdep.divides_by_step_length(true));
        assert!(!AveragingPolicy::DoseAverage.divides_by_step_length(true));
        assert!(!AveragingPolicy::TrackAverage.divides_by_step_length(true));
        assert!(!AveragingPolicy::AverageKineticEnergy.divides_by_step_length(true));
    }

    #[test]
    fn only_dedx_policies_need_a_stopping_power() {
        assert!(AveragingPolicy::DoseAverage.uses_stopping_power());
        assert!(AveragingPolicy::TrackAverage.uses_stopping_power());
        assert!(!AveragingPolicy::TrackAverageEdep.uses_stopping_power());
        assert!(!AveragingPolicy::DoseAverageEdep.uses_stopping_power());
        assert!(!AveragingPolicy::AverageKineticEnergy.uses_stopping_power());
    }
}
