use super::accumulator::AccumulatorGrid;
use super::config::ScoringConfig;
use super::error::EngineError;
use super::policy::{Contribution, StepQuantities};
use super::reducer::{ReducedOutput, reduce};
use super::state::{RunState, ScoringStats, SkipReason, StepOutcome};
use crate::core::geometry::GridGeometry;
use crate::core::step::StepEvent;
use crate::core::stopping_power::StoppingPowerSource;
use tracing::{debug, info, trace, warn};

/// Turns step events into per-voxel running sums and reduces them at the end
/// of a run.
///
/// A scorer owns its grid exclusively. Workers scoring in parallel each own a
/// scorer over the same geometry and combine them with
/// [`absorb`](Self::absorb) before a single [`finalize`](Self::finalize).
///
/// The running sums survive [`finalize`](Self::finalize) and
/// [`begin_run`](Self::begin_run); only [`reset`](Self::reset) zeroes them.
pub struct LetScorer<'s, S: StoppingPowerSource + ?Sized> {
    config: ScoringConfig,
    source: &'s S,
    grid: AccumulatorGrid,
    state: RunState,
    stats: ScoringStats,
    warned_zero_dedx: bool,
    warned_unconverted: bool,
}

impl<'s, S: StoppingPowerSource + ?Sized> LetScorer<'s, S> {
    pub fn new(config: ScoringConfig, source: &'s S, geometry: GridGeometry) -> Self {
        debug!(
            policy = %config.policy,
            water_equivalent = config.water_equivalent,
            second_moment = config.second_moment,
            output_mode = ?config.output_mode,
            %geometry,
            "Allocating LET scorer."
        );
        let grid = AccumulatorGrid::allocate(geometry, config.second_moment);
        Self {
            config,
            source,
            grid,
            state: RunState::Allocated,
            stats: ScoringStats::default(),
            warned_zero_dedx: false,
            warned_unconverted: false,
        }
    }

    /// Creates an empty scorer sharing this scorer's configuration, source
    /// and geometry.
    pub fn fresh_worker(&self) -> Self {
        Self::new(self.config.clone(), self.source, *self.grid.geometry())
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.grid.geometry()
    }

    pub fn grid(&self) -> &AccumulatorGrid {
        &self.grid
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &ScoringStats {
        &self.stats
    }

    /// Marks the start of a new run. The running sums are kept.
    pub fn begin_run(&mut self) {
        self.stats.runs += 1;
        info!(run = self.stats.runs, "Beginning run; running sums are kept.");
    }

    /// Zero-fills every running sum and clears the statistics.
    pub fn reset(&mut self) {
        self.grid.fill(0.0);
        self.stats = ScoringStats::default();
        self.state = RunState::Allocated;
        self.warned_zero_dedx = false;
        self.warned_unconverted = false;
        debug!("Scorer reset to zeroed sums.");
    }

    /// Re-allocates the grid. Only the geometry the scorer was built with is
    /// accepted; the sums are zeroed as by [`reset`](Self::reset).
    pub fn reallocate(&mut self, geometry: &GridGeometry) -> Result<(), EngineError> {
        self.grid.reallocate(geometry)?;
        self.reset();
        Ok(())
    }

    pub fn score_step(&mut self, step: &StepEvent) -> StepOutcome {
        self.state = RunState::Accumulating;
        let outcome = self.accumulate(step);
        self.stats.record(outcome);
        outcome
    }

    /// Scores every step in order and returns how many were scored.
    pub fn score_steps<'e, I>(&mut self, steps: I) -> u64
    where
        I: IntoIterator<Item = &'e StepEvent>,
    {
        let before = self.stats.scored;
        for step in steps {
            self.score_step(step);
        }
        self.stats.scored - before
    }

    fn accumulate(&mut self, step: &StepEvent) -> StepOutcome {
        let edep = step.weighted_deposit();
        if edep == 0.0 {
            trace!("Step deposits no energy; skipped.");
            return StepOutcome::Skipped(SkipReason::NoDeposit);
        }
        if step.voxel_index < 0 {
            trace!(index = step.voxel_index, "Step outside the grid; skipped.");
            return StepOutcome::Skipped(SkipReason::OutsideGrid);
        }

        let policy = self.config.policy;
        if step.step_length == 0.0 && policy.divides_by_step_length(self.config.second_moment) {
            trace!(%policy, "Zero step length under a per-length policy; skipped.");
            return StepOutcome::Skipped(SkipReason::ZeroStepLength);
        }

        let kinetic_energy = step.mean_kinetic_energy();
        let quantities = StepQuantities {
            edep,
            step_length: step.step_length,
            kinetic_energy,
            weight: step.track_weight,
            dedx: self
                .source
                .electronic_dedx(kinetic_energy, &step.species, &step.material),
        };

        if policy.uses_stopping_power() && !is_positive(quantities.dedx) {
            self.stats.zero_dedx += 1;
            if !self.warned_zero_dedx {
                warn!(
                    species = %step.species,
                    material = %step.material,
                    kinetic_energy,
                    dedx = quantities.dedx,
                    %policy,
                    "Stopping power is not positive; the step adds its weight with a zero numerator."
                );
                self.warned_zero_dedx = true;
            }
        }

        let mut contribution = policy.contribution(&quantities);
        if self.config.water_equivalent {
            self.rescale_to_water(&mut contribution, &quantities, step);
        }

        self.grid.add(step.voxel_index, &contribution);
        StepOutcome::Scored
    }

    // Only the numerator is rescaled; the second moment stays in the step
    // material. A step with either stopping power not positive keeps its
    // material value.
    fn rescale_to_water(
        &mut self,
        contribution: &mut Contribution,
        quantities: &StepQuantities,
        step: &StepEvent,
    ) {
        let dedx = quantities.dedx;
        let dedx_reference = if is_positive(dedx) {
            self.source.total_dedx(
                quantities.kinetic_energy,
                &step.species,
                &self.config.reference_material,
            )
        } else {
            0.0
        };
        if !is_positive(dedx_reference) {
            self.stats.unconverted += 1;
            if !self.warned_unconverted {
                warn!(
                    species = %step.species,
                    material = %step.material,
                    reference = %self.config.reference_material,
                    kinetic_energy = quantities.kinetic_energy,
                    dedx,
                    dedx_reference,
                    "Stopping power is not positive; water-equivalent rescaling skipped for such steps."
                );
                self.warned_unconverted = true;
            }
            return;
        }
        contribution.numerator = contribution.numerator / dedx * dedx_reference;
    }

    /// Adds another scorer's sums and statistics into this one.
    pub fn absorb(&mut self, other: &LetScorer<'_, S>) -> Result<(), EngineError> {
        self.grid.absorb(&other.grid)?;
        self.stats += other.stats;
        self.warned_zero_dedx |= other.warned_zero_dedx;
        self.warned_unconverted |= other.warned_unconverted;
        if other.state != RunState::Allocated {
            self.state = RunState::Accumulating;
        }
        Ok(())
    }

    /// Reduces the running sums according to the configured output mode.
    /// The sums are left intact so later steps keep accumulating.
    pub fn finalize(&mut self) -> ReducedOutput {
        let output = reduce(&self.grid, self.config.output_mode);
        self.state = RunState::Finalized;
        info!(
            scored = self.stats.scored,
            skipped = self.stats.skipped(),
            zero_dedx = self.stats.zero_dedx,
            unconverted = self.stats.unconverted,
            mode = ?self.config.output_mode,
            "Scorer finalized."
        );
        output
    }

    pub fn into_grid(self) -> AccumulatorGrid {
        self.grid
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
