use std::ops::AddAssign;

/// Lifecycle of a scorer's running sums.
///
/// There is no implicit transition back to [`RunState::Allocated`]: only an
/// explicit reset zeroes the grid, so several runs can accumulate into the
/// same sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Grid allocated and zero-filled, nothing scored yet.
    Allocated,
    /// At least one step has been offered since allocation or reset.
    Accumulating,
    /// Reduced at least once; further steps resume accumulation.
    Finalized,
}

/// Why a step left the running sums untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDeposit,
    OutsideGrid,
    ZeroStepLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Scored,
    Skipped(SkipReason),
}

/// Step counters for one scorer, summed when worker grids are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoringStats {
    pub scored: u64,
    pub skipped_no_deposit: u64,
    pub skipped_outside_grid: u64,
    pub skipped_zero_step_length: u64,
    /// Scored steps whose material stopping power was not positive under a
    /// policy that weights by it. Their numerator contribution is zero, which
    /// pulls the voxel LET down; usually a curve is missing from the table.
    pub zero_dedx: u64,
    /// Steps whose water-equivalent rescaling was skipped because the
    /// material or reference stopping power was not positive.
    pub unconverted: u64,
    /// Runs begun on this scorer. Absorbing workers keeps the larger count
    /// instead of summing, since workers share the caller's run.
    pub runs: u64,
}

impl ScoringStats {
    pub fn offered(&self) -> u64 {
        self.scored + self.skipped()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_no_deposit + self.skipped_outside_grid + self.skipped_zero_step_length
    }

    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Scored => self.scored += 1,
            StepOutcome::Skipped(SkipReason::NoDeposit) => self.skipped_no_deposit += 1,
            StepOutcome::Skipped(SkipReason::OutsideGrid) => self.skipped_outside_grid += 1,
            StepOutcome::Skipped(SkipReason::ZeroStepLength) => {
                self.skipped_zero_step_length += 1
            }
        }
    }
}

impl AddAssign for ScoringStats {
    fn add_assign(&mut self, rhs: Self) {
        self.scored += rhs.scored;
        self.skipped_no_deposit += rhs.skipped_no_deposit;
        self.skipped_outside_grid += rhs.skipped_outside_grid;
        self.skipped_zero_step_length += rhs.skipped_zero_step_length;
        self.zero_dedx += rhs.zero_dedx;
        self.unconverted += rhs.unconverted;
        self.runs = self.runs.max(rhs.runs);
    }
}
