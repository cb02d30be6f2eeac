use crate::core::geometry::GridGeometry;
use crate::core::step::StepEvent;
use crate::core::stopping_power::StoppingPowerSource;
use crate::engine::config::ScoringConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reducer::ReducedOutput;
use crate::engine::scorer::LetScorer;
use crate::engine::state::ScoringStats;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Steps scored by one worker between progress updates.
const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub output: ReducedOutput,
    pub stats: ScoringStats,
}

/// Scores `steps` as one run and reduces the sums once.
#[instrument(skip_all, name = "score_workflow")]
pub fn run<S>(
    steps: &[StepEvent],
    geometry: GridGeometry,
    config: &ScoringConfig,
    source: &S,
    reporter: &ProgressReporter,
) -> Result<ScoreResult, EngineError>
where
    S: StoppingPowerSource + ?Sized,
{
    info!(
        steps = steps.len(),
        policy = %config.policy,
        "Starting LET scoring workflow."
    );

    let mut scorer = accumulate(steps, geometry, config, source, reporter)?;

    let output = reporter.phase("Reduction", || scorer.finalize());
    let stats = *scorer.stats();

    info!(
        scored = stats.scored,
        skipped = stats.skipped(),
        "Scoring workflow complete."
    );
    Ok(ScoreResult { output, stats })
}

/// Builds a scorer over `geometry`, begins a run and scores `steps` into it.
/// The returned scorer is not finalized, so further runs can be added with
/// [`score_into`].
pub fn accumulate<'s, S>(
    steps: &[StepEvent],
    geometry: GridGeometry,
    config: &ScoringConfig,
    source: &'s S,
    reporter: &ProgressReporter,
) -> Result<LetScorer<'s, S>, EngineError>
where
    S: StoppingPowerSource + ?Sized,
{
    let mut scorer = LetScorer::new(config.clone(), source, geometry);
    scorer.begin_run();
    score_into(&mut scorer, steps, reporter)?;
    Ok(scorer)
}

/// Scores `steps` into an existing scorer without resetting it.
///
/// With the `parallel` feature the batch is split into chunks, each folded
/// into a private worker grid; the worker grids are summed and added to
/// `scorer` once.
#[instrument(skip_all, name = "accumulation")]
pub fn score_into<S>(
    scorer: &mut LetScorer<'_, S>,
    steps: &[StepEvent],
    reporter: &ProgressReporter,
) -> Result<(), EngineError>
where
    S: StoppingPowerSource + ?Sized,
{
    reporter.report(Progress::PhaseStart { name: "Scoring" });

    if steps.is_empty() {
        warn!("No steps to score.");
        reporter.report(Progress::PhaseFinish);
        return Ok(());
    }

    reporter.report(Progress::TaskStart {
        total: steps.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    for chunk in steps.chunks(CHUNK_SIZE) {
        scorer.score_steps(chunk);
        reporter.report(Progress::TaskIncrement {
            amount: chunk.len() as u64,
        });
    }

    #[cfg(feature = "parallel")]
    {
        let template = &*scorer;
        let merged = steps
            .par_chunks(CHUNK_SIZE)
            .fold(
                || template.fresh_worker(),
                |mut worker, chunk| {
                    worker.score_steps(chunk);
                    reporter.report(Progress::TaskIncrement {
                        amount: chunk.len() as u64,
                    });
                    worker
                },
            )
            .map(Ok::<_, EngineError>)
            .try_reduce_with(|mut left, right| {
                left.absorb(&right)?;
                Ok(left)
            });
        if let Some(workers) = merged {
            scorer.absorb(&workers?)?;
        }
    }

    reporter.report(Progress::TaskFinish);

    let stats = scorer.stats();
    if stats.zero_dedx > 0 {
        warn!(
            zero_dedx = stats.zero_dedx,
            "Some steps had no positive stopping power and lowered their voxel LET."
        );
    }
    if stats.unconverted > 0 {
        warn!(
            unconverted = stats.unconverted,
            "Some steps kept their own-material LET because the stopping power was not positive."
        );
    }
    info!(
        scored = stats.scored,
        no_deposit = stats.skipped_no_deposit,
        outside_grid = stats.skipped_outside_grid,
        zero_step_length = stats.skipped_zero_step_length,
        "Accumulation finished."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(())
}
