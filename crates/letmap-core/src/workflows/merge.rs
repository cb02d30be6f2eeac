use crate::core::image::VoxelImage;
use crate::core::io::traits::ImageFile;
use crate::engine::accumulator::AccumulatorGrid;
use crate::engine::config::OutputMode;
use crate::engine::error::EngineError;
use crate::engine::output::OutputNames;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reducer::{ReducedOutput, reduce};
use tracing::{debug, info, instrument};

/// Raw running sums written by one parallel-mode worker.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialOutput {
    pub numerator: VoxelImage,
    pub denominator: VoxelImage,
    pub second_moment: Option<VoxelImage>,
}

impl PartialOutput {
    /// Reads the numerator, denominator and, if requested, second-moment
    /// images named by `names`.
    pub fn read<F: ImageFile>(names: &OutputNames, with_second_moment: bool) -> Result<Self, F::Error> {
        debug!(numerator = %names.numerator.display(), "Reading partial output.");
        let numerator = F::read_from_path(&names.numerator)?;
        let denominator = F::read_from_path(&names.denominator)?;
        let second_moment = if with_second_moment {
            Some(F::read_from_path(&names.second_moment)?)
        } else {
            None
        };
        Ok(Self {
            numerator,
            denominator,
            second_moment,
        })
    }

    /// The partial sums of an unmerged reduction, or `None` for a merged one.
    pub fn from_reduced(output: ReducedOutput) -> Option<Self> {
        match output {
            ReducedOutput::Unmerged {
                numerator,
                denominator,
                second_moment,
            } => Some(Self {
                numerator,
                denominator,
                second_moment,
            }),
            ReducedOutput::Merged { .. } => None,
        }
    }

    pub fn into_grid(self) -> Result<AccumulatorGrid, EngineError> {
        AccumulatorGrid::from_images(self.numerator, self.denominator, self.second_moment)
    }
}

/// Sums the partial outputs of several workers and divides once.
#[instrument(skip_all, name = "merge_workflow")]
pub fn run<I>(partials: I, reporter: &ProgressReporter) -> Result<ReducedOutput, EngineError>
where
    I: IntoIterator<Item = PartialOutput>,
{
    let partials: Vec<PartialOutput> = partials.into_iter().collect();
    reporter.report(Progress::PhaseStart { name: "Merging" });

    let count = partials.len();
    let mut partials = partials.into_iter();
    let first = partials
        .next()
        .ok_or_else(|| EngineError::EmptyMerge("no partial outputs were given".to_string()))?;

    reporter.report(Progress::TaskStart {
        total: count as u64,
    });
    let mut total = first.into_grid()?;
    reporter.report(Progress::TaskIncrement { amount: 1 });
    for partial in partials {
        total.absorb(&partial.into_grid()?)?;
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        partials = count,
        voxels = total.voxel_count(),
        variance = total.tracks_second_moment(),
        "Merged partial outputs; dividing once."
    );
    Ok(reporter.phase("Reduction", || reduce(&total, OutputMode::Merged)))
}
