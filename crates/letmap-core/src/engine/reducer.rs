use super::accumulator::AccumulatorGrid;
use super::config::OutputMode;
use super::output::OutputNames;
use crate::core::geometry::GridGeometry;
use crate::core::image::VoxelImage;
use crate::core::io::traits::ImageFile;
use std::path::PathBuf;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The images produced at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedOutput {
    /// Final LET, divided locally, and the variance image when the second
    /// moment was tracked.
    Merged {
        let_image: VoxelImage,
        variance: Option<VoxelImage>,
    },
    /// Raw running sums for cell-wise summation with other workers' outputs
    /// before a single division pass.
    Unmerged {
        numerator: VoxelImage,
        denominator: VoxelImage,
        second_moment: Option<VoxelImage>,
    },
}

/// Reduces a grid without modifying it.
pub fn reduce(grid: &AccumulatorGrid, mode: OutputMode) -> ReducedOutput {
    match mode {
        OutputMode::Merged => {
            let geometry = *grid.geometry();
            let let_values = finalize_let(grid.numerator(), grid.denominator());
            let variance = grid.second_moment().map(|second_moment| {
                image(
                    geometry,
                    finalize_variance(grid.numerator(), grid.denominator(), second_moment),
                )
            });
            debug!(
                voxels = let_values.len(),
                variance = variance.is_some(),
                "Reduced running sums into final LET."
            );
            ReducedOutput::Merged {
                let_image: image(geometry, let_values),
                variance,
            }
        }
        OutputMode::Unmerged => {
            let (numerator, denominator, second_moment) = grid.to_images();
            ReducedOutput::Unmerged {
                numerator,
                denominator,
                second_moment,
            }
        }
    }
}

/// `numerator / denominator` per voxel, or exactly `0.0` where the
/// denominator is zero.
pub fn finalize_let(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    #[cfg(not(feature = "parallel"))]
    let iterator = numerator.iter().zip(denominator.iter());

    #[cfg(feature = "parallel")]
    let iterator = numerator.par_iter().zip(denominator.par_iter());

    iterator.map(|(&n, &d)| ratio(n, d)).collect()
}

/// Biased weighted variance `M2/D - (N/D)^2` per voxel, with no Bessel
/// correction, or exactly `0.0` where the denominator is zero.
pub fn finalize_variance(numerator: &[f64], denominator: &[f64], second_moment: &[f64]) -> Vec<f64> {
    #[cfg(not(feature = "parallel"))]
    let iterator = numerator
        .iter()
        .zip(denominator.iter())
        .zip(second_moment.iter());

    #[cfg(feature = "parallel")]
    let iterator = numerator
        .par_iter()
        .zip(denominator.par_iter())
        .zip(second_moment.par_iter());

    iterator
        .map(|((&n, &d), &m2)| {
            if d == 0.0 {
                0.0
            } else {
                m2 / d - (n * n) / (d * d)
            }
        })
        .collect()
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn image(geometry: GridGeometry, values: Vec<f64>) -> VoxelImage {
    // lengths come from a grid allocated on `geometry`
    VoxelImage::from_data(geometry, values).unwrap_or_else(|| VoxelImage::zeros(geometry))
}

impl ReducedOutput {
    pub fn mode(&self) -> OutputMode {
        match self {
            ReducedOutput::Merged { .. } => OutputMode::Merged,
            ReducedOutput::Unmerged { .. } => OutputMode::Unmerged,
        }
    }

    pub fn let_image(&self) -> Option<&VoxelImage> {
        match self {
            ReducedOutput::Merged { let_image, .. } => Some(let_image),
            ReducedOutput::Unmerged { .. } => None,
        }
    }

    pub fn variance(&self) -> Option<&VoxelImage> {
        match self {
            ReducedOutput::Merged { variance, .. } => variance.as_ref(),
            ReducedOutput::Unmerged { .. } => None,
        }
    }

    /// Every image paired with the file name it is written to.
    pub fn images<'a>(&'a self, names: &OutputNames) -> Vec<(&'a VoxelImage, PathBuf)> {
        match self {
            ReducedOutput::Merged {
                let_image,
                variance,
            } => {
                let mut images = vec![(let_image, names.let_image.clone())];
                if let Some(variance) = variance {
                    images.push((variance, names.variance.clone()));
                }
                images
            }
            ReducedOutput::Unmerged {
                numerator,
                denominator,
                second_moment,
            } => {
                let mut images = vec![
                    (numerator, names.numerator.clone()),
                    (denominator, names.denominator.clone()),
                ];
                if let Some(second_moment) = second_moment {
                    images.push((second_moment, names.second_moment.clone()));
                }
                images
            }
        }
    }

    /// Writes every image with format `F` and returns the paths written.
    pub fn write_all<F: ImageFile>(&self, names: &OutputNames) -> Result<Vec<PathBuf>, F::Error> {
        let mut written = Vec::new();
        for (image, path) in self.images(names) {
            F::write_to_path(image, &path)?;
            info!(path = %path.display(), "Wrote output image.");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::mhd::MetaImage;
    use crate::engine::config::AveragingPolicy;
    use crate::engine::policy::Contribution;
    use nalgebra::{Point3, Vector3};
    use tempfile::tempdir;

    fn geometry() -> GridGeometry {
        GridGeometry::new(
            Vector3::new(3, 1, 1),
            Vector3::new(1.5, 0.5, 0.5),
            Point3::origin(),
        )
        .unwrap()
    }

    fn add(grid: &mut AccumulatorGrid, index: i64, n: f64, d: f64, m2: f64) {
        grid.add(
            index,
            &Contribution {
                numerator: n,
                denominator: d,
                second_moment: m2,
            },
        );
    }

    #[test]
    fn finalize_let_is_zero_where_nothing_was_deposited() {
        let values = finalize_let(&[10.0, 0.0, 3.0], &[2.0, 0.0, 0.0]);
        assert_eq!(values, vec![5.0, 0.0, 0.0]);
        assert!(values.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn finalize_variance_matches_hand_computed_value() {
        // two steps with dE/dx 5 and 15, each depositing 2
        let values = finalize_variance(&[40.0, 0.0], &[4.0, 0.0], &[500.0, 0.0]);
        assert!((values[0] - 25.0).abs() < 1e-12);
        assert_eq!(values[1], 0.0);
    }

    #[test]
    fn merged_reduction_divides_and_keeps_grid_untouched() {
        let mut grid = AccumulatorGrid::allocate(geometry(), true);
        add(&mut grid, 0, 10.0, 2.0, 50.0);
        let before = grid.clone();

        let output = reduce(&grid, OutputMode::Merged);
        assert_eq!(grid, before);
        assert_eq!(output.mode(), OutputMode::Merged);
        assert_eq!(output.let_image().unwrap().values(), &[5.0, 0.0, 0.0]);
        assert_eq!(output.variance().unwrap().values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn merged_reduction_without_second_moment_has_no_variance() {
        let grid = AccumulatorGrid::allocate(geometry(), false);
        let output = reduce(&grid, OutputMode::Merged);
        assert!(output.variance().is_none());
        assert!(output.let_image().unwrap().iter().all(|v| v == 0.0));
    }

    #[test]
    fn unmerged_reduction_emits_raw_sums() {
        let mut grid = AccumulatorGrid::allocate(geometry(), true);
        add(&mut grid, 2, 3.0, 1.5, 6.0);
        match reduce(&grid, OutputMode::Unmerged) {
            ReducedOutput::Unmerged {
                numerator,
                denominator,
                second_moment,
            } => {
                assert_eq!(numerator.values(), grid.numerator());
                assert_eq!(denominator.values(), grid.denominator());
                assert_eq!(second_moment.unwrap().values(), &[0.0, 0.0, 6.0]);
            }
            other => panic!("expected unmerged output, got {other:?}"),
        }
    }

    #[test]
    fn summing_partial_grids_then_dividing_matches_single_grid() {
        let steps = [
            (0, 10.0, 2.0, 50.0),
            (0, 30.0, 2.0, 450.0),
            (1, 4.0, 1.0, 16.0),
            (2, 7.5, 2.5, 22.5),
        ];
        let mut single = AccumulatorGrid::allocate(geometry(), true);
        let mut first = AccumulatorGrid::allocate(geometry(), true);
        let mut second = AccumulatorGrid::allocate(geometry(), true);
        for (i, &(index, n, d, m2)) in steps.iter().enumerate() {
            add(&mut single, index, n, d, m2);
            let worker = if i % 2 == 0 { &mut first } else { &mut second };
            add(worker, index, n, d, m2);
        }
        first.absorb(&second).unwrap();

        let merged = reduce(&first, OutputMode::Merged);
        let reference = reduce(&single, OutputMode::Merged);
        for (a, b) in merged
            .let_image()
            .unwrap()
            .iter()
            .zip(reference.let_image().unwrap().iter())
        {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn write_all_writes_every_produced_image() {
        let dir = tempdir().unwrap();
        let names = OutputNames::derive(
            &dir.path().join("let.mhd"),
            AveragingPolicy::DoseAverage,
            false,
        );

        let mut grid = AccumulatorGrid::allocate(geometry(), true);
        add(&mut grid, 1, 4.0, 2.0, 8.0);

        let written = reduce(&grid, OutputMode::Unmerged)
            .write_all::<MetaImage>(&names)
            .unwrap();
        assert_eq!(
            written,
            vec![
                names.numerator.clone(),
                names.denominator.clone(),
                names.second_moment.clone()
            ]
        );
        let numerator = MetaImage::read_from_path(&names.numerator).unwrap();
        assert_eq!(numerator.values(), &[0.0, 4.0, 0.0]);

        let written = reduce(&grid, OutputMode::Merged)
            .write_all::<MetaImage>(&names)
            .unwrap();
        assert_eq!(written, vec![names.let_image.clone(), names.variance.clone()]);
        let let_image = MetaImage::read_from_path(&names.let_image).unwrap();
        assert_eq!(let_image.values(), &[0.0, 2.0, 0.0]);
    }
}
