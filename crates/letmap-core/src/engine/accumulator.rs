use super::error::EngineError;
use super::policy::Contribution;
use crate::core::geometry::GridGeometry;
use crate::core::image::VoxelImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Numerator,
    Denominator,
    SecondMoment,
}

/// Per-voxel running sums sharing one geometry.
///
/// The numerator and denominator arrays always exist; the second-moment array
/// exists only when variance tracking was requested at allocation. All
/// arrays have `geometry.voxel_count()` cells.
///
/// There is no internal synchronisation. Workers that accumulate in parallel
/// each own a grid and combine them with [`absorb`](Self::absorb).
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorGrid {
    geometry: GridGeometry,
    numerator: Vec<f64>,
    denominator: Vec<f64>,
    second_moment: Option<Vec<f64>>,
}

impl AccumulatorGrid {
    pub fn allocate(geometry: GridGeometry, track_second_moment: bool) -> Self {
        let n = geometry.voxel_count();
        Self {
            geometry,
            numerator: vec![0.0; n],
            denominator: vec![0.0; n],
            second_moment: track_second_moment.then(|| vec![0.0; n]),
        }
    }

    /// Re-allocates in place. The same geometry zero-fills the sums; any
    /// other geometry is a [`EngineError::ShapeMismatch`].
    pub fn reallocate(&mut self, geometry: &GridGeometry) -> Result<(), EngineError> {
        if !self.geometry.is_congruent(geometry) {
            return Err(EngineError::shape_mismatch(&self.geometry, geometry));
        }
        self.fill(0.0);
        Ok(())
    }

    /// Rebuilds a grid from images read back from disk.
    pub fn from_images(
        numerator: VoxelImage,
        denominator: VoxelImage,
        second_moment: Option<VoxelImage>,
    ) -> Result<Self, EngineError> {
        let geometry = *numerator.geometry();
        if !geometry.is_congruent(denominator.geometry()) {
            return Err(EngineError::shape_mismatch(&geometry, denominator.geometry()));
        }
        if let Some(image) = &second_moment {
            if !geometry.is_congruent(image.geometry()) {
                return Err(EngineError::shape_mismatch(&geometry, image.geometry()));
            }
        }
        Ok(Self {
            geometry,
            numerator: numerator.into_values(),
            denominator: denominator.into_values(),
            second_moment: second_moment.map(VoxelImage::into_values),
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn voxel_count(&self) -> usize {
        self.numerator.len()
    }

    pub fn tracks_second_moment(&self) -> bool {
        self.second_moment.is_some()
    }

    /// Adds `amount` to one cell of `channel`.
    ///
    /// A negative index is a no-op. A non-negative index must be below
    /// `voxel_count()`; the indexing layer guarantees this.
    #[inline]
    pub fn add_value(&mut self, channel: Channel, index: i64, amount: f64) {
        if index < 0 {
            return;
        }
        let index = index as usize;
        debug_assert!(index < self.voxel_count(), "voxel index out of range");
        match channel {
            Channel::Numerator => self.numerator[index] += amount,
            Channel::Denominator => self.denominator[index] += amount,
            Channel::SecondMoment => {
                if let Some(cells) = self.second_moment.as_mut() {
                    cells[index] += amount;
                }
            }
        }
    }

    /// Adds one step's contribution to every tracked channel.
    #[inline]
    pub fn add(&mut self, index: i64, contribution: &Contribution) {
        if index < 0 {
            return;
        }
        if self.second_moment.is_some() {
            self.add_value(Channel::SecondMoment, index, contribution.second_moment);
        }
        self.add_value(Channel::Numerator, index, contribution.numerator);
        self.add_value(Channel::Denominator, index, contribution.denominator);
    }

    pub fn fill(&mut self, value: f64) {
        self.numerator.fill(value);
        self.denominator.fill(value);
        if let Some(cells) = self.second_moment.as_mut() {
            cells.fill(value);
        }
    }

    pub fn values(&self, channel: Channel) -> Option<&[f64]> {
        match channel {
            Channel::Numerator => Some(&self.numerator),
            Channel::Denominator => Some(&self.denominator),
            Channel::SecondMoment => self.second_moment.as_deref(),
        }
    }

    pub fn numerator(&self) -> &[f64] {
        &self.numerator
    }

    pub fn denominator(&self) -> &[f64] {
        &self.denominator
    }

    pub fn second_moment(&self) -> Option<&[f64]> {
        self.second_moment.as_deref()
    }

    /// Cell values of `channel` in voxel order. Calling again restarts the
    /// sequence; an untracked channel yields nothing.
    pub fn iter(&self, channel: Channel) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.values(channel).unwrap_or(&[]).iter().copied()
    }

    /// Adds another grid's sums cell by cell.
    pub fn absorb(&mut self, other: &AccumulatorGrid) -> Result<(), EngineError> {
        if !self.geometry.is_congruent(&other.geometry) {
            return Err(EngineError::shape_mismatch(&self.geometry, &other.geometry));
        }
        if self.tracks_second_moment() != other.tracks_second_moment() {
            return Err(EngineError::ShapeMismatch {
                expected: channel_set(self.tracks_second_moment()).to_string(),
                found: channel_set(other.tracks_second_moment()).to_string(),
            });
        }

        add_cells(&mut self.numerator, &other.numerator);
        add_cells(&mut self.denominator, &other.denominator);
        if let (Some(mine), Some(theirs)) = (self.second_moment.as_mut(), &other.second_moment) {
            add_cells(mine, theirs);
        }
        Ok(())
    }

    /// Copies every tracked channel into standalone images.
    pub fn to_images(&self) -> (VoxelImage, VoxelImage, Option<VoxelImage>) {
        let image = |cells: &[f64]| VoxelImage::from_data(self.geometry, cells.to_vec());
        (
            image(&self.numerator).unwrap_or_else(|| VoxelImage::zeros(self.geometry)),
            image(&self.denominator).unwrap_or_else(|| VoxelImage::zeros(self.geometry)),
            self.second_moment
                .as_deref()
                .and_then(|cells| image(cells)),
        )
    }
}

fn add_cells(into: &mut [f64], from: &[f64]) {
    for (a, b) in into.iter_mut().zip(from) {
        *a += *b;
    }
}

fn channel_set(second_moment: bool) -> &'static str {
    if second_moment {
        "numerator, denominator and second moment"
    } else {
        "numerator and denominator"
    }
}
