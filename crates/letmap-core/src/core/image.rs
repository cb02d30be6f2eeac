use super::geometry::GridGeometry;

/// A dense per-voxel array of `f64` with the geometry it was scored on.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelImage {
    geometry: GridGeometry,
    data: Vec<f64>,
}

impl VoxelImage {
    pub fn zeros(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            data: vec![0.0; geometry.voxel_count()],
        }
    }

    /// Wraps existing voxel values. Returns `None` if the length does not
    /// match the voxel count of `geometry`.
    pub fn from_data(geometry: GridGeometry, data: Vec<f64>) -> Option<Self> {
        (data.len() == geometry.voxel_count()).then_some(Self { geometry, data })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn into_values(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
