use nalgebra::{Point3, Vector3};
use std::fmt;
use thiserror::Error;

/// Voxel index reported for points that fall outside the scored volume.
pub const OUTSIDE_GRID: i64 = -1;

const CONGRUENCE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum GeometryError {
    #[error("Resolution must be at least one voxel along every axis (got {0:?})")]
    EmptyResolution([usize; 3]),
    #[error("Half-size must be positive and finite along every axis (got {0:?})")]
    InvalidHalfSize([f64; 3]),
    #[error("Origin must be finite (got {0:?})")]
    InvalidOrigin([f64; 3]),
}

/// Shape and placement of a voxelized volume.
///
/// `origin` is the physical centre of the volume; the volume spans
/// `origin ± half_size` along each axis. Voxels are enumerated in row-major
/// order with `x` varying fastest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    resolution: Vector3<usize>,
    half_size: Vector3<f64>,
    origin: Point3<f64>,
}

impl GridGeometry {
    pub fn new(
        resolution: Vector3<usize>,
        half_size: Vector3<f64>,
        origin: Point3<f64>,
    ) -> Result<Self, GeometryError> {
        if resolution.iter().any(|&n| n == 0) {
            return Err(GeometryError::EmptyResolution(resolution.into()));
        }
        if half_size.iter().any(|&h| !h.is_finite() || h <= 0.0) {
            return Err(GeometryError::InvalidHalfSize(half_size.into()));
        }
        if origin.coords.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::InvalidOrigin(origin.coords.into()));
        }
        Ok(Self {
            resolution,
            half_size,
            origin,
        })
    }

    /// Rebuilds a geometry from the spacing/first-voxel-centre description
    /// used by image headers.
    pub fn from_spacing(
        resolution: Vector3<usize>,
        spacing: Vector3<f64>,
        first_voxel_center: Point3<f64>,
    ) -> Result<Self, GeometryError> {
        let extent = spacing.component_mul(&resolution.map(|n| n as f64));
        let half_size = extent * 0.5;
        let origin = first_voxel_center - spacing * 0.5 + half_size;
        Self::new(resolution, half_size, origin)
    }

    pub fn resolution(&self) -> Vector3<usize> {
        self.resolution
    }

    pub fn half_size(&self) -> Vector3<f64> {
        self.half_size
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.resolution.iter().product()
    }

    pub fn spacing(&self) -> Vector3<f64> {
        (self.half_size * 2.0).component_div(&self.resolution.map(|n| n as f64))
    }

    pub fn first_voxel_center(&self) -> Point3<f64> {
        self.origin - self.half_size + self.spacing() * 0.5
    }

    /// Maps a point to its row-major voxel index, or [`OUTSIDE_GRID`] when
    /// the point lies outside the volume.
    pub fn voxel_index(&self, point: &Point3<f64>) -> i64 {
        let local = *point - (self.origin - self.half_size);
        let spacing = self.spacing();

        let mut ijk = [0usize; 3];
        for axis in 0..3 {
            let extent = 2.0 * self.half_size[axis];
            let x = local[axis];
            if !(0.0..=extent).contains(&x) {
                return OUTSIDE_GRID;
            }
            // points on the far face belong to the last voxel
            let cell = (x / spacing[axis]).floor() as usize;
            ijk[axis] = cell.min(self.resolution[axis] - 1);
        }

        let [nx, ny, _] = [self.resolution.x, self.resolution.y, self.resolution.z];
        (ijk[0] + ijk[1] * nx + ijk[2] * nx * ny) as i64
    }

    /// Same resolution, and extent/origin equal up to round-off.
    pub fn is_congruent(&self, other: &GridGeometry) -> bool {
        let close = |a: f64, b: f64| {
            (a - b).abs() <= CONGRUENCE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
        };
        self.resolution == other.resolution
            && self
                .half_size
                .iter()
                .zip(other.half_size.iter())
                .all(|(&a, &b)| close(a, b))
            && self
                .origin
                .coords
                .iter()
                .zip(other.origin.coords.iter())
                .all(|(&a, &b)| close(a, b))
    }
}

impl fmt::Display for GridGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} voxels, half-size ({}, {}, {}), origin ({}, {}, {})",
            self.resolution.x,
            self.resolution.y,
            self.resolution.z,
            self.half_size.x,
            self.half_size.y,
            self.half_size.z,
            self.origin.x,
            self.origin.y,
            self.origin.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(n: usize) -> GridGeometry {
        GridGeometry::new(
            Vector3::new(n, n, n),
            Vector3::new(5.0, 5.0, 5.0),
            Point3::origin(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_zero_resolution() {
        let result = GridGeometry::new(
            Vector3::new(1, 0, 1),
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
        );
        assert_eq!(result, Err(GeometryError::EmptyResolution([1, 0, 1])));
    }

    #[test]
    fn new_rejects_non_positive_half_size() {
        let result = GridGeometry::new(
            Vector3::new(1, 1, 1),
            Vector3::new(1.0, -1.0, 1.0),
            Point3::origin(),
        );
        assert!(matches!(result, Err(GeometryError::InvalidHalfSize(_))));
    }

    #[test]
    fn voxel_count_and_spacing_follow_resolution() {
        let geometry = GridGeometry::new(
            Vector3::new(2, 4, 5),
            Vector3::new(1.0, 2.0, 5.0),
            Point3::origin(),
        )
        .unwrap();
        assert_eq!(geometry.voxel_count(), 40);
        assert_eq!(geometry.spacing(), Vector3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn voxel_index_is_row_major_with_x_fastest() {
        let geometry = cube(10);
        assert_eq!(geometry.voxel_index(&Point3::new(-4.5, -4.5, -4.5)), 0);
        assert_eq!(geometry.voxel_index(&Point3::new(-3.5, -4.5, -4.5)), 1);
        assert_eq!(geometry.voxel_index(&Point3::new(-4.5, -3.5, -4.5)), 10);
        assert_eq!(geometry.voxel_index(&Point3::new(-4.5, -4.5, -3.5)), 100);
        assert_eq!(geometry.voxel_index(&Point3::new(4.5, 4.5, 4.5)), 999);
    }

    #[test]
    fn voxel_index_outside_volume_is_negative() {
        let geometry = cube(10);
        assert_eq!(geometry.voxel_index(&Point3::new(5.1, 0.0, 0.0)), OUTSIDE_GRID);
        assert_eq!(geometry.voxel_index(&Point3::new(0.0, -5.1, 0.0)), OUTSIDE_GRID);
    }

    #[test]
    fn voxel_index_on_far_face_maps_to_last_voxel() {
        let geometry = cube(10);
        assert_eq!(geometry.voxel_index(&Point3::new(5.0, 5.0, 5.0)), 999);
    }

    #[test]
    fn from_spacing_inverts_first_voxel_center() {
        let geometry = GridGeometry::new(
            Vector3::new(3, 4, 5),
            Vector3::new(1.5, 2.0, 10.0),
            Point3::new(1.0, -2.0, 3.0),
        )
        .unwrap();
        let rebuilt = GridGeometry::from_spacing(
            geometry.resolution(),
            geometry.spacing(),
            geometry.first_voxel_center(),
        )
        .unwrap();
        assert!(geometry.is_congruent(&rebuilt));
    }

    #[test]
    fn is_congruent_detects_different_origin() {
        let a = cube(4);
        let b = GridGeometry::new(a.resolution(), a.half_size(), Point3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert!(!a.is_congruent(&b));
    }
}
