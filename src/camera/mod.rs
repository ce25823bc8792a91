//! Camera-side inputs of the triangulation pipeline.
//!
//! A [`ProjectionMatrix`] maps homogeneous world points to homogeneous image
//! points for one calibrated camera. An [`Observation`] pairs that matrix with
//! the 2D location at which the camera saw the target point. The [`pinhole`]
//! submodule composes projection matrices from intrinsics and a world-to-camera
//! pose, and loads them from YAML.

use crate::error::TriangulationError;
use nalgebra::{DMatrix, Matrix3, Matrix3x4, Point2, RowVector4, Vector4};
use serde::{Deserialize, Serialize};

pub mod pinhole;

pub use pinhole::{CameraRig, PinholeCamera};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Calibration matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}

/// A 3×4 camera projection matrix `P`, stored row-major as in `P * X`.
///
/// `P` is assumed to have rank 3. This is not checked; a rank-deficient
/// matrix yields degenerate results downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMatrix(Matrix3x4<f64>);

impl ProjectionMatrix {
    pub fn new(matrix: Matrix3x4<f64>) -> Self {
        ProjectionMatrix(matrix)
    }

    /// Builds a projection matrix from 12 values in row-major order.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] if `values` does not hold exactly 12 entries.
    pub fn from_row_slice(values: &[f64]) -> Result<Self, TriangulationError> {
        if values.len() != 12 {
            return Err(TriangulationError::InputShape(format!(
                "projection matrix needs 12 row-major values, got {}",
                values.len()
            )));
        }
        Ok(ProjectionMatrix(Matrix3x4::from_row_slice(values)))
    }

    /// Builds a projection matrix from a dynamically sized matrix.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] if `matrix` is not 3×4.
    pub fn from_dmatrix(matrix: &DMatrix<f64>) -> Result<Self, TriangulationError> {
        if matrix.shape() != (3, 4) {
            return Err(TriangulationError::InputShape(format!(
                "projection matrix must be 3x4, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(ProjectionMatrix(matrix.fixed_view::<3, 4>(0, 0).into_owned()))
    }

    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.0
    }

    pub fn row(&self, i: usize) -> RowVector4<f64> {
        self.0.row(i).into_owned()
    }

    /// Projects a homogeneous world point to a homogeneous image point.
    pub fn apply(&self, point: &Vector4<f64>) -> nalgebra::Vector3<f64> {
        self.0 * point
    }

    /// Homogeneous camera center `C`, the right null vector of `P` (`P * C = 0`).
    ///
    /// Computed from the signed 3×3 minors of `P`, so the result is not
    /// normalized. A zero vector means `P` is rank deficient.
    pub fn camera_center(&self) -> Vector4<f64> {
        let minor = |skip: usize| {
            let columns: Vec<_> = (0..4)
                .filter(|&c| c != skip)
                .map(|c| self.0.column(c).into_owned())
                .collect();
            Matrix3::from_columns(columns.as_slice()).determinant()
        };
        Vector4::new(minor(0), -minor(1), minor(2), -minor(3))
    }
}

impl From<Matrix3x4<f64>> for ProjectionMatrix {
    fn from(matrix: Matrix3x4<f64>) -> Self {
        ProjectionMatrix(matrix)
    }
}

/// One camera's view of the target point: "this camera saw the point here".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub point: Point2<f64>,
    pub projection: ProjectionMatrix,
}

impl Observation {
    pub fn new(point: Point2<f64>, projection: ProjectionMatrix) -> Self {
        Self { point, projection }
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), TriangulationError> {
        let usable = |f: f64| f.is_finite() && f > 0.0;
        if !(usable(intrinsics.fx) && usable(intrinsics.fy)) {
            return Err(TriangulationError::Config(
                "Focal length must be positive and finite".to_string(),
            ));
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(TriangulationError::Config(
                "Principal point must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that `rotation` is orthonormal with determinant +1.
    pub fn validate_rotation(rotation: &Matrix3<f64>) -> Result<(), TriangulationError> {
        const TOLERANCE: f64 = 1e-6;
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).abs().max();
        if !orthogonality.is_finite() || orthogonality > TOLERANCE {
            return Err(TriangulationError::Config(format!(
                "Rotation is not orthonormal (deviation {orthogonality:e})"
            )));
        }
        let det = rotation.determinant();
        if (det - 1.0).abs() > TOLERANCE {
            return Err(TriangulationError::Config(format!(
                "Rotation must have determinant +1, got {det}"
            )));
        }
        Ok(())
    }
}
