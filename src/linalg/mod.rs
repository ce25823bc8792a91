//! Null-space extraction behind a small capability trait.
//!
//! The triangulation core only needs one thing from a decomposition: the
//! unit vector `x` minimizing `‖A x‖` for a tall `2N × 4` system, together with
//! the singular values of `A` so the caller can judge how well that vector is
//! determined. [`NullSpaceBackend`] captures exactly that, with two
//! implementations on top of `nalgebra`:
//!
//! * [`SvdBackend`] takes the right singular vector of the smallest singular value.
//! * [`SymmetricEigenBackend`] takes the eigenvector of the smallest eigenvalue
//!   of `AᵀA`. Cheaper for many views, but squaring `A` costs precision.

use crate::error::TriangulationError;
use nalgebra::{DMatrix, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod eigen;
pub mod svd;

pub use eigen::SymmetricEigenBackend;
pub use svd::SvdBackend;

/// The minimizer of `‖A x‖` subject to `‖x‖ = 1`, plus the spectrum it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSpace {
    /// Unit-norm homogeneous solution.
    pub vector: Vector4<f64>,
    /// Singular values of `A`, in descending order.
    pub singular_values: Vec<f64>,
}

impl NullSpace {
    pub fn smallest(&self) -> f64 {
        self.singular_values.last().copied().unwrap_or(0.0)
    }

    pub fn second_smallest(&self) -> Option<f64> {
        let n = self.singular_values.len();
        (n >= 2).then(|| self.singular_values[n - 2])
    }
}

/// A decomposition able to return the null vector of a `rows × 4` system.
pub trait NullSpaceBackend: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Solves `min ‖A x‖` over unit vectors `x`.
    ///
    /// # Errors
    ///
    /// * [`TriangulationError::InputShape`] if `a` does not have 4 columns and at least 4 rows.
    /// * [`TriangulationError::DegenerateConfiguration`] if the decomposition
    ///   does not converge or `a` holds non-finite values.
    fn null_space(&self, a: &DMatrix<f64>) -> Result<NullSpace, TriangulationError>;

    /// Singular values below `rank_tolerance() * σ_max` count as zero.
    fn rank_tolerance(&self) -> f64 {
        1e-10
    }
}

/// Selects a [`NullSpaceBackend`] from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Svd,
    SymmetricEigen,
}

impl BackendKind {
    pub fn build(self) -> Box<dyn NullSpaceBackend> {
        match self {
            BackendKind::Svd => Box::new(SvdBackend::new()),
            BackendKind::SymmetricEigen => Box::new(SymmetricEigenBackend::new()),
        }
    }
}

/// Shape and finiteness checks shared by the backends.
pub(crate) fn check_system(a: &DMatrix<f64>) -> Result<(), TriangulationError> {
    if a.ncols() != 4 || a.nrows() < 4 {
        return Err(TriangulationError::InputShape(format!(
            "linear system must be (2N x 4) with N >= 2, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    if !a.iter().all(|v| v.is_finite()) {
        return Err(TriangulationError::DegenerateConfiguration(
            "linear system contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Indices of `values` sorted so that the values are descending.
pub(crate) fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_order() {
        assert_eq!(descending_order(&[0.5, 3.0, 1e-9, 2.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_check_system_shape() {
        assert!(check_system(&DMatrix::zeros(4, 4)).is_ok());
        assert!(matches!(
            check_system(&DMatrix::zeros(2, 4)),
            Err(TriangulationError::InputShape(_))
        ));
        assert!(matches!(
            check_system(&DMatrix::zeros(6, 3)),
            Err(TriangulationError::InputShape(_))
        ));

        let mut bad = DMatrix::zeros(4, 4);
        bad[(1, 2)] = f64::INFINITY;
        assert!(matches!(
            check_system(&bad),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
    }

    #[test]
    fn test_null_space_accessors() {
        let ns = NullSpace {
            vector: Vector4::new(0.0, 0.0, 0.0, 1.0),
            singular_values: vec![4.0, 3.0, 2.0, 1e-12],
        };
        assert_eq!(ns.smallest(), 1e-12);
        assert_eq!(ns.second_smallest(), Some(2.0));
    }

    #[test]
    fn test_backend_kind_builds_named_backend() {
        assert_eq!(BackendKind::Svd.build().name(), "svd");
        assert_eq!(BackendKind::SymmetricEigen.build().name(), "symmetric_eigen");
        assert_eq!(BackendKind::default(), BackendKind::Svd);
    }
}
