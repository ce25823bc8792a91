use crate::error::TriangulationError;
use crate::linalg::{check_system, descending_order, NullSpace, NullSpaceBackend};
use nalgebra::{DMatrix, Matrix4};

/// Null space from the symmetric eigen decomposition of the 4×4 normal
/// matrix `AᵀA`.
///
/// The eigenvector of the smallest eigenvalue of `AᵀA` is the right singular
/// vector of the smallest singular value of `A`, and the singular values are
/// recovered as `sqrt(max(λ, 0))`. The normal matrix stays 4×4 whatever the
/// number of views, but squaring the condition number limits accuracy when
/// image coordinates are large.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SymmetricEigenBackend {
    epsilon: f64,
    max_iterations: usize,
}

impl SymmetricEigenBackend {
    /// Creates a `SymmetricEigenBackend` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the epsilon used in the symmetric eigen solver.
    ///
    /// Default is `1e-12`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of iterations for the symmetric eigen solver.
    ///
    /// Default is `1000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }
}

impl Default for SymmetricEigenBackend {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
        }
    }
}

impl NullSpaceBackend for SymmetricEigenBackend {
    fn name(&self) -> &'static str {
        "symmetric_eigen"
    }

    // sqrt(λ) resolves singular values only down to about sqrt(eps) * σ_max.
    fn rank_tolerance(&self) -> f64 {
        1e-7
    }

    fn null_space(&self, a: &DMatrix<f64>) -> Result<NullSpace, TriangulationError> {
        check_system(a)?;

        let normal = a.transpose() * a;
        let normal = Matrix4::from_iterator(normal.iter().copied());

        let se = normal
            .try_symmetric_eigen(self.epsilon, self.max_iterations)
            .ok_or_else(|| {
                TriangulationError::DegenerateConfiguration(
                    "symmetric eigen decomposition did not converge".to_string(),
                )
            })?;

        let eigenvalues = se.eigenvalues.as_slice();
        let order = descending_order(eigenvalues);
        let smallest = order[order.len() - 1];

        let singular_values = order
            .iter()
            .map(|&i| eigenvalues[i].max(0.0).sqrt())
            .collect();
        let vector = se.eigenvectors.column(smallest).normalize();

        Ok(NullSpace {
            vector,
            singular_values,
        })
    }
}
