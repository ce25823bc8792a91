use crate::error::TriangulationError;
use crate::linalg::{check_system, descending_order, NullSpace, NullSpaceBackend};
use nalgebra::{DMatrix, Vector4};

/// Null space from the singular value decomposition of `A`.
///
/// The solution is the right singular vector belonging to the smallest
/// singular value, i.e. the last row of `Vᵀ` once the spectrum is sorted in
/// descending order.
///
/// ```
/// use nalgebra::DMatrix;
/// use sfm_triangulation::linalg::{NullSpaceBackend, SvdBackend};
///
/// // Rank-3 system whose null space is the W axis.
/// let a = DMatrix::from_row_slice(4, 4, &[
///     1.0, 0.0, 0.0, 0.0,
///     0.0, 2.0, 0.0, 0.0,
///     0.0, 0.0, 3.0, 0.0,
///     1.0, 1.0, 1.0, 0.0,
/// ]);
/// let ns = SvdBackend::new().null_space(&a).unwrap();
/// assert!((ns.vector.w.abs() - 1.0).abs() < 1e-12);
/// assert!(ns.smallest() < 1e-12);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SvdBackend {
    epsilon: f64,
    max_iterations: usize,
}

impl SvdBackend {
    /// Creates a `SvdBackend` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the convergence epsilon of the SVD iteration.
    ///
    /// Default is `f64::EPSILON`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of SVD iterations. `0` iterates until convergence.
    ///
    /// Default is `0`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }
}

impl Default for SvdBackend {
    fn default() -> Self {
        Self {
            epsilon: f64::EPSILON,
            max_iterations: 0,
        }
    }
}

impl NullSpaceBackend for SvdBackend {
    fn name(&self) -> &'static str {
        "svd"
    }

    fn null_space(&self, a: &DMatrix<f64>) -> Result<NullSpace, TriangulationError> {
        check_system(a)?;

        let svd = a
            .clone()
            .try_svd(false, true, self.epsilon, self.max_iterations)
            .ok_or_else(|| {
                TriangulationError::DegenerateConfiguration("SVD did not converge".to_string())
            })?;
        let v_t = svd.v_t.ok_or_else(|| {
            TriangulationError::DegenerateConfiguration(
                "SVD did not produce right singular vectors".to_string(),
            )
        })?;

        let values = svd.singular_values.as_slice();
        let order = descending_order(values);
        let smallest = order[order.len() - 1];

        let vector = Vector4::from_iterator(v_t.row(smallest).iter().copied());
        let singular_values = order.iter().map(|&i| values[i]).collect();

        Ok(NullSpace {
            vector: vector.normalize(),
            singular_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_overdetermined_system_recovers_known_vector() {
        let x = Vector4::new(0.5, -1.0, 2.0, 1.0).normalize();
        // Six rows orthogonal to `x`.
        let rows = [
            [2.0, 1.0, 0.0, 0.0],
            [0.0, 2.0, 1.0, 0.0],
            [0.0, 0.0, 1.0, -2.0],
            [4.0, 0.0, 0.0, -2.0],
            [2.0, 1.0, 1.0, -2.0],
            [0.0, 1.0, 0.0, 1.0],
        ];
        let a = DMatrix::from_fn(rows.len(), 4, |r, c| rows[r][c]);
        assert_relative_eq!((&a * x).norm(), 0.0, epsilon = 1e-12);

        let ns = SvdBackend::new().null_space(&a).unwrap();
        let aligned = if ns.vector.dot(&x) < 0.0 {
            -ns.vector
        } else {
            ns.vector
        };
        assert_relative_eq!(aligned, x, epsilon = 1e-10);
        assert_eq!(ns.singular_values.len(), 4);
        assert!(ns
            .singular_values
            .windows(2)
            .all(|pair| pair[0] >= pair[1]));
        assert!(ns.smallest() < 1e-10);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let err = SvdBackend::new().null_space(&DMatrix::zeros(3, 4)).unwrap_err();
        assert!(matches!(err, TriangulationError::InputShape(_)));
    }
}
