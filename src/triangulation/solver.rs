//! Null-space solve of the DLT system with an ambiguity check.

use crate::error::TriangulationError;
use crate::linalg::{NullSpace, NullSpaceBackend};
use nalgebra::DMatrix;

/// Default closeness threshold on `σ_min / σ_second` above which the null
/// space is reported as ambiguous.
pub const DEFAULT_NULL_SPACE_CLOSENESS: f64 = 1.0 - 1e-7;

/// A solved DLT system.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedSystem {
    pub null_space: NullSpace,
    /// Set to [`TriangulationError::NumericalInstability`] when the two
    /// smallest singular values are nearly tied. The vector is still usable.
    pub warning: Option<TriangulationError>,
}

/// Solves `min ‖A X‖, ‖X‖ = 1` with `backend` and checks whether the solution
/// is well determined.
///
/// # Errors
///
/// * Errors of [`NullSpaceBackend::null_space`].
/// * [`TriangulationError::DegenerateConfiguration`] if the null space has
///   two or more dimensions, e.g. a point on the baseline of two cameras or
///   the same camera used twice.
pub fn solve(
    a: &DMatrix<f64>,
    backend: &dyn NullSpaceBackend,
    closeness: f64,
) -> Result<SolvedSystem, TriangulationError> {
    let null_space = backend.null_space(a)?;
    check_rank(&null_space, backend.rank_tolerance())?;
    let warning = ambiguity(&null_space, closeness);
    Ok(SolvedSystem {
        null_space,
        warning,
    })
}

/// Fails if the second smallest singular value is zero relative to the
/// largest one, leaving no unique null direction.
pub fn check_rank(null_space: &NullSpace, tolerance: f64) -> Result<(), TriangulationError> {
    let Some(second_smallest) = null_space.second_smallest() else {
        return Ok(());
    };
    let largest = null_space.singular_values.first().copied().unwrap_or(0.0);

    if second_smallest <= tolerance * largest {
        return Err(TriangulationError::DegenerateConfiguration(format!(
            "null space has more than one dimension (singular values {:?})",
            null_space.singular_values
        )));
    }
    Ok(())
}

/// Returns a [`TriangulationError::NumericalInstability`] if the smallest two
/// singular values are too close to separate the null space.
pub fn ambiguity(null_space: &NullSpace, closeness: f64) -> Option<TriangulationError> {
    let smallest = null_space.smallest();
    let second_smallest = null_space.second_smallest()?;

    let ratio = if second_smallest == 0.0 {
        1.0
    } else {
        smallest / second_smallest
    };

    (ratio > closeness).then_some(TriangulationError::NumericalInstability {
        smallest,
        second_smallest,
        ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::SvdBackend;
    use nalgebra::Vector4;

    fn null_space(singular_values: Vec<f64>) -> NullSpace {
        NullSpace {
            vector: Vector4::new(0.0, 0.0, 0.0, 1.0),
            singular_values,
        }
    }

    #[test]
    fn test_well_separated_spectrum_is_not_flagged() {
        let ns = null_space(vec![10.0, 5.0, 1.0, 1e-14]);
        assert!(ambiguity(&ns, DEFAULT_NULL_SPACE_CLOSENESS).is_none());
    }

    #[test]
    fn test_tied_smallest_values_are_flagged() {
        let ns = null_space(vec![10.0, 5.0, 0.5, 0.5]);
        match ambiguity(&ns, DEFAULT_NULL_SPACE_CLOSENESS) {
            Some(TriangulationError::NumericalInstability { ratio, .. }) => {
                assert_eq!(ratio, 1.0)
            }
            other => panic!("expected instability, got {other:?}"),
        }
    }

    #[test]
    fn test_two_dimensional_null_space_is_degenerate() {
        let ns = null_space(vec![10.0, 5.0, 1e-17, 1e-18]);
        assert!(matches!(
            check_rank(&ns, 1e-10),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
        assert!(check_rank(&null_space(vec![10.0, 5.0, 1.0, 1e-14]), 1e-10).is_ok());
    }

    #[test]
    fn test_closeness_threshold_is_configurable() {
        let ns = null_space(vec![10.0, 5.0, 1.0, 0.9]);
        assert!(ambiguity(&ns, DEFAULT_NULL_SPACE_CLOSENESS).is_none());
        assert!(ambiguity(&ns, 0.8).is_some());
    }

    #[test]
    fn test_solve_rank_deficient_system() {
        // Rank 2: every vector in the Z/W plane is a solution.
        let a = DMatrix::from_row_slice(
            4,
            4,
            &[
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                2.0, 0.0, 0.0, 0.0, //
                0.0, 3.0, 0.0, 0.0,
            ],
        );
        assert!(matches!(
            solve(&a, &SvdBackend::new(), DEFAULT_NULL_SPACE_CLOSENESS),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
    }
}
