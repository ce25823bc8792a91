//! Direct Linear Transform system for one target point.
//!
//! Each observation `(x, y)` seen through `P` constrains the homogeneous point
//! `X` by `x × (P X) = 0`. Two of the three cross-product rows are independent:
//!
//! ```text
//! (x * P[2] - P[0]) · X = 0
//! (y * P[2] - P[1]) · X = 0
//! ```
//!
//! Stacking them for `N` views gives a `2N × 4` matrix whose (approximate)
//! null vector is the point. With two noiseless views the system is a 4×4
//! matrix of rank 3; with more views it is overdetermined and the null vector
//! is the algebraic least-squares fit, not the reprojection-optimal one.

use crate::camera::Observation;
use crate::error::TriangulationError;
use nalgebra::DMatrix;

/// Builds the `2N × 4` DLT matrix for `observations`.
///
/// # Errors
///
/// [`TriangulationError::InputShape`] if fewer than 2 observations are given.
pub fn build_system(observations: &[Observation]) -> Result<DMatrix<f64>, TriangulationError> {
    if observations.len() < 2 {
        return Err(TriangulationError::InputShape(format!(
            "triangulation needs at least 2 views, got {}",
            observations.len()
        )));
    }

    let mut a = DMatrix::<f64>::zeros(2 * observations.len(), 4);
    for (i, observation) in observations.iter().enumerate() {
        let p = &observation.projection;
        let x = observation.point.x;
        let y = observation.point.y;

        let third = p.row(2);
        a.row_mut(2 * i).copy_from(&(third * x - p.row(0)));
        a.row_mut(2 * i + 1).copy_from(&(third * y - p.row(1)));
    }

    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ProjectionMatrix;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3x4, Point2, RowVector4, Vector4};

    fn observation(x: f64, y: f64, tx: f64) -> Observation {
        let mut m = Matrix3x4::identity();
        m[(0, 3)] = tx;
        Observation::new(Point2::new(x, y), ProjectionMatrix::new(m))
    }

    #[test]
    fn test_rows_follow_cross_product_form() {
        let observations = [observation(0.5, -0.25, 0.0), observation(0.1, 0.2, -1.0)];
        let a = build_system(&observations).unwrap();

        assert_eq!(a.shape(), (4, 4));
        assert_eq!(a.row(0).into_owned(), RowVector4::new(-1.0, 0.0, 0.5, 0.0));
        assert_eq!(a.row(1).into_owned(), RowVector4::new(0.0, -1.0, -0.25, 0.0));
        assert_eq!(a.row(2).into_owned(), RowVector4::new(-1.0, 0.0, 0.1, 1.0));
        assert_eq!(a.row(3).into_owned(), RowVector4::new(0.0, -1.0, 0.2, 0.0));
    }

    #[test]
    fn test_true_point_is_in_null_space() {
        let point = Vector4::new(0.3, -0.2, 4.0, 1.0);
        let views: Vec<Observation> = [0.0, -0.5, 0.7]
            .iter()
            .map(|&tx| {
                let mut m = Matrix3x4::identity();
                m[(0, 3)] = tx;
                let p = ProjectionMatrix::new(m);
                let x = p.apply(&point);
                Observation::new(Point2::new(x.x / x.z, x.y / x.z), p)
            })
            .collect();

        let a = build_system(&views).unwrap();
        assert_eq!(a.shape(), (6, 4));
        assert_relative_eq!((a * point).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_needs_two_views() {
        assert!(matches!(
            build_system(&[]),
            Err(TriangulationError::InputShape(_))
        ));
        assert!(matches!(
            build_system(&[observation(0.0, 0.0, 0.0)]),
            Err(TriangulationError::InputShape(_))
        ));
    }
}
