//! Conversions between homogeneous and Euclidean coordinates.
//!
//! Homogeneous points are only defined up to a nonzero scale, and a vanishing
//! last component marks a point at infinity. [`to_euclidean`] refuses to divide
//! in that case instead of returning huge, meaningless coordinates.

use crate::camera::ProjectionMatrix;
use crate::error::TriangulationError;
use nalgebra::{Point2, Point3, Vector2, Vector3, Vector4};

/// Threshold on `|W| / ‖X‖` below which a homogeneous point is treated as
/// lying at infinity.
pub const DEFAULT_INFINITY_EPSILON: f64 = 1e-12;

/// Converts a homogeneous 3D point to Euclidean coordinates using
/// [`DEFAULT_INFINITY_EPSILON`].
///
/// # Errors
///
/// [`TriangulationError::DegenerateConfiguration`] if the point is at infinity.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Point3, Vector4};
/// use sfm_triangulation::geometry::to_euclidean;
///
/// let p = to_euclidean(&Vector4::new(2.0, 4.0, 6.0, 2.0)).unwrap();
/// assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
///
/// assert!(to_euclidean(&Vector4::new(1.0, 0.0, 0.0, 0.0)).is_err());
/// ```
pub fn to_euclidean(point: &Vector4<f64>) -> Result<Point3<f64>, TriangulationError> {
    to_euclidean_with_epsilon(point, DEFAULT_INFINITY_EPSILON)
}

/// Same as [`to_euclidean`] with an explicit relative threshold.
pub fn to_euclidean_with_epsilon(
    point: &Vector4<f64>,
    epsilon: f64,
) -> Result<Point3<f64>, TriangulationError> {
    if !point.iter().all(|v| v.is_finite()) {
        return Err(TriangulationError::DegenerateConfiguration(format!(
            "homogeneous point has non-finite components: {point:?}"
        )));
    }

    let norm = point.norm();
    if norm == 0.0 {
        return Err(TriangulationError::DegenerateConfiguration(
            "homogeneous point is the zero vector".to_string(),
        ));
    }

    let w = point.w;
    if w.abs() <= epsilon * norm {
        return Err(TriangulationError::DegenerateConfiguration(format!(
            "point at infinity: |W| = {:e} relative to norm {:e}",
            w.abs(),
            norm
        )));
    }

    Ok(Point3::from(point.xyz() / w))
}

/// Embeds a Euclidean point with `W = 1`.
pub fn to_homogeneous(point: &Point3<f64>) -> Vector4<f64> {
    point.to_homogeneous()
}

/// Projects a Euclidean world point through `projection` to Euclidean image coordinates.
///
/// # Errors
///
/// [`TriangulationError::DegenerateConfiguration`] if the point lies on the
/// camera's principal plane, so its image is at infinity.
pub fn project(
    projection: &ProjectionMatrix,
    point: &Point3<f64>,
) -> Result<Point2<f64>, TriangulationError> {
    project_homogeneous(projection, &to_homogeneous(point))
}

/// Projects a homogeneous world point through `projection`.
pub fn project_homogeneous(
    projection: &ProjectionMatrix,
    point: &Vector4<f64>,
) -> Result<Point2<f64>, TriangulationError> {
    let image: Vector3<f64> = projection.apply(point);
    if image.z.abs() <= DEFAULT_INFINITY_EPSILON * image.norm() {
        return Err(TriangulationError::DegenerateConfiguration(
            "projection lands at infinity (point on the principal plane)".to_string(),
        ));
    }
    Ok(Point2::new(image.x / image.z, image.y / image.z))
}

/// Largest absolute coordinate difference between two 3D points.
pub fn distance_l_infinity(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).amax()
}

/// Largest absolute coordinate difference between two image points.
pub fn distance_l_infinity_2d(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let d: Vector2<f64> = a - b;
    d.amax()
}
