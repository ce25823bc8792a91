//! Linear multi-view triangulation.
//!
//! One target point is recovered from two or more [`Observation`]s by
//! stacking the DLT constraints ([`dlt`]), taking the null vector of the
//! stacked system ([`solver`]) and dividing out the homogeneous scale
//! ([`crate::geometry::to_euclidean`]). Two views and many views go through
//! the same path. [`batch`] runs that pipeline independently for many points.
//!
//! ```
//! use nalgebra::{Matrix3x4, Point2, Point3, Vector4};
//! use sfm_triangulation::camera::{Observation, ProjectionMatrix};
//! use sfm_triangulation::triangulation::{triangulate, TriangulationProblem};
//!
//! let truth = Vector4::new(0.2, -0.1, 3.0, 1.0);
//! let observations = [0.0, -0.5].map(|tx| {
//!     let mut m = Matrix3x4::identity();
//!     m[(0, 3)] = tx;
//!     let p = ProjectionMatrix::new(m);
//!     let x = p.apply(&truth);
//!     Observation::new(Point2::new(x.x / x.z, x.y / x.z), p)
//! });
//!
//! let problem = TriangulationProblem::new(observations.to_vec()).unwrap();
//! let point = triangulate(&problem).unwrap();
//! assert!((point - Point3::new(0.2, -0.1, 3.0)).amax() < 1e-10);
//! ```

use crate::camera::{Observation, ProjectionMatrix};
use crate::error::TriangulationError;
use crate::geometry;
use crate::linalg::{BackendKind, NullSpaceBackend};
use log::{debug, warn};
use nalgebra::{Point2, Point3, Vector4};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

pub mod batch;
pub mod dlt;
pub mod solver;

pub use batch::{triangulate_points, BatchReport, BatchSummary, TriangulationBatch};
pub use solver::DEFAULT_NULL_SPACE_CLOSENESS;

/// Tunables of the triangulation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulatorConfig {
    /// Relative threshold on `|W| / ‖X‖` below which a point is at infinity.
    pub infinity_epsilon: f64,
    /// Ratio `σ_min / σ_second` above which the null space is ambiguous.
    pub null_space_closeness: f64,
    /// Decomposition used for the null-space solve.
    pub backend: BackendKind,
    /// Turn ambiguous null spaces into hard failures instead of warnings.
    pub reject_unstable: bool,
    /// Evaluate batches in parallel. Without the `rayon` feature batches
    /// always run sequentially and this flag has no effect.
    pub parallel: bool,
}

impl Default for TriangulatorConfig {
    fn default() -> Self {
        Self {
            infinity_epsilon: geometry::DEFAULT_INFINITY_EPSILON,
            null_space_closeness: DEFAULT_NULL_SPACE_CLOSENESS,
            backend: BackendKind::Svd,
            reject_unstable: false,
            parallel: true,
        }
    }
}

impl TriangulatorConfig {
    #[must_use]
    pub fn infinity_epsilon(self, infinity_epsilon: f64) -> Self {
        Self {
            infinity_epsilon,
            ..self
        }
    }

    #[must_use]
    pub fn null_space_closeness(self, null_space_closeness: f64) -> Self {
        Self {
            null_space_closeness,
            ..self
        }
    }

    #[must_use]
    pub fn backend(self, backend: BackendKind) -> Self {
        Self { backend, ..self }
    }

    #[must_use]
    pub fn reject_unstable(self, reject_unstable: bool) -> Self {
        Self {
            reject_unstable,
            ..self
        }
    }

    #[must_use]
    pub fn parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    pub fn validate(&self) -> Result<(), TriangulationError> {
        if !self.infinity_epsilon.is_finite() || self.infinity_epsilon < 0.0 {
            return Err(TriangulationError::Config(format!(
                "infinity_epsilon must be finite and non-negative, got {}",
                self.infinity_epsilon
            )));
        }
        if !(self.null_space_closeness > 0.0 && self.null_space_closeness <= 1.0) {
            return Err(TriangulationError::Config(format!(
                "null_space_closeness must lie in (0, 1], got {}",
                self.null_space_closeness
            )));
        }
        Ok(())
    }

    /// Loads a configuration from YAML. Missing keys keep their defaults.
    pub fn load_from_yaml(path: &str) -> Result<Self, TriangulationError> {
        let contents = fs::read_to_string(path)?;
        let config: TriangulatorConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_yaml(&self, path: &str) -> Result<(), TriangulationError> {
        let yaml_string = serde_yaml::to_string(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }
}

/// The observations of one target point, at least two of them.
///
/// Observation order does not affect the solution, but per-view outputs such
/// as reprojection residuals follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationProblem {
    observations: Vec<Observation>,
}

impl TriangulationProblem {
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] with fewer than 2 observations.
    pub fn new(observations: Vec<Observation>) -> Result<Self, TriangulationError> {
        if observations.len() < 2 {
            return Err(TriangulationError::InputShape(format!(
                "triangulation needs at least 2 views, got {}",
                observations.len()
            )));
        }
        Ok(Self { observations })
    }

    /// Pairs image points with cameras view by view.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] if the counts differ or are below 2.
    pub fn from_views(
        points: &[Point2<f64>],
        cameras: &[ProjectionMatrix],
    ) -> Result<Self, TriangulationError> {
        if points.len() != cameras.len() {
            return Err(TriangulationError::InputShape(format!(
                "mismatched number of points ({}) and cameras ({})",
                points.len(),
                cameras.len()
            )));
        }
        Self::new(
            points
                .iter()
                .zip(cameras)
                .map(|(&point, &camera)| Observation::new(point, camera))
                .collect(),
        )
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Homogeneous solution of one problem, before the infinity check.
#[derive(Debug, Clone, PartialEq)]
pub struct HomogeneousSolution {
    /// Unit-norm homogeneous point.
    pub point: Vector4<f64>,
    /// Singular values of the DLT system, descending.
    pub singular_values: Vec<f64>,
    pub warning: Option<TriangulationError>,
}

/// A triangulated point with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulatedPoint {
    pub point: Point3<f64>,
    pub homogeneous: Vector4<f64>,
    pub singular_values: Vec<f64>,
    /// [`TriangulationError::NumericalInstability`] if the estimate is less certain.
    pub warning: Option<TriangulationError>,
}

impl TriangulatedPoint {
    pub fn is_flagged(&self) -> bool {
        self.warning.is_some()
    }
}

/// Runs the DLT pipeline with a fixed configuration and null-space backend.
#[derive(Debug)]
pub struct Triangulator {
    config: TriangulatorConfig,
    backend: Box<dyn NullSpaceBackend>,
}

impl Default for Triangulator {
    fn default() -> Self {
        let config = TriangulatorConfig::default();
        let backend = config.backend.build();
        Self { config, backend }
    }
}

impl Triangulator {
    /// # Errors
    ///
    /// [`TriangulationError::Config`] if `config` fails validation.
    pub fn new(config: TriangulatorConfig) -> Result<Self, TriangulationError> {
        config.validate()?;
        let backend = config.backend.build();
        Ok(Self { config, backend })
    }

    /// Uses `backend` instead of the one named in `config.backend`.
    pub fn with_backend(
        config: TriangulatorConfig,
        backend: Box<dyn NullSpaceBackend>,
    ) -> Result<Self, TriangulationError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &TriangulatorConfig {
        &self.config
    }

    /// Solves for the unit-norm homogeneous point, leaving the infinity
    /// check to the caller.
    pub fn triangulate_homogeneous(
        &self,
        problem: &TriangulationProblem,
    ) -> Result<HomogeneousSolution, TriangulationError> {
        self.solve_observations(problem.observations())
    }

    /// Triangulates one point and keeps the solver diagnostics.
    pub fn triangulate_detailed(
        &self,
        problem: &TriangulationProblem,
    ) -> Result<TriangulatedPoint, TriangulationError> {
        self.triangulate_observations(problem.observations())
    }

    /// Triangulates one point.
    ///
    /// An ambiguous null space is logged and the estimate returned anyway,
    /// unless [`TriangulatorConfig::reject_unstable`] is set.
    pub fn triangulate(
        &self,
        problem: &TriangulationProblem,
    ) -> Result<Point3<f64>, TriangulationError> {
        self.triangulate_detailed(problem).map(|t| t.point)
    }

    /// Same as [`Triangulator::triangulate_detailed`] on a raw slice, which may
    /// hold fewer than two observations (reported as an input-shape error).
    pub fn triangulate_observations(
        &self,
        observations: &[Observation],
    ) -> Result<TriangulatedPoint, TriangulationError> {
        let solution = self.solve_observations(observations)?;
        let point =
            geometry::to_euclidean_with_epsilon(&solution.point, self.config.infinity_epsilon)?;

        debug!(
            "Triangulated {:?} from {} views (sigma_min = {:e}, w = {:e})",
            point,
            observations.len(),
            solution.singular_values.last().copied().unwrap_or(0.0),
            solution.point.w
        );

        Ok(TriangulatedPoint {
            point,
            homogeneous: solution.point,
            singular_values: solution.singular_values,
            warning: solution.warning,
        })
    }

    fn solve_observations(
        &self,
        observations: &[Observation],
    ) -> Result<HomogeneousSolution, TriangulationError> {
        let a = dlt::build_system(observations)?;
        let solved = solver::solve(&a, self.backend.as_ref(), self.config.null_space_closeness)?;

        if let Some(warning) = &solved.warning {
            if self.config.reject_unstable {
                return Err(warning.clone());
            }
            warn!("{} ({} backend)", warning, self.backend.name());
        }

        Ok(HomogeneousSolution {
            point: solved.null_space.vector,
            singular_values: solved.null_space.singular_values,
            warning: solved.warning,
        })
    }
}

/// Triangulates one point with the default configuration.
pub fn triangulate(problem: &TriangulationProblem) -> Result<Point3<f64>, TriangulationError> {
    Triangulator::default().triangulate(problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3x4;

    fn shifted_camera(tx: f64, ty: f64) -> ProjectionMatrix {
        let mut m = Matrix3x4::identity();
        m[(0, 3)] = tx;
        m[(1, 3)] = ty;
        ProjectionMatrix::new(m)
    }

    fn observe(camera: ProjectionMatrix, point: &Point3<f64>) -> Observation {
        Observation::new(geometry::project(&camera, point).unwrap(), camera)
    }

    #[test]
    fn test_problem_requires_two_observations() {
        let camera = shifted_camera(0.0, 0.0);
        let single = vec![observe(camera, &Point3::new(0.0, 0.0, 2.0))];
        assert!(matches!(
            TriangulationProblem::new(single),
            Err(TriangulationError::InputShape(_))
        ));
    }

    #[test]
    fn test_from_views_checks_counts() {
        let cameras = [shifted_camera(0.0, 0.0), shifted_camera(-1.0, 0.0)];
        let points = [Point2::new(0.1, 0.2)];
        assert!(matches!(
            TriangulationProblem::from_views(&points, &cameras),
            Err(TriangulationError::InputShape(_))
        ));
    }

    #[test]
    fn test_two_view_recovery() {
        let truth = Point3::new(0.4, -0.3, 5.0);
        let problem = TriangulationProblem::new(vec![
            observe(shifted_camera(0.0, 0.0), &truth),
            observe(shifted_camera(-1.0, 0.2), &truth),
        ])
        .unwrap();

        let detailed = Triangulator::default().triangulate_detailed(&problem).unwrap();
        assert_relative_eq!(detailed.point, truth, epsilon = 1e-10);
        assert!(!detailed.is_flagged());
        assert_relative_eq!(detailed.homogeneous.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_homogeneous_output_defers_infinity_check() {
        // Identical image points through two translated cameras: parallel rays.
        let x = Point2::new(0.1, 0.2);
        let problem = TriangulationProblem::from_views(
            &[x, x],
            &[shifted_camera(0.0, 0.0), shifted_camera(-1.0, 0.5)],
        )
        .unwrap();
        let triangulator = Triangulator::default();

        let homogeneous = triangulator.triangulate_homogeneous(&problem).unwrap();
        assert!(homogeneous.point.w.abs() < 1e-12);
        let direction = homogeneous.point.xyz().normalize();
        let expected = nalgebra::Vector3::new(x.x, x.y, 1.0).normalize();
        assert_relative_eq!(direction.dot(&expected).abs(), 1.0, epsilon = 1e-12);

        assert!(matches!(
            triangulator.triangulate(&problem),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
    }

    #[test]
    fn test_reject_unstable_promotes_warning() {
        // Slightly inconsistent observations leave a small but nonzero
        // smallest singular value; a loose closeness threshold flags it.
        let truth = Point3::new(0.3, 0.1, 4.0);
        let mut moved = observe(shifted_camera(-1.0, 0.0), &truth);
        moved.point.x += 0.01;
        moved.point.y += 0.01;
        let problem =
            TriangulationProblem::new(vec![observe(shifted_camera(0.0, 0.0), &truth), moved])
                .unwrap();
        let loose = TriangulatorConfig::default().null_space_closeness(1e-6);

        let lenient = Triangulator::new(loose.clone()).unwrap();
        let detailed = lenient.triangulate_detailed(&problem).unwrap();
        assert!(matches!(
            detailed.warning,
            Some(TriangulationError::NumericalInstability { .. })
        ));
        assert!(detailed.warning.as_ref().is_some_and(TriangulationError::is_warning));

        let strict = Triangulator::new(loose.reject_unstable(true)).unwrap();
        assert!(matches!(
            strict.triangulate_homogeneous(&problem),
            Err(TriangulationError::NumericalInstability { .. })
        ));

        assert!(Triangulator::default()
            .triangulate_detailed(&problem)
            .unwrap()
            .warning
            .is_none());
    }

    #[test]
    fn test_shared_camera_center_is_degenerate() {
        // Both cameras share the optical center, so the DLT system loses rank.
        let truth = Point3::new(0.3, 0.1, 4.0);
        let rotated = ProjectionMatrix::new(
            *nalgebra::Rotation3::from_euler_angles(0.0, 0.2, 0.0).matrix()
                * Matrix3x4::identity(),
        );
        let problem = TriangulationProblem::new(vec![
            observe(shifted_camera(0.0, 0.0), &truth),
            observe(rotated, &truth),
        ])
        .unwrap();

        assert!(matches!(
            Triangulator::default().triangulate_homogeneous(&problem),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
    }

    #[test]
    fn test_point_on_baseline_is_degenerate() {
        // Centers (0, 0, 0) and (0, 0, 1); the target lies on the line through them.
        let mut forward = Matrix3x4::identity();
        forward[(2, 3)] = -1.0;
        let cameras = [
            ProjectionMatrix::new(Matrix3x4::identity()),
            ProjectionMatrix::new(forward),
        ];
        let truth = Point3::new(0.0, 0.0, 5.0);
        let problem =
            TriangulationProblem::new(cameras.iter().map(|&c| observe(c, &truth)).collect())
                .unwrap();

        for backend in [BackendKind::Svd, BackendKind::SymmetricEigen] {
            let triangulator =
                Triangulator::new(TriangulatorConfig::default().backend(backend)).unwrap();
            assert!(matches!(
                triangulator.triangulate_detailed(&problem),
                Err(TriangulationError::DegenerateConfiguration(_))
            ));
        }

        let repeated = TriangulationProblem::new(vec![
            observe(cameras[0], &truth),
            observe(cameras[0], &truth),
        ])
        .unwrap();
        assert!(matches!(
            triangulate(&repeated),
            Err(TriangulationError::DegenerateConfiguration(_))
        ));
    }

    #[test]
    fn test_symmetric_eigen_backend_recovers_point() {
        let truth = Point3::new(-0.2, 0.5, 3.0);
        let problem = TriangulationProblem::new(vec![
            observe(shifted_camera(0.0, 0.0), &truth),
            observe(shifted_camera(-0.8, 0.0), &truth),
            observe(shifted_camera(0.3, -0.6), &truth),
        ])
        .unwrap();

        let triangulator =
            Triangulator::new(TriangulatorConfig::default().backend(BackendKind::SymmetricEigen))
                .unwrap();
        let point = triangulator.triangulate(&problem).unwrap();
        assert_relative_eq!(point, truth, epsilon = 1e-6);
    }

    #[test]
    fn test_config_validation() {
        assert!(TriangulatorConfig::default().validate().is_ok());
        assert!(TriangulatorConfig::default()
            .null_space_closeness(1.5)
            .validate()
            .is_err());
        assert!(TriangulatorConfig::default()
            .infinity_epsilon(f64::NAN)
            .validate()
            .is_err());
        assert!(matches!(
            Triangulator::new(TriangulatorConfig::default().null_space_closeness(0.0)),
            Err(TriangulationError::Config(_))
        ));
    }

    #[test]
    fn test_config_yaml_round_trip_and_defaults() {
        let path = std::env::temp_dir().join(format!(
            "sfm_triangulation_config_{}.yaml",
            std::process::id()
        ));
        let path = path.to_str().unwrap();

        let config = TriangulatorConfig::default()
            .backend(BackendKind::SymmetricEigen)
            .reject_unstable(true)
            .parallel(false);
        config.save_to_yaml(path).unwrap();
        assert_eq!(TriangulatorConfig::load_from_yaml(path).unwrap(), config);

        fs::write(path, "backend: svd\nreject_unstable: true\n").unwrap();
        let partial = TriangulatorConfig::load_from_yaml(path).unwrap();
        assert!(partial.reject_unstable);
        assert_eq!(partial.infinity_epsilon, geometry::DEFAULT_INFINITY_EPSILON);
        assert_eq!(partial.null_space_closeness, DEFAULT_NULL_SPACE_CLOSENESS);
    }
}
