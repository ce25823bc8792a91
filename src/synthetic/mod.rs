//! Deterministic synthetic scenes for exercising the triangulation pipeline.
//!
//! Every generator is seeded, so a given configuration always produces the
//! same cameras, points and image measurements.

use crate::camera::{Intrinsics, PinholeCamera, ProjectionMatrix};
use crate::error::TriangulationError;
use crate::triangulation::{TriangulationBatch, TriangulationProblem};
use log::debug;
use nalgebra::{Matrix2xX, Matrix3, Point2, Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Cameras, ground-truth points and their projections.
///
/// `observations[k][i]` is point `i` as measured by camera `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct NViewDataSet {
    pub cameras: Vec<PinholeCamera>,
    pub points: Vec<Point3<f64>>,
    pub observations: Vec<Vec<Point2<f64>>>,
}

/// Placement of the cameras built by [`n_realistic_cameras`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NViewDataSetConfig {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
    /// Radius of the circle the cameras sit on.
    pub distance: f64,
    /// Standard deviation of the random offset added to each camera center.
    pub jitter_amount: f64,
    pub seed: u64,
}

impl Default for NViewDataSetConfig {
    fn default() -> Self {
        Self {
            focal: 1000.0,
            cx: 500.0,
            cy: 500.0,
            distance: 1.5,
            jitter_amount: 0.01,
            seed: 42,
        }
    }
}

impl NViewDataSet {
    pub fn num_views(&self) -> usize {
        self.cameras.len()
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn projection_matrices(&self) -> Vec<ProjectionMatrix> {
        self.cameras
            .iter()
            .map(PinholeCamera::projection_matrix)
            .collect()
    }

    /// Image points of every view, one column per point.
    pub fn views(&self) -> Vec<Matrix2xX<f64>> {
        self.observations
            .iter()
            .map(|view| {
                let columns: Vec<_> = view.iter().map(|p| p.coords).collect();
                Matrix2xX::from_columns(columns.as_slice())
            })
            .collect()
    }

    /// All views of point `index`.
    pub fn problem(&self, index: usize) -> Result<TriangulationProblem, TriangulationError> {
        if index >= self.num_points() {
            return Err(TriangulationError::InputShape(format!(
                "point index {index} out of range for {} points",
                self.num_points()
            )));
        }
        let points: Vec<Point2<f64>> = self.observations.iter().map(|view| view[index]).collect();
        TriangulationProblem::from_views(&points, &self.projection_matrices())
    }

    /// One track per point, seen by every camera.
    pub fn batch(&self) -> Result<TriangulationBatch, TriangulationError> {
        TriangulationBatch::from_dense_views(&self.projection_matrices(), &self.views())
    }

    /// Perturbs every image measurement with zero-mean Gaussian noise.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::Config`] if `sigma` is negative or not finite.
    pub fn add_gaussian_noise(&mut self, sigma: f64, seed: u64) -> Result<(), TriangulationError> {
        let normal = normal_distribution("noise sigma", sigma)?;
        let mut rng = StdRng::seed_from_u64(seed);

        for point in self.observations.iter_mut().flatten() {
            point.x += normal.sample(&mut rng);
            point.y += normal.sample(&mut rng);
        }
        Ok(())
    }
}

/// Two cameras roughly 10 units from 30 points spread over `[-1, 1]³`.
pub fn two_realistic_cameras() -> Result<NViewDataSet, TriangulationError> {
    let intrinsics = Intrinsics {
        fx: 320.0,
        fy: 320.0,
        cx: 160.0,
        cy: 120.0,
    };
    let cameras = vec![
        PinholeCamera::new(
            intrinsics.clone(),
            *Rotation3::from_axis_angle(&Vector3::z_axis(), -0.1).matrix(),
            Vector3::new(1.0, 1.0, 10.0),
        )?,
        PinholeCamera::new(
            intrinsics,
            *Rotation3::from_axis_angle(&Vector3::x_axis(), -0.1).matrix(),
            Vector3::new(-2.0, -1.0, 10.0),
        )?,
    ];

    let mut rng = StdRng::seed_from_u64(0);
    let points: Vec<Point3<f64>> = (0..30)
        .map(|_| {
            Point3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            )
        })
        .collect();

    build(cameras, points)
}

/// `nviews` cameras evenly spaced on a circle around the origin, all looking
/// at it, observing `npoints` points inside a cube of half-width 0.5.
///
/// # Errors
///
/// [`TriangulationError::InputShape`] for fewer than two views.
pub fn n_realistic_cameras(
    nviews: usize,
    npoints: usize,
    config: &NViewDataSetConfig,
) -> Result<NViewDataSet, TriangulationError> {
    if nviews < 2 {
        return Err(TriangulationError::InputShape(format!(
            "a synthetic scene needs at least 2 views, got {nviews}"
        )));
    }

    let intrinsics = Intrinsics {
        fx: config.focal,
        fy: config.focal,
        cx: config.cx,
        cy: config.cy,
    };
    let jitter = normal_distribution("jitter amount", config.jitter_amount)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let cameras = (0..nviews)
        .map(|k| {
            let theta = 2.0 * PI * k as f64 / nviews as f64;
            let center = Vector3::new(
                config.distance * theta.cos() + jitter.sample(&mut rng),
                jitter.sample(&mut rng),
                config.distance * theta.sin() + jitter.sample(&mut rng),
            );
            let rotation = look_at(&(-center));
            PinholeCamera::new(intrinsics.clone(), rotation, -(rotation * center))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let points: Vec<Point3<f64>> = (0..npoints)
        .map(|_| {
            Point3::new(
                rng.gen_range(-0.5..=0.5),
                rng.gen_range(-0.5..=0.5),
                rng.gen_range(-0.5..=0.5),
            )
        })
        .collect();

    build(cameras, points)
}

/// Zero-mean Gaussian with standard deviation `std_dev`.
fn normal_distribution(name: &str, std_dev: f64) -> Result<Normal<f64>, TriangulationError> {
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(TriangulationError::Config(format!(
            "{name} must be finite and non-negative, got {std_dev}"
        )));
    }
    Normal::new(0.0, std_dev)
        .map_err(|e| TriangulationError::Config(format!("invalid {name} {std_dev}: {e}")))
}

/// World-to-camera rotation whose optical axis points along `direction`,
/// with the image y axis kept close to world Y.
fn look_at(direction: &Vector3<f64>) -> Matrix3<f64> {
    let zc = direction.normalize();
    let xc = Vector3::y().cross(&zc).normalize();
    let yc = zc.cross(&xc);
    Matrix3::from_rows(&[xc.transpose(), yc.transpose(), zc.transpose()])
}

fn build(
    cameras: Vec<PinholeCamera>,
    points: Vec<Point3<f64>>,
) -> Result<NViewDataSet, TriangulationError> {
    let observations = cameras
        .iter()
        .map(|camera| {
            points
                .iter()
                .map(|p| camera.project(p))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Synthetic scene with {} views and {} points",
        cameras.len(),
        points.len()
    );

    Ok(NViewDataSet {
        cameras,
        points,
        observations,
    })
}
