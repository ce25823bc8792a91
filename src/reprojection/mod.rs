//! Reprojection checks for triangulated points.
//!
//! A triangulated point is projected back through every camera that observed
//! it and compared with the measured image point. The per-view residuals are
//! the main validation tool of the crate and the natural input of an outlier
//! filter.

use crate::camera::Observation;
use crate::error::TriangulationError;
use crate::geometry;
use crate::triangulation::{BatchReport, TriangulationBatch};
use nalgebra::{Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reprojection of one point into one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewResidual {
    /// Position of the view in the originating observation list.
    pub view: usize,
    pub observed: Point2<f64>,
    pub projected: Point2<f64>,
    /// Euclidean distance between `projected` and `observed`.
    pub l2: f64,
    /// Largest coordinate difference between `projected` and `observed`.
    pub l_infinity: f64,
}

impl ViewResidual {
    pub fn residual(&self) -> Vector2<f64> {
        self.projected - self.observed
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ReprojectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reprojection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

impl ReprojectionStats {
    /// Summarizes a set of per-view errors.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] if `errors` is empty.
    pub fn from_errors(errors: &[f64]) -> Result<Self, TriangulationError> {
        if errors.is_empty() {
            return Err(TriangulationError::InputShape(
                "no reprojection errors to summarize".to_string(),
            ));
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;

        let variance = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        let rmse = (errors.iter().map(|x| x.powi(2)).sum::<f64>() / n).sqrt();

        let min = errors.iter().copied().fold(f64::INFINITY, f64::min);
        let max = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = errors.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Ok(ReprojectionStats {
            rmse,
            min,
            max,
            mean,
            stddev,
            median,
        })
    }
}

/// Per-view residuals of one point plus their L2 statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionReport {
    pub residuals: Vec<ViewResidual>,
    pub stats: ReprojectionStats,
}

impl ReprojectionReport {
    /// Largest L2 residual over all views.
    pub fn max_error(&self) -> f64 {
        self.stats.max
    }

    /// Largest L-infinity residual over all views.
    pub fn max_l_infinity(&self) -> f64 {
        self.residuals
            .iter()
            .map(|r| r.l_infinity)
            .fold(0.0, f64::max)
    }

    /// Whether every view reprojects within `tolerance` (L2).
    pub fn within(&self, tolerance: f64) -> bool {
        self.residuals.iter().all(|r| r.l2 <= tolerance)
    }
}

/// Projects `point` through each observation's camera and measures the
/// distance to the observed image point, in observation order.
///
/// # Errors
///
/// [`TriangulationError::DegenerateConfiguration`] if the point projects to
/// infinity in some view.
pub fn reprojection_residuals(
    point: &Point3<f64>,
    observations: &[Observation],
) -> Result<Vec<ViewResidual>, TriangulationError> {
    observations
        .iter()
        .enumerate()
        .map(|(view, observation)| {
            let projected = geometry::project(&observation.projection, point)?;
            Ok(ViewResidual {
                view,
                observed: observation.point,
                projected,
                l2: (projected - observation.point).norm(),
                l_infinity: geometry::distance_l_infinity_2d(&projected, &observation.point),
            })
        })
        .collect()
}

/// Residuals and statistics of one point.
///
/// # Errors
///
/// * Errors of [`reprojection_residuals`].
/// * [`TriangulationError::InputShape`] if `observations` is empty.
pub fn validate(
    point: &Point3<f64>,
    observations: &[Observation],
) -> Result<ReprojectionReport, TriangulationError> {
    let residuals = reprojection_residuals(point, observations)?;
    let errors: Vec<f64> = residuals.iter().map(|r| r.l2).collect();
    let stats = ReprojectionStats::from_errors(&errors)?;
    Ok(ReprojectionReport { residuals, stats })
}

/// L2 statistics over every view of every successfully triangulated point.
///
/// Points whose reprojection degenerates are skipped.
///
/// # Errors
///
/// * [`TriangulationError::InputShape`] if `report` and `batch` differ in
///   length, or nothing could be reprojected.
pub fn batch_stats(
    report: &BatchReport,
    batch: &TriangulationBatch,
) -> Result<ReprojectionStats, TriangulationError> {
    if report.len() != batch.len() {
        return Err(TriangulationError::InputShape(format!(
            "report has {} points, batch has {}",
            report.len(),
            batch.len()
        )));
    }

    let errors: Vec<f64> = report
        .points()
        .filter_map(|(i, point)| reprojection_residuals(point, &batch.tracks()[i]).ok())
        .flatten()
        .map(|r| r.l2)
        .collect();

    ReprojectionStats::from_errors(&errors)
}
