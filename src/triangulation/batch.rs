//! Batch triangulation of many independent points.
//!
//! A [`TriangulationBatch`] holds one track of observations per target point.
//! Tracks may come from a shared camera set with sparse visibility, or carry
//! their own cameras. Every track is solved on its own: a failure is recorded
//! at that track's index in the [`BatchReport`] and never touches the others.
//! With the `rayon` feature the tracks are mapped in parallel.

use crate::camera::{Observation, ProjectionMatrix};
use crate::error::TriangulationError;
use crate::triangulation::{TriangulatedPoint, TriangulationProblem, Triangulator};
use log::{info, warn};
use nalgebra::{Matrix2xX, Matrix3xX, Point2, Point3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Observation tracks, one per target point, in output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangulationBatch {
    tracks: Vec<Vec<Observation>>,
}

impl TriangulationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_problems(problems: Vec<TriangulationProblem>) -> Self {
        Self {
            tracks: problems
                .into_iter()
                .map(|p| p.observations().to_vec())
                .collect(),
        }
    }

    /// Adds a track. Tracks shorter than two observations are accepted here
    /// and reported as failures when the batch is solved.
    pub fn push_track(&mut self, observations: Vec<Observation>) {
        self.tracks.push(observations);
    }

    /// Builds tracks from cameras shared by every point.
    ///
    /// `views[k][i]` is the measurement of point `i` in camera `k`, or `None`
    /// if camera `k` does not see it.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::InputShape`] if `views` and `cameras` differ in
    /// length or the views disagree on the number of points.
    pub fn from_shared_cameras(
        cameras: &[ProjectionMatrix],
        views: &[Vec<Option<Point2<f64>>>],
    ) -> Result<Self, TriangulationError> {
        if cameras.len() != views.len() {
            return Err(TriangulationError::InputShape(format!(
                "mismatched number of cameras ({}) and views ({})",
                cameras.len(),
                views.len()
            )));
        }
        let num_points = views.first().map_or(0, Vec::len);
        if let Some((k, view)) = views
            .iter()
            .enumerate()
            .find(|(_, view)| view.len() != num_points)
        {
            return Err(TriangulationError::InputShape(format!(
                "view {k} has {} points, view 0 has {num_points}",
                view.len()
            )));
        }

        let tracks = (0..num_points)
            .map(|i| {
                cameras
                    .iter()
                    .zip(views)
                    .filter_map(|(camera, view)| {
                        view[i].map(|point| Observation::new(point, *camera))
                    })
                    .collect()
            })
            .collect();

        Ok(Self { tracks })
    }

    /// Builds tracks from shared cameras where every camera sees every point.
    ///
    /// `views[k]` holds one column per point for camera `k`.
    pub fn from_dense_views(
        cameras: &[ProjectionMatrix],
        views: &[Matrix2xX<f64>],
    ) -> Result<Self, TriangulationError> {
        let sparse: Vec<Vec<Option<Point2<f64>>>> = views
            .iter()
            .map(|view| {
                view.column_iter()
                    .map(|c| Some(Point2::new(c[0], c[1])))
                    .collect()
            })
            .collect();
        Self::from_shared_cameras(cameras, &sparse)
    }

    pub fn tracks(&self) -> &[Vec<Observation>] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Per-point outcome of a batch, indexed like the batch's tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub results: Vec<Result<TriangulatedPoint, TriangulationError>>,
}

/// Counts over a [`BatchReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded, but with an ambiguous null space.
    pub flagged: usize,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Successfully triangulated points with their indices.
    pub fn points(&self) -> impl Iterator<Item = (usize, &Point3<f64>)> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().ok().map(|t| (i, &t.point)))
    }

    /// Failed points with their indices.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &TriangulationError)> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
    }

    /// Indices of points solved with an ambiguous null space.
    pub fn flagged(&self) -> impl Iterator<Item = usize> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.as_ref().is_ok_and(TriangulatedPoint::is_flagged))
            .map(|(i, _)| i)
    }

    pub fn summary(&self) -> BatchSummary {
        let failed = self.failures().count();
        BatchSummary {
            total: self.results.len(),
            succeeded: self.results.len() - failed,
            failed,
            flagged: self.flagged().count(),
        }
    }

    /// Collects every point as a column of a `3 × M` matrix.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::PointFailed`] wrapping the first failure.
    pub fn into_points_matrix(self) -> Result<Matrix3xX<f64>, TriangulationError> {
        let mut points = Matrix3xX::zeros(self.results.len());
        for (index, result) in self.results.into_iter().enumerate() {
            let triangulated = result.map_err(|source| TriangulationError::PointFailed {
                index,
                source: Box::new(source),
            })?;
            points.set_column(index, &triangulated.point.coords);
        }
        Ok(points)
    }
}

impl Triangulator {
    /// Triangulates every track of `batch` independently.
    pub fn triangulate_batch(&self, batch: &TriangulationBatch) -> BatchReport {
        let results = self.map_tracks(batch.tracks());
        let report = BatchReport { results };

        for (index, err) in report.failures() {
            warn!("Point {index} not triangulated: {err}");
        }
        let summary = report.summary();
        info!(
            "Triangulated {}/{} points ({} failed, {} flagged)",
            summary.succeeded, summary.total, summary.failed, summary.flagged
        );

        report
    }

    #[cfg(feature = "rayon")]
    fn map_tracks(
        &self,
        tracks: &[Vec<Observation>],
    ) -> Vec<Result<TriangulatedPoint, TriangulationError>> {
        if self.config().parallel {
            tracks
                .par_iter()
                .map(|track| self.triangulate_observations(track))
                .collect()
        } else {
            tracks
                .iter()
                .map(|track| self.triangulate_observations(track))
                .collect()
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn map_tracks(
        &self,
        tracks: &[Vec<Observation>],
    ) -> Vec<Result<TriangulatedPoint, TriangulationError>> {
        if self.config().parallel {
            log::debug!("rayon feature disabled, running batch sequentially");
        }
        tracks
            .iter()
            .map(|track| self.triangulate_observations(track))
            .collect()
    }
}

/// Triangulates every point seen by all `cameras`.
///
/// `views[k]` holds the image points of camera `k`, one column per point.
/// Returns the points as columns of a `3 × M` matrix.
///
/// # Errors
///
/// * [`TriangulationError::InputShape`] for mismatched camera/view counts.
/// * [`TriangulationError::PointFailed`] for the first point that could not
///   be triangulated. Use [`Triangulator::triangulate_batch`] to keep the
///   successful points of a partially failing batch.
pub fn triangulate_points(
    cameras: &[ProjectionMatrix],
    views: &[Matrix2xX<f64>],
) -> Result<Matrix3xX<f64>, TriangulationError> {
    let batch = TriangulationBatch::from_dense_views(cameras, views)?;
    Triangulator::default()
        .triangulate_batch(&batch)
        .into_points_matrix()
}
