//! Writing batch results to disk.
//!
//! Points go to CSV (one row per batch index, failures included) and the full
//! report, summary and per-point diagnostics, goes to JSON.

use crate::error::TriangulationError;
use crate::triangulation::{BatchReport, BatchSummary};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One row of an exported batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub index: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Smallest singular value of the DLT system.
    pub sigma_min: Option<f64>,
    pub flagged: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub summary: BatchSummary,
    pub points: Vec<PointRecord>,
}

impl From<&BatchReport> for ReportRecord {
    fn from(report: &BatchReport) -> Self {
        let points = report
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(t) => PointRecord {
                    index,
                    x: Some(t.point.x),
                    y: Some(t.point.y),
                    z: Some(t.point.z),
                    sigma_min: t.singular_values.last().copied(),
                    flagged: t.is_flagged(),
                    error: t.warning.as_ref().map(ToString::to_string),
                },
                Err(e) => PointRecord {
                    index,
                    x: None,
                    y: None,
                    z: None,
                    sigma_min: None,
                    flagged: false,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        ReportRecord {
            summary: report.summary(),
            points,
        }
    }
}

/// Writes one CSV row per result with header
/// `index,x,y,z,sigma_min,flagged,error`. Failed points leave the coordinate
/// columns empty.
pub fn write_points_csv<P: AsRef<Path>>(
    report: &BatchReport,
    path: P,
) -> Result<(), TriangulationError> {
    let record = ReportRecord::from(report);
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for point in &record.points {
        writer.serialize(point)?;
    }
    writer.flush()?;

    info!(
        "Exported {} points to {}",
        record.points.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads back a file written by [`write_points_csv`].
pub fn read_points_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PointRecord>, TriangulationError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

pub fn write_report_json<P: AsRef<Path>>(
    report: &BatchReport,
    path: P,
) -> Result<(), TriangulationError> {
    let json = serde_json::to_string_pretty(&ReportRecord::from(report))?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json.as_bytes())?;

    info!("Exported batch report to {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Observation, ProjectionMatrix};
    use crate::geometry;
    use crate::triangulation::{TriangulationBatch, Triangulator};
    use nalgebra::{Matrix3x4, Point3};

    fn report() -> BatchReport {
        let mut shifted = Matrix3x4::identity();
        shifted[(0, 3)] = -1.0;
        let cameras = [
            ProjectionMatrix::new(Matrix3x4::identity()),
            ProjectionMatrix::new(shifted),
        ];
        let truth = Point3::new(0.5, 0.25, 4.0);

        let mut batch = TriangulationBatch::new();
        batch.push_track(
            cameras
                .iter()
                .map(|c| Observation::new(geometry::project(c, &truth).unwrap(), *c))
                .collect(),
        );
        batch.push_track(vec![Observation::new(
            geometry::project(&cameras[0], &truth).unwrap(),
            cameras[0],
        )]);
        Triangulator::default().triangulate_batch(&batch)
    }

    #[test]
    fn test_csv_keeps_failed_rows() {
        let path = std::env::temp_dir().join(format!(
            "sfm_triangulation_points_{}.csv",
            std::process::id()
        ));
        write_points_csv(&report(), &path).unwrap();

        let records = read_points_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].z.unwrap() - 4.0).abs() < 1e-9);
        assert!(records[0].error.is_none());
        assert_eq!(records[1].index, 1);
        assert!(records[1].x.is_none());
        assert!(records[1].error.is_some());
    }

    #[test]
    fn test_json_report() {
        let path = std::env::temp_dir().join(format!(
            "sfm_triangulation_report_{}.json",
            std::process::id()
        ));
        write_report_json(&report(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: ReportRecord = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.summary.total, 2);
        assert_eq!(parsed.summary.failed, 1);
        assert_eq!(parsed.points.len(), 2);
    }
}
