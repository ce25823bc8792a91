//! SfM Triangulation Library
//!
//! Linear multi-view triangulation for structure-from-motion pipelines.
//! Given two or more calibrated projection matrices and the matching image
//! observations of a point, the library recovers the point's 3D position with
//! the Direct Linear Transform. It includes:
//! - Pinhole cameras and camera rigs loaded from YAML
//! - Single-point and batch triangulation with per-point failure reporting
//! - Interchangeable null-space backends (SVD and symmetric eigen)
//! - Reprojection residuals and statistics for validation
//! - Seeded synthetic scenes and CSV/JSON export of results
//!
//! Nonlinear refinement, pose estimation and lens distortion are left to the
//! surrounding pipeline.

pub mod camera;
pub mod error;
pub mod export;
pub mod geometry;
pub mod linalg;
pub mod reprojection;
pub mod synthetic;
pub mod triangulation;

// Re-export commonly used types
pub use camera::{CameraRig, Intrinsics, Observation, PinholeCamera, ProjectionMatrix};
pub use error::TriangulationError;
pub use linalg::{BackendKind, NullSpaceBackend, SvdBackend, SymmetricEigenBackend};
pub use reprojection::{ReprojectionReport, ReprojectionStats, ViewResidual};
pub use triangulation::{
    triangulate, triangulate_points, BatchReport, BatchSummary, TriangulatedPoint,
    TriangulationBatch, TriangulationProblem, Triangulator, TriangulatorConfig,
};
