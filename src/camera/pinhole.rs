//! Calibrated pinhole cameras with a world-to-camera pose.
//!
//! This module provides [`PinholeCamera`], which composes the projection matrix
//! `P = K [R | t]` consumed by the triangulation pipeline, and [`CameraRig`],
//! an ordered set of such cameras loaded from a single YAML file. Lens
//! distortion is not modelled: observations are expected to be undistorted.

use crate::camera::{validation, Intrinsics, ProjectionMatrix};
use crate::error::TriangulationError;
use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use yaml_rust::{Yaml, YamlLoader};

/// A calibrated pinhole camera placed in the world.
///
/// `rotation` and `translation` map world coordinates into the camera frame:
/// `x_cam = R * x_world + t`.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Matrix3, Point3, Vector3};
/// use sfm_triangulation::camera::{Intrinsics, PinholeCamera};
///
/// let intrinsics = Intrinsics { fx: 500.0, fy: 500.0, cx: 320.0, cy: 240.0 };
/// let camera = PinholeCamera::new(intrinsics, Matrix3::identity(), Vector3::new(0.0, 0.0, 2.0)).unwrap();
///
/// let pixel = camera.project(&Point3::new(0.1, 0.2, 0.0)).unwrap();
/// assert!((pixel.x - 345.0).abs() < 1e-9);
/// assert!((pixel.y - 290.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// World-to-camera rotation `R`.
    pub rotation: Matrix3<f64>,
    /// World-to-camera translation `t`.
    pub translation: Vector3<f64>,
}

impl PinholeCamera {
    /// Creates a camera and validates its parameters.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::Config`] for non-positive focal lengths, a
    /// non-finite principal point, or a rotation that is not a proper rotation.
    pub fn new(
        intrinsics: Intrinsics,
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, TriangulationError> {
        let camera = PinholeCamera {
            intrinsics,
            rotation,
            translation,
        };
        camera.validate_params()?;
        Ok(camera)
    }

    /// Composes `P = K [R | t]`.
    pub fn projection_matrix(&self) -> ProjectionMatrix {
        let mut extrinsics = Matrix3x4::zeros();
        extrinsics.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        extrinsics
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.translation);
        ProjectionMatrix::new(self.intrinsics.matrix() * extrinsics)
    }

    /// Optical center in world coordinates, `-Rᵀ t`.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(-(self.rotation.transpose() * self.translation))
    }

    /// Projects a world point to pixel coordinates.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::DegenerateConfiguration`] if the point lies on
    /// the camera's principal plane.
    pub fn project(&self, point: &Point3<f64>) -> Result<Point2<f64>, TriangulationError> {
        crate::geometry::project(&self.projection_matrix(), point)
    }

    pub fn validate_params(&self) -> Result<(), TriangulationError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_rotation(&self.rotation)?;
        if !self.translation.iter().all(|v| v.is_finite()) {
            return Err(TriangulationError::Config(
                "Translation must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads a camera from a YAML file.
    ///
    /// The file holds a `cam0` entry with `intrinsics: [fx, fy, cx, cy]`,
    /// `rotation` (9 values, row-major) and `translation` (3 values).
    ///
    /// # Errors
    ///
    /// * [`TriangulationError::IOError`] if the file cannot be read.
    /// * [`TriangulationError::YamlError`] if the YAML is malformed or misses a field.
    /// * Errors from [`PinholeCamera::validate_params`].
    pub fn load_from_yaml(path: &str) -> Result<Self, TriangulationError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| TriangulationError::YamlError("Empty YAML document".to_string()))?;

        Self::from_yaml_node(&doc["cam0"])
    }

    /// Saves the camera in the layout read by [`PinholeCamera::load_from_yaml`].
    pub fn save_to_yaml(&self, path: &str) -> Result<(), TriangulationError> {
        let mut root = serde_yaml::Mapping::new();
        root.insert(
            serde_yaml::Value::String("cam0".to_string()),
            self.to_yaml_value()?,
        );

        let yaml_string = serde_yaml::to_string(&root)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }

    fn from_yaml_node(node: &Yaml) -> Result<Self, TriangulationError> {
        let intrinsics = read_floats(node, "intrinsics", 4)?;
        let rotation = read_floats(node, "rotation", 9)?;
        let translation = read_floats(node, "translation", 3)?;

        PinholeCamera::new(
            Intrinsics {
                fx: intrinsics[0],
                fy: intrinsics[1],
                cx: intrinsics[2],
                cy: intrinsics[3],
            },
            Matrix3::from_row_slice(&rotation),
            Vector3::from_column_slice(&translation),
        )
    }

    fn to_yaml_value(&self) -> Result<serde_yaml::Value, TriangulationError> {
        let rotation: Vec<f64> = self.rotation.transpose().iter().copied().collect();
        let mapping = serde_yaml::Mapping::from_iter([
            (
                serde_yaml::Value::String("camera_model".to_string()),
                serde_yaml::Value::String("pinhole".to_string()),
            ),
            (
                serde_yaml::Value::String("intrinsics".to_string()),
                serde_yaml::to_value(vec![
                    self.intrinsics.fx,
                    self.intrinsics.fy,
                    self.intrinsics.cx,
                    self.intrinsics.cy,
                ])?,
            ),
            (
                serde_yaml::Value::String("rotation".to_string()),
                serde_yaml::to_value(rotation)?,
            ),
            (
                serde_yaml::Value::String("translation".to_string()),
                serde_yaml::to_value(self.translation.iter().copied().collect::<Vec<f64>>())?,
            ),
        ]);
        Ok(serde_yaml::Value::Mapping(mapping))
    }
}

/// An ordered set of calibrated cameras observing the same scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraRig {
    pub cameras: Vec<PinholeCamera>,
}

impl CameraRig {
    pub fn new(cameras: Vec<PinholeCamera>) -> Self {
        Self { cameras }
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Projection matrices in rig order.
    pub fn projection_matrices(&self) -> Vec<ProjectionMatrix> {
        self.cameras
            .iter()
            .map(PinholeCamera::projection_matrix)
            .collect()
    }

    /// Loads a rig from a YAML file with a top-level `cameras` list, each
    /// entry laid out like the `cam0` block of [`PinholeCamera::load_from_yaml`].
    pub fn load_from_yaml(path: &str) -> Result<Self, TriangulationError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| TriangulationError::YamlError("Empty YAML document".to_string()))?;

        let entries = doc["cameras"].as_vec().ok_or_else(|| {
            TriangulationError::YamlError("YAML missing 'cameras' or not an array".to_string())
        })?;

        let cameras = entries
            .iter()
            .map(PinholeCamera::from_yaml_node)
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("Loaded {} cameras from {}", cameras.len(), path);
        Ok(CameraRig { cameras })
    }

    pub fn save_to_yaml(&self, path: &str) -> Result<(), TriangulationError> {
        let cameras = self
            .cameras
            .iter()
            .map(PinholeCamera::to_yaml_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut root = serde_yaml::Mapping::new();
        root.insert(
            serde_yaml::Value::String("cameras".to_string()),
            serde_yaml::Value::Sequence(cameras),
        );

        let yaml_string = serde_yaml::to_string(&root)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }
}

fn read_floats(node: &Yaml, key: &str, len: usize) -> Result<Vec<f64>, TriangulationError> {
    let values = node[key].as_vec().ok_or_else(|| {
        TriangulationError::YamlError(format!("YAML missing '{key}' or not an array"))
    })?;
    if values.len() != len {
        return Err(TriangulationError::YamlError(format!(
            "'{key}' needs {len} values, got {}",
            values.len()
        )));
    }
    values
        .iter()
        .map(|v| {
            // yaml_rust reads `2` as an integer, so accept both
            v.as_f64()
                .or_else(|| v.as_i64().map(|i| i as f64))
                .ok_or_else(|| {
                    TriangulationError::YamlError(format!("Invalid '{key}': not a number"))
                })
        })
        .collect()
}
