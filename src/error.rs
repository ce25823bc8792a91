//! Error type shared by every stage of the triangulation pipeline.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TriangulationError {
    /// Caller contract violation: wrong matrix shape, too few views,
    /// mismatched point/camera counts.
    #[error("Invalid input shape: {0}")]
    InputShape(String),
    /// Point at infinity or ill-posed camera/point geometry.
    #[error("Degenerate configuration: {0}")]
    DegenerateConfiguration(String),
    /// The two smallest singular values are nearly tied, so the null space
    /// of the DLT system is not well determined.
    #[error(
        "Ambiguous null space: smallest singular values {smallest:e} and {second_smallest:e} (ratio {ratio})"
    )]
    NumericalInstability {
        smallest: f64,
        second_smallest: f64,
        ratio: f64,
    },
    /// A batch entry failed; carries the point index.
    #[error("Point {index}: {source}")]
    PointFailed {
        index: usize,
        #[source]
        source: Box<TriangulationError>,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("JSON error: {0}")]
    JsonError(String),
    #[error("CSV error: {0}")]
    CsvError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl TriangulationError {
    /// Whether the error only flags a less certain estimate rather than a failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, TriangulationError::NumericalInstability { .. })
    }
}

impl From<std::io::Error> for TriangulationError {
    fn from(err: std::io::Error) -> Self {
        TriangulationError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for TriangulationError {
    fn from(err: yaml_rust::ScanError) -> Self {
        TriangulationError::YamlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for TriangulationError {
    fn from(err: serde_yaml::Error) -> Self {
        TriangulationError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for TriangulationError {
    fn from(err: serde_json::Error) -> Self {
        TriangulationError::JsonError(err.to_string())
    }
}

impl From<csv::Error> for TriangulationError {
    fn from(err: csv::Error) -> Self {
        TriangulationError::CsvError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_instability_is_a_warning() {
        let unstable = TriangulationError::NumericalInstability {
            smallest: 1e-3,
            second_smallest: 1e-3,
            ratio: 1.0,
        };
        assert!(unstable.is_warning());
        assert!(!TriangulationError::InputShape("one view".to_string()).is_warning());
        assert!(!TriangulationError::DegenerateConfiguration("w = 0".to_string()).is_warning());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: TriangulationError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing rig").into();
        match err {
            TriangulationError::IOError(msg) => assert!(msg.contains("missing rig")),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
