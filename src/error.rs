//! Error types for the famsel library.

use thiserror::Error;

/// Main error type for the library.
///
/// Only structural errors (bad input shapes, unknown configuration) surface
/// as `Err` from the run entry points; per-feature and per-family fitting
/// failures are recorded as typed absence values instead.
#[derive(Error, Debug)]
pub enum FamselError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Formula parse error: {0}")]
    FormulaParse(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown distribution family '{0}'")]
    UnknownFamily(String),

    #[error("Coefficient '{name}' not present in the design matrix. Available: {available:?}")]
    UnknownCoefficient {
        name: String,
        available: Vec<String>,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, FamselError>;
