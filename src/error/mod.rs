//! Error handling for the feature pipelines.
//!
//! Row-level data problems never reach this type: an unparseable timestamp,
//! an unmapped code or an unknown category degrade to a missing value inside
//! the pipeline. What ends up here are structural and configuration failures
//! that invalidate a whole run or request.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for feature engineering and scoring
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Error opening, reading or writing a file
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error building or converting Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error writing Parquet output
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting typed rows to or from record batches
    #[error("Row conversion error: {0}")]
    RowConversion(String),

    /// Error reading or writing JSON documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reading YAML configuration
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A column the domain declares as required is absent from the input
    #[error("Missing required column {column} in {domain} input")]
    MissingColumn { domain: &'static str, column: String },

    /// A fitted transform needed in transform-only mode was never persisted
    #[error("Missing fitted transform {key} (expected at {path})")]
    MissingTransform { key: String, path: PathBuf },

    /// Several fitted transforms are missing at startup
    #[error("Missing {} fitted transforms: {}", .0.len(), .0.join(", "))]
    MissingTransforms(Vec<String>),

    /// A (patient, metric) pair reached the reshape stage more than once
    #[error("Ambiguous pivot: patient {patient} has more than one {metric} observation")]
    AmbiguousPivot { patient: String, metric: String },

    /// A metric outside the expected column set reached the reshape stage
    #[error("Unexpected metric {0} in reshape input")]
    UnexpectedMetric(String),

    /// Nothing to fit a transform on
    #[error("Cannot fit {key}: no usable values")]
    EmptyFit { key: String },

    /// A trained model file could not be interpreted
    #[error("Invalid model {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeatureError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error indicates broken configuration rather than bad data
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingTransform { .. }
                | Self::MissingTransforms(_)
                | Self::InvalidModel { .. }
                | Self::Config(_)
                | Self::Yaml(_)
        )
    }
}

/// Result type for feature pipeline operations
pub type Result<T> = std::result::Result<T, FeatureError>;
