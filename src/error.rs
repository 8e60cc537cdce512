//! Error types for the memsentinel crate

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SentinelError>;

/// All errors surfaced by the pipeline
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Dataset file is missing on disk
    #[error("dataset not found: {0}")]
    DatasetNotFound(PathBuf),

    /// Generic data handling error
    #[error("data error: {0}")]
    DataError(String),

    /// Preprocessing failure (encoding, scaling, splitting)
    #[error("preprocessing error: {0}")]
    PreprocessingError(String),

    /// Model training failure
    #[error("training error: {0}")]
    TrainingError(String),

    /// Predict/transform called on an unfitted estimator
    #[error("model is not fitted")]
    ModelNotFitted,

    /// A persisted model artifact is missing from the registry
    #[error("model artifact '{0}' not found; run training first")]
    ModelNotFound(String),

    /// A named column is absent from the input frame
    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    /// Dimension mismatch between inputs
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    /// Invalid configuration or argument value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Report building/rendering failure
    #[error("report error: {0}")]
    ReportError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
