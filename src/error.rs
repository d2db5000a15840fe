//! Error types for the tec-forecast library.

use thiserror::Error;

/// Result type alias for forecasting and pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while loading, shaping, forecasting or rendering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two shapes that must agree do not.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    /// A series does not cover the same timestamps as the index it is joined on.
    #[error("index mismatch for column '{column}': {reason}")]
    IndexMismatch { column: String, reason: String },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Frequency string could not be parsed.
    #[error("invalid frequency '{0}'")]
    FrequencyParse(String),

    /// Named column is absent from a table.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// Missing values detected when not allowed.
    #[error("missing values detected in {0}")]
    MissingValues(String),

    /// Benchmark dataset name not in the repository.
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(String),

    /// Spreadsheet workbook could not be read.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// CSV reader or writer error.
    #[error("csv error: {0}")]
    Csv(String),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(String),

    /// A cell could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Dataset download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Chart rendering failed.
    #[error("plot error: {0}")]
    Plot(String),

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl ForecastError {
    /// Shorthand for [`ForecastError::ShapeMismatch`].
    pub fn shape(context: impl Into<String>, expected: usize, got: usize) -> Self {
        ForecastError::ShapeMismatch {
            context: context.into(),
            expected,
            got,
        }
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Csv(err.to_string())
    }
}

impl From<calamine::Error> for ForecastError {
    fn from(err: calamine::Error) -> Self {
        ForecastError::Spreadsheet(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        ForecastError::Download(err.to_string())
    }
}
