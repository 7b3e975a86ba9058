use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading station data, training, or writing reports.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("CSV error on '{}': {source}", .path.display())]
    CsvFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{0}' is not numeric")]
    NonNumericColumn(String),

    #[error("target column '{column}' is missing a value at row {row}")]
    MissingTarget { column: String, row: usize },

    #[error("split leaves an empty partition ({train} train rows, {test} test rows)")]
    EmptyPartition { train: usize, test: usize },

    #[error("no epoch out of {epochs} produced a finite test loss")]
    NoFiniteLoss { epochs: usize },

    #[error("cutter has not been fitted for column '{0}'")]
    NotFitted(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl FlowError {
    /// Wraps an `std::io::Error` with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
