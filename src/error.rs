//! Error types for popcontrast

use thiserror::Error;

/// Main error type for contrast construction and the surrounding glue
#[derive(Error, Debug)]
pub enum ContrastError {
    #[error("Group '{group}' has no observations in column '{column}'")]
    EmptyGroup { group: String, column: String },

    #[error("Unknown group '{group}': not present in the fitted data")]
    UnknownGroup { group: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Collinear design: {reason}")]
    CollinearDesign { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("External engine failed: {reason}")]
    ExternalEngine { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for popcontrast operations
pub type Result<T> = std::result::Result<T, ContrastError>;
