//! Errors surfaced by the `amenity` binary.

use std::path::PathBuf;

use amenity_store::{DetectError, InitError, PipelineError};

/// Top-level command failure.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A config or input file could not be read.
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config or input file is not valid JSON for its shape.
    #[error("failed to parse '{path}': {source}")]
    ParseFile {
        /// File that failed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The store could not be initialized.
    #[error(transparent)]
    Init(#[from] InitError),

    /// Loading recorded detections failed.
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Processing images failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Some ingested records could not be saved.
    #[error("{failed} of {total} records failed to save")]
    IngestIncomplete {
        /// Records that failed.
        failed: usize,
        /// Records in the input file.
        total: usize,
    },

    /// Rendering or writing output failed.
    #[error("output error: {0}")]
    Output(String),
}

impl From<arrow::error::ArrowError> for CliError {
    fn from(e: arrow::error::ArrowError) -> Self {
        Self::Output(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Output(e.to_string())
    }
}
