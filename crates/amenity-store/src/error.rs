//! Error types for the amenity store.
//!
//! Write-side errors ([`InitError`], [`PersistenceError`]) propagate to the
//! caller. [`QueryError`] is produced by the read paths and recovered
//! locally into empty results by [`AmenityStore`](crate::AmenityStore).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing the output directory and database.
#[derive(Debug, Error)]
pub enum InitError {
    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The database could not be opened or its tables created.
    #[error("database initialization failed: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Errors raised while writing a detection to either store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// SQLite write failure.
    #[error("database write failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV encoding or decoding failure on the flat store.
    #[error("flat store CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure on the flat store.
    #[error("flat store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The existing flat store cannot be reconciled safely.
    #[error("corrupt flat store: {0}")]
    CorruptFlatStore(String),
}

/// Errors raised by the read paths.
#[derive(Debug, Error)]
pub enum QueryError {
    /// SQLite read failure.
    #[error("database read failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV decoding failure.
    #[error("flat store CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure.
    #[error("flat store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow table assembly failure.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The flat store content does not have the expected shape.
    #[error("malformed flat store: {0}")]
    Malformed(String),
}

/// Errors raised while loading an amenity schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("cannot read schema file: {0}")]
    Io(#[from] std::io::Error),

    /// The schema file is not valid JSON of the expected shape.
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The schema parsed but contains unusable names.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// Errors raised by a [`Detector`](crate::Detector).
#[derive(Debug, Error)]
pub enum DetectError {
    /// The detector has no output for this image.
    #[error("no detection available for {0}")]
    NotRecorded(String),

    /// Reading detector input failed.
    #[error("detector I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Detector output could not be decoded.
    #[error("detector output decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while running images through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Detection failed for the image.
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Persisting the detection failed.
    #[error(transparent)]
    Persist(#[from] PersistenceError),

    /// The input directory could not be listed.
    #[error("cannot list input directory {path}: {source}")]
    ListDir {
        /// Directory that was being listed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
