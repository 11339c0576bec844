//! Error types for the rechunking engine.

use chess_common::MonthKey;
use thiserror::Error;

/// Errors that can occur while planning, assembling, or writing tiles.
#[derive(Error, Debug)]
pub enum RechunkError {
    /// No segments discovered for a requested variable.
    #[error("no segments for variable {variable} ({scenario}/{ensemble})")]
    MissingVariable {
        scenario: String,
        ensemble: String,
        variable: String,
    },

    /// A month inside the requested range has no segment.
    #[error("missing month {month} for variable {variable} ({scenario}/{ensemble})")]
    MissingMonth {
        scenario: String,
        ensemble: String,
        variable: String,
        month: MonthKey,
    },

    /// A source segment holds fewer (or more) days than its calendar month.
    #[error("segment {variable} {month} has {found} days, expected {expected}")]
    ShortSegment {
        variable: String,
        month: MonthKey,
        expected: u64,
        found: u64,
    },

    /// Failed to open a source array.
    #[error("failed to open segment: {0}")]
    OpenFailed(String),

    /// Failed to read a spatial window from a source array.
    #[error("failed to read segment window: {0}")]
    ReadFailed(String),

    /// The requested window falls outside the source array extent.
    #[error("window {requested} is outside segment extent {extent}")]
    WindowOutOfBounds { requested: String, extent: String },

    /// Malformed source array metadata.
    #[error("invalid segment metadata: {0}")]
    InvalidMetadata(String),

    /// Storage/IO error while persisting output or ledger state.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration rejected before the run started.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl RechunkError {
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<std::io::Error> for RechunkError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for RechunkError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, RechunkError>;
