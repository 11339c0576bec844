//! Error types shared across the rechunker crates.

use thiserror::Error;

/// Errors from grid and calendar primitives.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Date range with end before start.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Unrecognised tiling resolution name.
    #[error("unknown tiling resolution: {0} (expected \"fine\" or \"coarse\")")]
    UnknownResolution(String),
}

/// Result type for common operations.
pub type CommonResult<T> = std::result::Result<T, CommonError>;
