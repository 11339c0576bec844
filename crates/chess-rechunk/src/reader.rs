//! Windowed reads against source segments.
//!
//! The memory bound of the whole engine rests on this contract: a read
//! returns only the tile's spatial sub-window of a segment, never the
//! full national-grid extent. The trait keeps the reassembler
//! independent of the storage backend.

use std::ops::Range;
use std::sync::Arc;

use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use chess_common::days_in_month;
use chess_manifest::SourceSegment;

use crate::error::{RechunkError, Result};

/// The spatial sub-window of the national grid owned by one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileWindow {
    /// Row (northing) cell range.
    pub rows: Range<u32>,
    /// Column (easting) cell range.
    pub cols: Range<u32>,
}

impl TileWindow {
    pub fn n_rows(&self) -> u32 {
        self.rows.end - self.rows.start
    }

    pub fn n_cols(&self) -> u32 {
        self.cols.end - self.cols.start
    }

    /// Cells covered by the window.
    pub fn n_cells(&self) -> u64 {
        self.n_rows() as u64 * self.n_cols() as u64
    }
}

impl std::fmt::Display for TileWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows {}..{} cols {}..{}",
            self.rows.start, self.rows.end, self.cols.start, self.cols.end
        )
    }
}

/// One month of one variable over one tile window, day-major:
/// `data[day][row][col]` flattened, rows and columns in ascending order.
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    pub data: Vec<f32>,
    pub days: u64,
    pub rows: u32,
    pub cols: u32,
}

impl SegmentWindow {
    /// Cells per day slice.
    pub fn n_cells(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }
}

/// Windowed-read contract over source segments.
pub trait SegmentReader: Send + Sync {
    /// Read the tile window from a segment, verifying the segment's day
    /// axis against the calendar month it claims to cover.
    fn read_window(&self, segment: &SourceSegment, window: &TileWindow) -> Result<SegmentWindow>;
}

/// Reader over Zarr V3 source arrays of shape `[days, rows, cols]`.
#[derive(Debug, Default)]
pub struct ZarrSegmentReader;

impl ZarrSegmentReader {
    pub fn new() -> Self {
        Self
    }
}

impl SegmentReader for ZarrSegmentReader {
    fn read_window(&self, segment: &SourceSegment, window: &TileWindow) -> Result<SegmentWindow> {
        let store = FilesystemStore::new(&segment.path)
            .map_err(|e| RechunkError::open_failed(e.to_string()))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| RechunkError::open_failed(e.to_string()))?;

        let shape = array.shape();
        if shape.len() != 3 {
            return Err(RechunkError::invalid_metadata(format!(
                "segment {} has {} dimensions, expected [days, rows, cols]",
                segment.path.display(),
                shape.len()
            )));
        }

        let days = shape[0];
        let expected = days_in_month(segment.year, segment.month) as u64;
        if days != expected {
            return Err(RechunkError::ShortSegment {
                variable: segment.variable.clone(),
                month: segment.month_key(),
                expected,
                found: days,
            });
        }

        if window.rows.end as u64 > shape[1] || window.cols.end as u64 > shape[2] {
            return Err(RechunkError::WindowOutOfBounds {
                requested: window.to_string(),
                extent: format!("rows 0..{} cols 0..{}", shape[1], shape[2]),
            });
        }

        let subset = ArraySubset::new_with_start_shape(
            vec![0, window.rows.start as u64, window.cols.start as u64],
            vec![days, window.n_rows() as u64, window.n_cols() as u64],
        )
        .map_err(|e| RechunkError::read_failed(e.to_string()))?;

        let data: Vec<f32> = array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| RechunkError::read_failed(e.to_string()))?;

        Ok(SegmentWindow {
            data,
            days,
            rows: window.n_rows(),
            cols: window.n_cols(),
        })
    }
}
