//! Streaming reassembler.
//!
//! Builds the dense per-tile array for one plan: monthly windows of each
//! variable are read in time order, concatenated along the day axis,
//! trimmed to the exact requested day range, and stacked along the
//! variable axis. Peak memory is O(tile cells x requested days x
//! variables), independent of the national grid size.

use tracing::debug;

use chess_common::{Cell, DateRange, Resolution, TileId};

use crate::error::{RechunkError, Result};
use crate::planner::TilePlan;
use crate::reader::SegmentReader;

/// The assembled result for one plan: a dense array indexed by
/// (variable, day, cell-within-tile). The day axis spans the full
/// requested range with no missing days; the cell axis enumerates the
/// tile's cells in `cells_of` order.
#[derive(Debug)]
pub struct AssembledTileArray {
    pub scenario: String,
    pub ensemble: String,
    pub resolution: Resolution,
    pub tile: TileId,
    pub range: DateRange,
    /// Variable axis order, as requested by the caller.
    pub variables: Vec<String>,
    /// Cell axis order, stable between runs.
    pub cells: Vec<Cell>,
    /// Dense values, variable-major then day-major.
    pub data: Vec<f32>,
}

impl AssembledTileArray {
    /// Day axis length.
    pub fn days(&self) -> u64 {
        self.range.days()
    }

    /// (variables, days, cells).
    pub fn shape(&self) -> (usize, u64, usize) {
        (self.variables.len(), self.days(), self.cells.len())
    }

    /// Value at (variable index, day index, cell index).
    pub fn value(&self, variable: usize, day: u64, cell: usize) -> Option<f32> {
        let (n_vars, n_days, n_cells) = self.shape();
        if variable >= n_vars || day >= n_days || cell >= n_cells {
            return None;
        }
        let idx = (variable as u64 * n_days + day) * n_cells as u64 + cell as u64;
        self.data.get(idx as usize).copied()
    }
}

/// Assemble the dense array for one tile plan.
///
/// Any failure (short segment, window mismatch, read error) aborts this
/// plan only; the caller logs it and moves on to the next plan.
pub fn assemble_tile(plan: &TilePlan, reader: &dyn SegmentReader) -> Result<AssembledTileArray> {
    let spec = &plan.spec;
    let window = plan.window().ok_or_else(|| {
        RechunkError::invalid_metadata(format!("tile {} lies outside the grid extent", plan.tile))
    })?;
    let cells = plan.cells();
    let n_cells = cells.len();

    let months = spec.range.months();
    let n_days = spec.range.days();

    // Day offset of the requested start within the first month.
    let lead_days = (spec.range.start - months[0].first_day()).num_days() as u64;

    let mut data = Vec::with_capacity(spec.variables.len() * n_days as usize * n_cells);

    for (var_idx, variable) in spec.variables.iter().enumerate() {
        // Concatenate the monthly windows for this variable in time order.
        let mut series: Vec<f32> = Vec::new();
        let mut days_read = 0u64;

        for segment in &spec.segments[var_idx] {
            let month_window = reader.read_window(segment, &window)?;

            if month_window.rows != window.n_rows() || month_window.cols != window.n_cols() {
                return Err(RechunkError::read_failed(format!(
                    "segment {} {} returned a {}x{} window, expected {}x{}",
                    variable,
                    segment.month_key(),
                    month_window.rows,
                    month_window.cols,
                    window.n_rows(),
                    window.n_cols(),
                )));
            }

            days_read += month_window.days;
            series.extend_from_slice(&month_window.data);
        }

        // Trim the concatenated series to the exact requested day range.
        let start = lead_days * n_cells as u64;
        let end = start + n_days * n_cells as u64;
        if (series.len() as u64) < end {
            return Err(RechunkError::read_failed(format!(
                "variable {variable} series holds {days_read} days, too short for the requested range"
            )));
        }
        data.extend_from_slice(&series[start as usize..end as usize]);

        debug!(
            variable = %variable,
            tile = %plan.tile,
            days = n_days,
            cells = n_cells,
            "Assembled variable series"
        );
    }

    Ok(AssembledTileArray {
        scenario: spec.scenario.clone(),
        ensemble: spec.ensemble.clone(),
        resolution: spec.resolution,
        tile: plan.tile,
        range: spec.range,
        variables: spec.variables.clone(),
        cells,
        data,
    })
}
