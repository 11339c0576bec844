//! Alignment planner.
//!
//! Resolves a rechunk request against the manifest: verifies that every
//! month in the requested range is covered for every requested variable,
//! then fans out one plan per tile of the reference grid. Continuity is
//! required up front because the reassembler concatenates strictly in
//! time order with no interpolation.

use std::sync::Arc;

use chess_common::{cells_of, tile_bounds, tiles_over, Cell, DateRange, GridExtent, Resolution, TileId};
use chess_manifest::{Manifest, SourceSegment};

use crate::error::{RechunkError, Result};
use crate::reader::TileWindow;

/// One rechunk request: a (scenario, ensemble) pair, the variables to
/// stack, the day range, and the tiling resolution. Resolution is an
/// explicit input, never inferred.
#[derive(Debug, Clone)]
pub struct RechunkRequest {
    pub scenario: String,
    pub ensemble: String,
    /// Variable order is significant: it fixes the output variable axis.
    pub variables: Vec<String>,
    pub range: DateRange,
    pub resolution: Resolution,
}

impl RechunkRequest {
    /// Peak bytes one tile plan of this request can hold in memory:
    /// full-tile cell count x requested days x variables x f32.
    pub fn per_plan_bytes(&self) -> u64 {
        let edge = self.resolution.edge_cells() as u64;
        edge * edge * self.range.days() * self.variables.len() as u64 * 4
    }
}

/// The shared, per-request part of a plan: the resolved segment
/// sequences and geometry, referenced by every tile plan of the request.
#[derive(Debug)]
pub struct PlanSpec {
    pub scenario: String,
    pub ensemble: String,
    pub variables: Vec<String>,
    pub range: DateRange,
    pub resolution: Resolution,
    pub extent: GridExtent,
    /// Chronological segment list per variable, parallel to `variables`.
    pub segments: Vec<Vec<SourceSegment>>,
}

/// The unit of rechunking work: one tile of one request.
#[derive(Debug, Clone)]
pub struct TilePlan {
    pub spec: Arc<PlanSpec>,
    pub tile: TileId,
}

impl TilePlan {
    /// Deterministic identity of this plan; doubles as the output unit's
    /// path relative to the output root and as the ledger key.
    pub fn key(&self) -> String {
        format!(
            "{}_{}/{}/tile_{:03}_{:03}_{}.zarr",
            self.spec.scenario,
            self.spec.ensemble,
            self.spec.resolution,
            self.tile.row,
            self.tile.col,
            self.spec.range,
        )
    }

    /// The cells owned by this plan's tile, in output order.
    pub fn cells(&self) -> Vec<Cell> {
        cells_of(self.tile, self.spec.resolution, self.spec.extent)
    }

    /// The spatial sub-window read from every source segment.
    pub fn window(&self) -> Option<TileWindow> {
        tile_bounds(self.tile, self.spec.resolution, self.spec.extent)
            .map(|(rows, cols)| TileWindow { rows, cols })
    }
}

/// Resolve a request into tile plans.
///
/// Fails without any I/O if a requested variable is absent or any month
/// in the range is missing, naming the gap. Start/end dates that fall
/// mid-month still require the whole containing month's segment; the
/// reassembler trims to the exact day range after loading.
pub fn plan_request(
    manifest: &Manifest,
    request: &RechunkRequest,
    extent: GridExtent,
) -> Result<Vec<TilePlan>> {
    let months = request.range.months();
    let mut segments = Vec::with_capacity(request.variables.len());

    for variable in &request.variables {
        let series = manifest
            .series(&request.scenario, &request.ensemble, variable)
            .ok_or_else(|| RechunkError::MissingVariable {
                scenario: request.scenario.clone(),
                ensemble: request.ensemble.clone(),
                variable: variable.clone(),
            })?;

        let mut ordered = Vec::with_capacity(months.len());
        for month in &months {
            let segment =
                series
                    .segment_for(*month)
                    .ok_or_else(|| RechunkError::MissingMonth {
                        scenario: request.scenario.clone(),
                        ensemble: request.ensemble.clone(),
                        variable: variable.clone(),
                        month: *month,
                    })?;
            ordered.push(segment.clone());
        }
        segments.push(ordered);
    }

    let spec = Arc::new(PlanSpec {
        scenario: request.scenario.clone(),
        ensemble: request.ensemble.clone(),
        variables: request.variables.clone(),
        range: request.range,
        resolution: request.resolution,
        extent,
        segments,
    });

    Ok(tiles_over(extent, request.resolution)
        .into_iter()
        .map(|tile| TilePlan {
            spec: spec.clone(),
            tile,
        })
        .collect())
}
