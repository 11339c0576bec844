//! National reference grid and fixed-size square tiling.
//!
//! The reference grid is the GB national 1km grid: integer cell
//! coordinates with column 0 at the western edge and row 0 at the
//! southern edge. Tiles partition the grid at one of two edge lengths;
//! cell-to-tile mapping is integer division and is a pure function of
//! the cell coordinate and the resolution.

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Tiling resolution: the tile edge length in 1km cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 10 x 10 cells per tile (10km squares).
    Fine,
    /// 100 x 100 cells per tile (100km squares).
    Coarse,
}

impl Resolution {
    /// Tile edge length in cells.
    pub fn edge_cells(&self) -> u32 {
        match self {
            Self::Fine => 10,
            Self::Coarse => 100,
        }
    }

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, CommonError> {
        match s.to_lowercase().as_str() {
            "fine" | "10km" => Ok(Self::Fine),
            "coarse" | "100km" => Ok(Self::Coarse),
            other => Err(CommonError::UnknownResolution(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fine => "fine",
            Self::Coarse => "coarse",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 1km cell of the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Column index (easting / 1km).
    pub col: u32,
    /// Row index (northing / 1km).
    pub row: u32,
}

impl Cell {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

/// A tile index at a given resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub row: u32,
    pub col: u32,
}

impl TileId {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile_{:03}_{:03}", self.row, self.col)
    }
}

/// Extent of the national grid in 1km cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridExtent {
    /// Number of columns (west to east).
    pub cols: u32,
    /// Number of rows (south to north).
    pub rows: u32,
}

impl GridExtent {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Check whether a cell lies inside the extent.
    pub fn contains(&self, cell: Cell) -> bool {
        cell.col < self.cols && cell.row < self.rows
    }

    /// Total cell count.
    pub fn cell_count(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }
}

impl Default for GridExtent {
    fn default() -> Self {
        // GB national grid: eastings 0-700km, northings 0-1300km at 1km.
        Self::new(700, 1300)
    }
}

/// Map a cell to its owning tile at the given resolution.
pub fn tile_of(cell: Cell, resolution: Resolution) -> TileId {
    let edge = resolution.edge_cells();
    TileId::new(cell.row / edge, cell.col / edge)
}

/// Row and column cell ranges owned by a tile, clipped to the extent.
///
/// Tiles on the grid boundary may own fewer cells than a full tile.
/// Returns `None` when the tile lies wholly outside the extent.
pub fn tile_bounds(
    tile: TileId,
    resolution: Resolution,
    extent: GridExtent,
) -> Option<(std::ops::Range<u32>, std::ops::Range<u32>)> {
    let edge = resolution.edge_cells();
    let row_start = tile.row * edge;
    let col_start = tile.col * edge;
    if row_start >= extent.rows || col_start >= extent.cols {
        return None;
    }
    let row_end = (row_start + edge).min(extent.rows);
    let col_end = (col_start + edge).min(extent.cols);
    Some((row_start..row_end, col_start..col_end))
}

/// Enumerate the cells owned by a tile in row-major order.
///
/// The ordering is fixed and reproducible between runs: downstream
/// consumers rely on positional stability of the cell axis.
pub fn cells_of(tile: TileId, resolution: Resolution, extent: GridExtent) -> Vec<Cell> {
    match tile_bounds(tile, resolution, extent) {
        Some((rows, cols)) => rows
            .flat_map(|row| cols.clone().map(move |col| Cell::new(col, row)))
            .collect(),
        None => Vec::new(),
    }
}

/// Every tile intersecting the extent, row-major.
pub fn tiles_over(extent: GridExtent, resolution: Resolution) -> Vec<TileId> {
    let edge = resolution.edge_cells();
    let tile_rows = (extent.rows + edge - 1) / edge;
    let tile_cols = (extent.cols + edge - 1) / edge;
    (0..tile_rows)
        .flat_map(|row| (0..tile_cols).map(move |col| TileId::new(row, col)))
        .collect()
}
