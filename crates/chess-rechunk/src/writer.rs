//! Tiled Zarr V3 writer.
//!
//! Persists one assembled tile array as one output unit under the
//! output root. The unit's path is derived from the plan key alone, so
//! re-running a plan lands on the same path; a stale partial unit at
//! that path is replaced wholesale.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::error::{RechunkError, Result};
use crate::reassemble::AssembledTileArray;

/// Writes assembled tile arrays as `[variables, days, cells]` Zarr units.
#[derive(Debug, Clone)]
pub struct TiledWriter {
    output_root: PathBuf,
}

impl TiledWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Filesystem path of the unit identified by a plan key.
    pub fn output_path(&self, key: &str) -> PathBuf {
        self.output_root.join(key)
    }

    /// Persist one assembled tile array, returning the unit's path.
    ///
    /// The write is not atomic; completion is recorded separately in the
    /// progress ledger once this returns. Anything already at the target
    /// path is an abandoned partial from an earlier run and is removed.
    pub fn write(&self, key: &str, array: &AssembledTileArray) -> Result<PathBuf> {
        let path = self.output_path(key);
        if path.exists() {
            warn!(path = %path.display(), "Replacing stale partial output unit");
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;

        let store = FilesystemStore::new(&path)
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;

        let (n_vars, n_days, n_cells) = array.shape();
        let shape = vec![n_vars as u64, n_days, n_cells as u64];

        // One chunk per variable: a consumer pulling a single variable's
        // full series touches exactly one chunk.
        let chunk_grid: zarrs::array::ChunkGrid = vec![1, n_days, n_cells as u64]
            .try_into()
            .map_err(|e| RechunkError::storage_error(format!("{e:?}")))?;

        let mut binding = ArrayBuilder::new(
            shape.clone(),
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let builder = binding.attributes(self.build_attributes(array));

        let zarr = builder
            .build(Arc::new(store), "/")
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;

        zarr.store_metadata()
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], shape)
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;
        zarr.store_array_subset_elements(&subset, &array.data)
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;

        debug!(
            path = %path.display(),
            variables = n_vars,
            days = n_days,
            cells = n_cells,
            "Wrote tile unit"
        );

        Ok(path)
    }

    /// Attributes carried by every unit, enough to interpret the array
    /// without consulting the source archive.
    fn build_attributes(&self, array: &AssembledTileArray) -> serde_json::Map<String, serde_json::Value> {
        let cell_cols: Vec<u32> = array.cells.iter().map(|c| c.col).collect();
        let cell_rows: Vec<u32> = array.cells.iter().map(|c| c.row).collect();

        let mut attrs = serde_json::Map::new();
        attrs.insert("scenario".to_string(), serde_json::json!(array.scenario));
        attrs.insert("ensemble".to_string(), serde_json::json!(array.ensemble));
        attrs.insert(
            "resolution".to_string(),
            serde_json::json!(array.resolution.as_str()),
        );
        attrs.insert("tile_row".to_string(), serde_json::json!(array.tile.row));
        attrs.insert("tile_col".to_string(), serde_json::json!(array.tile.col));
        attrs.insert("variables".to_string(), serde_json::json!(array.variables));
        attrs.insert(
            "start_date".to_string(),
            serde_json::json!(array.range.start.to_string()),
        );
        attrs.insert(
            "end_date".to_string(),
            serde_json::json!(array.range.end.to_string()),
        );
        attrs.insert("cell_cols".to_string(), serde_json::json!(cell_cols));
        attrs.insert("cell_rows".to_string(), serde_json::json!(cell_rows));
        attrs.insert(
            "created_at".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        attrs
    }
}

/// Open an existing unit for verification or downstream reads.
pub fn open_unit(path: &Path) -> Result<zarrs::array::Array<FilesystemStore>> {
    let store = FilesystemStore::new(path)
        .map_err(|e| RechunkError::open_failed(e.to_string()))?;
    zarrs::array::Array::open(Arc::new(store), "/")
        .map_err(|e| RechunkError::open_failed(e.to_string()))
}
