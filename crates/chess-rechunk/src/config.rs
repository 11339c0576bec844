//! Engine configuration.
//!
//! All configuration is an explicit value handed to the engine entry
//! point; nothing is read from ambient state. Misconfiguration is
//! rejected before any planning or I/O starts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use chess_common::GridExtent;

use crate::error::{RechunkError, Result};

/// Configuration for one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the raw monthly source segments.
    pub input_root: PathBuf,

    /// Directory receiving the tiled output units and the ledger.
    pub output_root: PathBuf,

    /// Maximum number of tile plans assembled concurrently.
    pub concurrency: usize,

    /// Memory budget for in-flight tile assemblies, in megabytes.
    /// Sizing rule: concurrency x per-plan peak must fit inside this.
    pub memory_budget_mb: usize,

    /// Extent of the national reference grid in 1km cells.
    pub extent: GridExtent,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("/data/ceda"),
            output_root: PathBuf::from("/data/tiles"),
            concurrency: 4,
            memory_budget_mb: 4096,
            extent: GridExtent::default(),
        }
    }
}

impl EngineConfig {
    /// Memory budget in bytes.
    pub fn memory_budget_bytes(&self) -> u64 {
        self.memory_budget_mb as u64 * 1024 * 1024
    }

    /// Validate against the largest per-plan memory bound of the run.
    pub fn validate(&self, max_plan_bytes: u64) -> Result<()> {
        if self.concurrency == 0 {
            return Err(RechunkError::config_error("concurrency must be > 0"));
        }
        if self.memory_budget_mb == 0 {
            return Err(RechunkError::config_error("memory_budget_mb must be > 0"));
        }
        if self.extent.cols == 0 || self.extent.rows == 0 {
            return Err(RechunkError::config_error("grid extent must be non-empty"));
        }

        let in_flight = self.concurrency as u64 * max_plan_bytes;
        if in_flight > self.memory_budget_bytes() {
            return Err(RechunkError::config_error(format!(
                "concurrency {} x per-plan peak {} bytes = {} bytes exceeds budget of {} MB",
                self.concurrency, max_plan_bytes, in_flight, self.memory_budget_mb
            )));
        }

        Ok(())
    }
}
