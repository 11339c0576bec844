//! Rechunking engine for gridded daily climate projections.
//!
//! Source archives hold one monthly array per climate variable covering
//! the whole national 1km grid. This engine re-derives a space-major
//! layout: one output unit per grid tile holding a multi-variable daily
//! time series for the tile's cells, assembled with bounded memory and
//! resumable across interrupted runs.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod planner;
pub mod reader;
pub mod reassemble;
pub mod writer;

pub use config::EngineConfig;
pub use engine::{run, PlanFailure, RunSummary, LEDGER_FILENAME};
pub use error::{RechunkError, Result};
pub use ledger::ProgressLedger;
pub use planner::{plan_request, PlanSpec, RechunkRequest, TilePlan};
pub use reader::{SegmentReader, SegmentWindow, TileWindow, ZarrSegmentReader};
pub use reassemble::{assemble_tile, AssembledTileArray};
pub use writer::{open_unit, TiledWriter};
