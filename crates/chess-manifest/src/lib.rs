//! Source file discovery for the CHESS rechunker.
//!
//! Raw climate projection archives hold one file per (scenario, ensemble
//! member, variable, year, month). This crate parses that naming grammar
//! and builds the per-run manifest of available segments.

pub mod manifest;
pub mod segment;

pub use manifest::{Manifest, ScanAnomaly, VariableSeries};
pub use segment::{parse_segment_name, SegmentNameError, SourceSegment};
