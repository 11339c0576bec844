//! Per-run manifest of available source segments.
//!
//! Built once at run start from a directory listing (no file content is
//! read) and read-only afterwards. Unparsable entry names are recorded
//! as anomalies and skipped; one malformed name never aborts the scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use chess_common::MonthKey;

use crate::segment::{SegmentNameError, SourceSegment};

/// Key for one discovered series: (scenario, ensemble, variable).
pub type SeriesKey = (String, String, String);

/// A directory entry that did not parse as a segment name.
#[derive(Debug, Clone)]
pub struct ScanAnomaly {
    pub path: PathBuf,
    pub error: SegmentNameError,
}

/// Chronologically sorted segments for one (scenario, ensemble, variable).
#[derive(Debug, Clone, Default)]
pub struct VariableSeries {
    segments: Vec<SourceSegment>,
}

impl VariableSeries {
    fn insert(&mut self, segment: SourceSegment) {
        match self
            .segments
            .binary_search_by_key(&segment.month_key(), |s| s.month_key())
        {
            // Duplicate month: keep the first discovered entry.
            Ok(_) => {}
            Err(pos) => self.segments.insert(pos, segment),
        }
    }

    /// The segment covering a given month, if present.
    pub fn segment_for(&self, month: MonthKey) -> Option<&SourceSegment> {
        self.segments
            .binary_search_by_key(&month, |s| s.month_key())
            .ok()
            .map(|idx| &self.segments[idx])
    }

    /// All segments in chronological order.
    pub fn segments(&self) -> &[SourceSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// The set of source segments discovered on disk for one run.
#[derive(Debug, Default)]
pub struct Manifest {
    series: HashMap<SeriesKey, VariableSeries>,
    anomalies: Vec<ScanAnomaly>,
}

impl Manifest {
    /// Scan a raw-file root directory and build the manifest.
    ///
    /// Only the top level of the root is listed: each segment is one
    /// directory entry (a Zarr array directory). Entries whose names do
    /// not match the grammar are skipped with a warning.
    pub fn scan(root: &Path) -> std::io::Result<Self> {
        let mut manifest = Self::default();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            match SourceSegment::from_path(entry.path()) {
                Ok(segment) => {
                    debug!(
                        scenario = %segment.scenario,
                        ensemble = %segment.ensemble,
                        variable = %segment.variable,
                        month = %segment.month_key(),
                        "Discovered segment"
                    );
                    let key = (
                        segment.scenario.clone(),
                        segment.ensemble.clone(),
                        segment.variable.clone(),
                    );
                    manifest.series.entry(key).or_default().insert(segment);
                }
                Err(error) => {
                    warn!(
                        path = %entry.path().display(),
                        error = %error,
                        "Skipping entry that does not match the segment grammar"
                    );
                    manifest.anomalies.push(ScanAnomaly {
                        path: entry.path().to_path_buf(),
                        error,
                    });
                }
            }
        }

        info!(
            series = manifest.series.len(),
            segments = manifest.segment_count(),
            anomalies = manifest.anomalies.len(),
            root = %root.display(),
            "Manifest scan complete"
        );

        Ok(manifest)
    }

    /// The series for one (scenario, ensemble, variable), if discovered.
    pub fn series(&self, scenario: &str, ensemble: &str, variable: &str) -> Option<&VariableSeries> {
        self.series.get(&(
            scenario.to_string(),
            ensemble.to_string(),
            variable.to_string(),
        ))
    }

    /// All discovered series keys.
    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }

    /// Entries skipped during the scan.
    pub fn anomalies(&self) -> &[ScanAnomaly] {
        &self.anomalies
    }

    /// Total discovered segment count.
    pub fn segment_count(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }
}
