//! Segment naming grammar.
//!
//! Archive entries are named
//! `chess-scape_{scenario}_{ensemble}_{variable}_uk_1km_daily_{YYYYMM}01-{YYYYMM}{DD}.zarr`
//! with one entry per variable per month. The archive's bias-corrected
//! lineage inserts a `bias-corrected` infix after the scenario; both
//! forms name the same series. Parsing is a total function: a name
//! either yields a segment with all five identifying fields or a typed
//! anomaly, never a panic. Partial matches are rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chess_common::MonthKey;

/// Expected literal tokens of the grammar.
const PREFIX: &str = "chess-scape";
const BIAS_INFIX: &str = "bias-corrected";
const DOMAIN: &str = "uk";
const GRID: &str = "1km";
const CADENCE: &str = "daily";
const EXTENSION: &str = ".zarr";

/// Why a directory entry name is not a valid segment name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentNameError {
    /// Missing the `.zarr` extension.
    #[error("missing {EXTENSION} extension: {0}")]
    WrongExtension(String),

    /// Wrong number of underscore-separated fields.
    #[error("expected 8 or 9 fields, found {found}: {name}")]
    FieldCount { name: String, found: usize },

    /// A fixed literal token did not match.
    #[error("expected literal {expected:?} at field {index}, found {found:?}")]
    LiteralMismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },

    /// An identifying field was empty.
    #[error("empty {field} field in {name}")]
    EmptyField { name: String, field: &'static str },

    /// The date span token is not `{YYYYMM}01-{YYYYMM}{DD}`.
    #[error("malformed date span {0:?}")]
    BadDateSpan(String),

    /// The span start and end name different months.
    #[error("date span {0:?} crosses a month boundary")]
    SpanCrossesMonth(String),
}

/// The five identifying fields extracted from a segment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentName {
    pub scenario: String,
    pub ensemble: String,
    pub variable: String,
    pub year: i32,
    pub month: u32,
    /// Name carried the `bias-corrected` infix.
    pub bias_corrected: bool,
}

/// One raw input file: a single variable, single month, whole grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSegment {
    pub scenario: String,
    pub ensemble: String,
    pub variable: String,
    pub year: i32,
    pub month: u32,
    /// Calibration lineage marker from the name; does not change the
    /// series the segment belongs to.
    pub bias_corrected: bool,
    /// On-disk location of the segment's array.
    pub path: PathBuf,
}

impl SourceSegment {
    /// Parse a segment from a filesystem path, attaching the path.
    pub fn from_path(path: &Path) -> Result<Self, SegmentNameError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let fields = parse_segment_name(name)?;
        Ok(Self {
            scenario: fields.scenario,
            ensemble: fields.ensemble,
            variable: fields.variable,
            year: fields.year,
            month: fields.month,
            bias_corrected: fields.bias_corrected,
            path: path.to_path_buf(),
        })
    }

    /// The month slot this segment fills.
    pub fn month_key(&self) -> MonthKey {
        MonthKey::new(self.year, self.month)
    }
}

/// Parse a segment name into its identifying fields.
pub fn parse_segment_name(name: &str) -> Result<SegmentName, SegmentNameError> {
    let stem = name
        .strip_suffix(EXTENSION)
        .ok_or_else(|| SegmentNameError::WrongExtension(name.to_string()))?;

    let fields: Vec<&str> = stem.split('_').collect();
    // The bias-corrected lineage carries one extra infix field.
    let bias_corrected = match fields.len() {
        8 => false,
        9 => true,
        found => {
            return Err(SegmentNameError::FieldCount {
                name: name.to_string(),
                found,
            })
        }
    };
    let offset = usize::from(bias_corrected);

    let mut literals = vec![(0, PREFIX)];
    if bias_corrected {
        literals.push((2, BIAS_INFIX));
    }
    literals.extend([
        (4 + offset, DOMAIN),
        (5 + offset, GRID),
        (6 + offset, CADENCE),
    ]);
    for (index, expected) in literals {
        if fields[index] != expected {
            return Err(SegmentNameError::LiteralMismatch {
                index,
                expected,
                found: fields[index].to_string(),
            });
        }
    }

    for (field, label) in [
        (fields[1], "scenario"),
        (fields[2 + offset], "ensemble"),
        (fields[3 + offset], "variable"),
    ] {
        if field.is_empty() {
            return Err(SegmentNameError::EmptyField {
                name: name.to_string(),
                field: label,
            });
        }
    }

    let (year, month) = parse_date_span(fields[7 + offset])?;

    Ok(SegmentName {
        scenario: fields[1].to_string(),
        ensemble: fields[2 + offset].to_string(),
        variable: fields[3 + offset].to_string(),
        year,
        month,
        bias_corrected,
    })
}

/// Parse the `{YYYYMM}01-{YYYYMM}{DD}` span token into (year, month).
fn parse_date_span(span: &str) -> Result<(i32, u32), SegmentNameError> {
    // Byte-offset slicing below is only safe on ASCII input.
    if !span.is_ascii() {
        return Err(SegmentNameError::BadDateSpan(span.to_string()));
    }

    let (start, end) = span
        .split_once('-')
        .ok_or_else(|| SegmentNameError::BadDateSpan(span.to_string()))?;

    if start.len() != 8 || end.len() != 8 {
        return Err(SegmentNameError::BadDateSpan(span.to_string()));
    }

    let year: i32 = start[0..4]
        .parse()
        .map_err(|_| SegmentNameError::BadDateSpan(span.to_string()))?;
    let month: u32 = start[4..6]
        .parse()
        .map_err(|_| SegmentNameError::BadDateSpan(span.to_string()))?;

    if !(1..=12).contains(&month) || &start[6..8] != "01" {
        return Err(SegmentNameError::BadDateSpan(span.to_string()));
    }

    if end[0..6] != start[0..6] {
        return Err(SegmentNameError::SpanCrossesMonth(span.to_string()));
    }
    if end[6..8].parse::<u32>().is_err() {
        return Err(SegmentNameError::BadDateSpan(span.to_string()));
    }

    Ok((year, month))
}

/// Render the canonical segment name for a set of fields.
///
/// The span's last day is taken from the segment's own day count, so
/// round-tripping a name written for a 30-day archive month is exact.
pub fn segment_name(
    scenario: &str,
    ensemble: &str,
    variable: &str,
    year: i32,
    month: u32,
    last_day: u32,
) -> String {
    format!(
        "{PREFIX}_{scenario}_{ensemble}_{variable}_{DOMAIN}_{GRID}_{CADENCE}_{year:04}{month:02}01-{year:04}{month:02}{last_day:02}{EXTENSION}"
    )
}

/// Render the canonical name for a bias-corrected segment.
pub fn bias_corrected_segment_name(
    scenario: &str,
    ensemble: &str,
    variable: &str,
    year: i32,
    month: u32,
    last_day: u32,
) -> String {
    format!(
        "{PREFIX}_{scenario}_{BIAS_INFIX}_{ensemble}_{variable}_{DOMAIN}_{GRID}_{CADENCE}_{year:04}{month:02}01-{year:04}{month:02}{last_day:02}{EXTENSION}"
    )
}
