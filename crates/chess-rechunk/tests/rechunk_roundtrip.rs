//! Integration test: rechunk a synthetic monthly archive end-to-end.
//!
//! 1. Write monthly Zarr segments with known values for two variables
//! 2. Run the engine over the archive
//! 3. Read the tiled output units back and verify values and metadata
//! 4. Re-run and verify completed plans are skipped via the ledger

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use chess_common::{cells_of, days_in_month, DateRange, GridExtent, Resolution, TileId};
use chess_manifest::segment::segment_name;
use chess_rechunk::{
    open_unit, run, EngineConfig, ProgressLedger, RechunkRequest, LEDGER_FILENAME,
};

/// Value at (day, row, col) = base + day * 100_000 + row * 100 + col,
/// exactly representable in f32 for the extents used here.
fn segment_value(base: u32, day0: u32, row: u32, col: u32) -> f32 {
    (base + day0 * 100_000 + row * 100 + col) as f32
}

/// Write one monthly source segment of shape [days, rows, cols].
fn write_segment(
    root: &Path,
    scenario: &str,
    ensemble: &str,
    variable: &str,
    year: i32,
    month: u32,
    extent: GridExtent,
    base: u32,
    days_override: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let days = days_override.unwrap_or_else(|| days_in_month(year, month));
    let name = segment_name(scenario, ensemble, variable, year, month, days_in_month(year, month));
    let path = root.join(name);
    std::fs::create_dir_all(&path)?;

    let store = Arc::new(FilesystemStore::new(&path)?);
    let shape = vec![days as u64, extent.rows as u64, extent.cols as u64];
    let array = ArrayBuilder::new(
        shape.clone(),
        DataType::Float32,
        shape.clone().try_into()?,
        FillValue::from(f32::NAN),
    )
    .build(store, "/")?;
    array.store_metadata()?;

    let mut data = Vec::with_capacity(days as usize * (extent.rows * extent.cols) as usize);
    for day0 in 0..days {
        for row in 0..extent.rows {
            for col in 0..extent.cols {
                data.push(segment_value(base, day0, row, col));
            }
        }
    }
    let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], shape)?;
    array.store_array_subset_elements(&subset, &data)?;
    Ok(())
}

fn request(
    scenario: &str,
    variables: &[&str],
    start: NaiveDate,
    end: NaiveDate,
) -> RechunkRequest {
    RechunkRequest {
        scenario: scenario.to_string(),
        ensemble: "01".to_string(),
        variables: variables.iter().map(|v| v.to_string()).collect(),
        range: DateRange::new(start, end).unwrap(),
        resolution: Resolution::Fine,
    }
}

fn config(input: &Path, output: &Path, extent: GridExtent) -> EngineConfig {
    EngineConfig {
        input_root: input.to_path_buf(),
        output_root: output.to_path_buf(),
        concurrency: 2,
        memory_budget_mb: 64,
        extent,
    }
}

#[tokio::test]
async fn test_full_run_rechunks_per_tile() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(20, 20);

    // January 2020 for two variables, distinct value bases.
    write_segment(input.path(), "rcp85", "01", "tas", 2020, 1, extent, 1_000_000, None).unwrap();
    write_segment(input.path(), "rcp85", "01", "pr", 2020, 1, extent, 2_000_000, None).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
    let requests = vec![request("rcp85", &["tas", "pr"], start, end)];

    let summary = run(&config(input.path(), output.path(), extent), &requests)
        .await
        .expect("Run failed");

    // 2 x 2 fine tiles over a 20 x 20 extent.
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failed.is_empty());

    // Verify tile (1, 1): rows 10..20, cols 10..20.
    let unit_path = output
        .path()
        .join("rcp85_01/fine/tile_001_001_20200101-20200131.zarr");
    let unit = open_unit(&unit_path).expect("Failed to open unit");
    assert_eq!(unit.shape(), &[2, 31, 100]);

    let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![2, 31, 100]).unwrap();
    let data: Vec<f32> = unit.retrieve_array_subset_elements(&subset).unwrap();

    // Cell order matches the tile's row-major enumeration.
    let cells = cells_of(TileId::new(1, 1), Resolution::Fine, extent);
    for (cell_idx, cell) in cells.iter().enumerate() {
        // tas, day 0.
        assert_eq!(data[cell_idx], segment_value(1_000_000, 0, cell.row, cell.col));
        // pr, day 30.
        let idx = (31 + 30) * 100 + cell_idx;
        assert_eq!(data[idx], segment_value(2_000_000, 30, cell.row, cell.col));
    }

    let attrs = unit.attributes();
    assert_eq!(attrs["scenario"], serde_json::json!("rcp85"));
    assert_eq!(attrs["variables"], serde_json::json!(["tas", "pr"]));
    assert_eq!(attrs["tile_row"], serde_json::json!(1));
    assert_eq!(attrs["end_date"], serde_json::json!("2020-01-31"));
}

#[tokio::test]
async fn test_rerun_skips_completed_plans() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(10, 10);

    write_segment(input.path(), "rcp85", "01", "tas", 2020, 6, extent, 1_000_000, None).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 6, 30).unwrap();
    let requests = vec![request("rcp85", &["tas"], start, end)];
    let config = config(input.path(), output.path(), extent);

    let first = run(&config, &requests).await.expect("First run failed");
    assert_eq!(first.completed, 1);
    assert_eq!(first.skipped, 0);

    // Corrupting the segment proves the second run never reads it; the
    // manifest scan itself only looks at names.
    let seg_name = segment_name("rcp85", "01", "tas", 2020, 6, 30);
    std::fs::write(input.path().join(&seg_name).join("zarr.json"), b"junk").unwrap();

    let second = run(&config, &requests).await.expect("Second run failed");
    assert_eq!(second.completed, 0);
    assert_eq!(second.skipped, 1);
    assert!(second.failed.is_empty());

    let unit_path = output
        .path()
        .join("rcp85_01/fine/tile_000_000_20200601-20200630.zarr");
    let unit = open_unit(&unit_path).expect("Failed to open unit");
    assert_eq!(unit.shape(), &[1, 30, 100]);
}

#[tokio::test]
async fn test_resume_completes_only_remaining_plans() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(20, 20); // 4 fine tiles

    write_segment(input.path(), "rcp85", "01", "tas", 2020, 6, extent, 1_000_000, None).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 6, 30).unwrap();
    let requests = vec![request("rcp85", &["tas"], start, end)];
    let config = config(input.path(), output.path(), extent);

    // Ledger one of the four plans up front, as an interrupted earlier
    // run would have.
    let done_key = "rcp85_01/fine/tile_000_001_20200601-20200630.zarr";
    {
        let ledger = ProgressLedger::open(output.path().join(LEDGER_FILENAME)).unwrap();
        ledger
            .mark_complete(done_key, &output.path().join(done_key))
            .unwrap();
    }

    let summary = run(&config, &requests).await.expect("Run failed");
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.skipped, 1);
    assert!(summary.failed.is_empty());

    // The ledgered plan was left exactly as found: never rebuilt.
    assert!(!output.path().join(done_key).exists());
    for tile in ["tile_000_000", "tile_001_000", "tile_001_001"] {
        let path = output
            .path()
            .join(format!("rcp85_01/fine/{tile}_20200601-20200630.zarr"));
        let unit = open_unit(&path).expect("Failed to open unit");
        assert_eq!(unit.shape(), &[1, 30, 100]);
    }

    // All four now ledgered; a further run reads nothing.
    let seg_name = segment_name("rcp85", "01", "tas", 2020, 6, 30);
    std::fs::write(input.path().join(&seg_name).join("zarr.json"), b"junk").unwrap();
    let again = run(&config, &requests).await.expect("Rerun failed");
    assert_eq!(again.completed, 0);
    assert_eq!(again.skipped, 4);
    assert!(again.failed.is_empty());
}

#[tokio::test]
async fn test_duplicate_requests_share_one_plan() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(10, 10);

    write_segment(input.path(), "rcp85", "01", "tas", 2020, 1, extent, 1_000_000, None).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
    // The same request twice names the same single plan.
    let requests = vec![
        request("rcp85", &["tas"], start, end),
        request("rcp85", &["tas"], start, end),
    ];

    let summary = run(&config(input.path(), output.path(), extent), &requests)
        .await
        .expect("Run failed");
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failed.is_empty());

    let unit_path = output
        .path()
        .join("rcp85_01/fine/tile_000_000_20200101-20200131.zarr");
    let unit = open_unit(&unit_path).expect("Failed to open unit");
    assert_eq!(unit.shape(), &[1, 31, 100]);
}

#[tokio::test]
async fn test_coverage_gap_fails_request_but_not_run() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(10, 10);

    // rcp85 has Jan and Feb; rcp26 is missing Feb.
    write_segment(input.path(), "rcp85", "01", "tas", 2020, 1, extent, 1_000_000, None).unwrap();
    write_segment(input.path(), "rcp85", "01", "tas", 2020, 2, extent, 1_000_000, None).unwrap();
    write_segment(input.path(), "rcp26", "01", "tas", 2020, 1, extent, 3_000_000, None).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
    let requests = vec![
        request("rcp85", &["tas"], start, end),
        request("rcp26", &["tas"], start, end),
    ];

    let summary = run(&config(input.path(), output.path(), extent), &requests)
        .await
        .expect("Run failed");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].key.starts_with("rcp26_01/fine/"));
    assert!(summary.failed[0].error.contains("2020-02"));
}

#[tokio::test]
async fn test_short_segment_fails_plans_only() {
    let input = tempfile::tempdir().expect("Failed to create temp dir");
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let extent = GridExtent::new(10, 10);

    // rcp26's January claims 31 days in its name but holds 30.
    write_segment(input.path(), "rcp85", "01", "tas", 2020, 1, extent, 1_000_000, None).unwrap();
    write_segment(input.path(), "rcp26", "01", "tas", 2020, 1, extent, 3_000_000, Some(30)).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
    let requests = vec![
        request("rcp85", &["tas"], start, end),
        request("rcp26", &["tas"], start, end),
    ];

    let summary = run(&config(input.path(), output.path(), extent), &requests)
        .await
        .expect("Run failed");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(
        summary.failed[0].key,
        "rcp26_01/fine/tile_000_000_20200101-20200131.zarr"
    );
    assert!(summary.failed[0].error.contains("30 days"));

    // The failed plan left no ledgered output unit.
    let failed_path = output
        .path()
        .join("rcp26_01/fine/tile_000_000_20200101-20200131.zarr");
    assert!(!failed_path.exists());
}
