//! Run orchestration.
//!
//! Drives a whole run: validates configuration, scans the source
//! archive, plans every request, and assembles tile plans under a
//! bounded concurrency limit. One failing plan never aborts the run;
//! it is recorded and the remaining plans proceed.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use chess_manifest::Manifest;

use crate::config::EngineConfig;
use crate::error::{RechunkError, Result};
use crate::ledger::ProgressLedger;
use crate::planner::{plan_request, RechunkRequest, TilePlan};
use crate::reader::ZarrSegmentReader;
use crate::reassemble::assemble_tile;
use crate::writer::TiledWriter;

/// Ledger filename, kept alongside the output units.
pub const LEDGER_FILENAME: &str = "rechunk_ledger.jsonl";

/// One plan that did not persist this run.
#[derive(Debug, Clone)]
pub struct PlanFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of a full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Plans assembled and persisted this run.
    pub completed: usize,
    /// Plans already ledgered before this run; no segment was read for these.
    pub skipped: usize,
    /// Plans (or whole requests) that failed, with the failing error.
    pub failed: Vec<PlanFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Execute a set of rechunk requests against one input/output root pair.
///
/// Configuration is validated against the largest per-plan memory bound
/// of the run before any I/O. Requests are planned independently: a
/// request with a coverage gap is recorded as failed and the others
/// still run.
pub async fn run(config: &EngineConfig, requests: &[RechunkRequest]) -> Result<RunSummary> {
    let max_plan_bytes = requests.iter().map(|r| r.per_plan_bytes()).max().unwrap_or(0);
    config.validate(max_plan_bytes)?;

    info!(
        input_root = %config.input_root.display(),
        output_root = %config.output_root.display(),
        requests = requests.len(),
        concurrency = config.concurrency,
        "Starting rechunk run"
    );

    let manifest = Manifest::scan(&config.input_root)?;
    info!(segments = manifest.segment_count(), "Scanned source archive");

    let ledger = Arc::new(ProgressLedger::open(
        config.output_root.join(LEDGER_FILENAME),
    )?);
    let writer = Arc::new(TiledWriter::new(&config.output_root));
    let reader = Arc::new(ZarrSegmentReader::new());

    let mut summary = RunSummary::default();
    let mut pending: Vec<TilePlan> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for request in requests {
        match plan_request(&manifest, request, config.extent) {
            Ok(plans) => {
                for plan in plans {
                    let key = plan.key();
                    // Overlapping requests can name the same plan; two
                    // workers must never share an output path.
                    if !seen.insert(key.clone()) {
                        warn!(plan = %key, "Duplicate plan in run, ignoring");
                        continue;
                    }
                    if ledger.is_complete(&key) {
                        summary.skipped += 1;
                    } else {
                        pending.push(plan);
                    }
                }
            }
            Err(e) => {
                let key = format!(
                    "{}_{}/{}/{}",
                    request.scenario, request.ensemble, request.resolution, request.range
                );
                error!(request = %key, error = %e, "Planning failed, skipping request");
                summary.failed.push(PlanFailure {
                    key,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        pending = pending.len(),
        skipped = summary.skipped,
        "Planned run"
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut handles = Vec::with_capacity(pending.len());

    for plan in pending {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RechunkError::storage_error(e.to_string()))?;
        let ledger = ledger.clone();
        let writer = writer.clone();
        let reader = reader.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let key = plan.key();
            let started = std::time::Instant::now();

            // Zarr reads and writes are blocking filesystem work.
            let worker_key = key.clone();
            let result = tokio::task::spawn_blocking(move || {
                let array = assemble_tile(&plan, reader.as_ref())?;
                writer.write(&worker_key, &array)
            })
            .await;

            match result {
                Ok(Ok(output)) => match ledger.mark_complete(&key, &output) {
                    Ok(()) => {
                        info!(
                            plan = %key,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Plan complete"
                        );
                        Ok(())
                    }
                    Err(e) => Err(PlanFailure {
                        key,
                        error: format!("persisted but not ledgered: {e}"),
                    }),
                },
                Ok(Err(e)) => Err(PlanFailure {
                    key,
                    error: e.to_string(),
                }),
                Err(e) => Err(PlanFailure {
                    key,
                    error: format!("task panicked: {e}"),
                }),
            }
        }));
    }

    for outcome in join_all(handles).await {
        match outcome {
            Ok(Ok(())) => summary.completed += 1,
            Ok(Err(failure)) => {
                warn!(plan = %failure.key, error = %failure.error, "Plan failed");
                summary.failed.push(failure);
            }
            Err(e) => summary.failed.push(PlanFailure {
                key: "<unknown>".to_string(),
                error: format!("task aborted: {e}"),
            }),
        }
    }

    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "Rechunk run finished"
    );

    Ok(summary)
}
