//! Ingestion Pipeline
//!
//! Streams raw records through the validator in source order, accumulating
//! validated trips, the exclusion ledger, and summary counters. Batches are
//! a pacing/progress boundary only: the same input yields the same outputs
//! for any batch size. One bad record never aborts the run; unexpected
//! faults are contained at the per-record boundary and recorded as
//! `processing_error_*` exclusions.

use crate::config::PipelineConfig;
use crate::models::{CleaningStats, ExclusionReason, ExclusionRecord, RawRecord, ValidatedTrip};
use crate::validation::TripValidator;
use crate::zones::ZoneCatalog;
use anyhow::{Context, Result};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything a cleaning run produces, in source order.
#[derive(Debug, Default)]
pub struct CleaningOutcome {
    pub trips: Vec<ValidatedTrip>,
    pub exclusions: Vec<ExclusionRecord>,
    pub stats: CleaningStats,
}

/// Batched, single-writer cleaning pipeline.
pub struct CleaningPipeline {
    config: PipelineConfig,
    zones: ZoneCatalog,
}

impl CleaningPipeline {
    pub fn new(config: PipelineConfig, zones: ZoneCatalog) -> Self {
        Self { config, zones }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over an input CSV file. A missing input is fatal for
    /// this stage; no partial output is produced.
    pub fn run_file(&self, path: &Path) -> Result<CleaningOutcome> {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open input records: {}", path.display()))?;
        self.run(reader)
    }

    /// Run the pipeline over any record source with a header row.
    pub fn run<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<CleaningOutcome> {
        let validator = TripValidator::new(&self.config, &self.zones);
        let mut outcome = CleaningOutcome::default();

        if let Some(cap) = self.config.max_rows {
            warn!(max_rows = cap, "Bounded run: processing capped row count");
        }

        let mut batch_count = 0u64;
        let mut rows_in_batch = 0usize;

        for (i, row) in reader.deserialize::<RawRecord>().enumerate() {
            let source_index = i as u64 + 1;
            if let Some(cap) = self.config.max_rows {
                if source_index > cap {
                    break;
                }
            }

            let result = match row {
                Ok(row) => {
                    // Contain any unexpected per-record fault; the run must
                    // survive one bad record.
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        validator.validate(&row, source_index)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(ExclusionReason::ProcessingError(panic_message(payload)))
                    })
                }
                Err(err) => Err(ExclusionReason::ProcessingError(err.to_string())),
            };

            match result {
                Ok(trip) => {
                    outcome.stats.record_valid();
                    outcome.trips.push(trip);
                }
                Err(reason) => {
                    outcome.stats.record_excluded(&reason);
                    outcome.exclusions.push(ExclusionRecord {
                        index: source_index,
                        reason,
                    });
                }
            }

            rows_in_batch += 1;
            if rows_in_batch >= self.config.batch_size {
                batch_count += 1;
                info!(
                    batch = batch_count,
                    rows = rows_in_batch,
                    total = outcome.stats.total_processed,
                    "Processed batch"
                );
                rows_in_batch = 0;
            }
        }

        if rows_in_batch > 0 {
            batch_count += 1;
            debug!(batch = batch_count, rows = rows_in_batch, "Processed final partial batch");
        }

        info!(
            total_processed = outcome.stats.total_processed,
            total_valid = outcome.stats.total_valid,
            total_excluded = outcome.stats.total_excluded,
            retention_pct = format!("{:.2}", outcome.stats.retention_rate()),
            "Cleaning run complete"
        );
        log_exclusion_breakdown(&outcome.stats);

        Ok(outcome)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown fault".to_string()
    }
}

/// Log exclusion reasons ordered by descending count.
fn log_exclusion_breakdown(stats: &CleaningStats) {
    let mut breakdown: Vec<_> = stats.excluded_by_reason.iter().collect();
    breakdown.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (reason, count) in breakdown {
        info!(reason = %reason, count, "Exclusion breakdown");
    }
}
