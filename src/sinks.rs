//! Output Sinks
//!
//! Persists the products of a run: the cleaned-trip CSV, the exclusion
//! ledger, and the three key-addressable metrics collections. Also provides
//! the cleaned-trip loader used when the scoring stage runs against a
//! previously persisted cleaning run.

use crate::models::{
    ExclusionRecord, RiskScore, ValidatedTrip, ZoneHourKey, ZoneHourMetric, ZoneRevenueMetric,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

// ============================================================================
// Cleaned trips
// ============================================================================

/// Write validated trips as CSV, one row per trip, column order matching the
/// `ValidatedTrip` field order, monetary values formatted to 2 decimals.
pub fn write_cleaned_trips(path: &Path, trips: &[ValidatedTrip]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create cleaned output: {}", path.display()))?;

    for trip in trips {
        writer
            .serialize(trip)
            .with_context(|| format!("Failed to write trip {}", trip.trip_id))?;
    }
    writer.flush().context("Failed to flush cleaned output")?;

    info!(rows = trips.len(), path = %path.display(), "Wrote cleaned trips");
    Ok(())
}

/// Load a previously persisted cleaned-trip CSV. A missing file is fatal for
/// the scoring stage and reported with the path.
pub fn read_cleaned_trips(path: &Path) -> Result<Vec<ValidatedTrip>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| {
        format!(
            "Cleaned data not found: {} (run the cleaning stage first)",
            path.display()
        )
    })?;

    let mut trips = Vec::new();
    for (i, row) in reader.deserialize::<ValidatedTrip>().enumerate() {
        let trip = row.with_context(|| format!("Malformed cleaned row {}", i + 1))?;
        trips.push(trip);
    }

    info!(rows = trips.len(), path = %path.display(), "Loaded cleaned trips");
    Ok(trips)
}

// ============================================================================
// Exclusion ledger
// ============================================================================

/// Write the exclusion ledger: `index,reason` header, one row per excluded
/// record, in source order.
pub fn write_exclusion_log(path: &Path, exclusions: &[ExclusionRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create exclusion log: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "index,reason")?;
    for record in exclusions {
        writeln!(writer, "{},{}", record.index, record.reason.code())?;
    }
    writer.flush().context("Failed to flush exclusion log")?;

    info!(rows = exclusions.len(), path = %path.display(), "Wrote exclusion log");
    Ok(())
}

// ============================================================================
// Metrics
// ============================================================================

fn write_json_map<T: serde::Serialize>(
    path: &Path,
    entries: &BTreeMap<String, &T>,
    label: &str,
) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(entries)
        .with_context(|| format!("Failed to serialize {}", label))?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write {}: {}", label, path.display()))?;

    info!(entries = entries.len(), path = %path.display(), "Wrote {}", label);
    Ok(())
}

/// Zone-hour exposure metrics keyed `"{zone}_{hour}"`.
pub fn write_zone_hour_metrics(
    path: &Path,
    metrics: &BTreeMap<ZoneHourKey, ZoneHourMetric>,
) -> Result<()> {
    let keyed: BTreeMap<String, &ZoneHourMetric> = metrics
        .iter()
        .map(|(key, metric)| (key.composite(), metric))
        .collect();
    write_json_map(path, &keyed, "zone-hour metrics")
}

/// Zone revenue metrics keyed by zone id.
pub fn write_zone_revenue_metrics(
    path: &Path,
    metrics: &BTreeMap<i64, ZoneRevenueMetric>,
) -> Result<()> {
    let keyed: BTreeMap<String, &ZoneRevenueMetric> = metrics
        .iter()
        .map(|(zone_id, metric)| (zone_id.to_string(), metric))
        .collect();
    write_json_map(path, &keyed, "zone revenue metrics")
}

/// Zone-hour risk scores keyed `"{zone}_{hour}"`, matching the exposure keys.
pub fn write_risk_scores(path: &Path, scores: &BTreeMap<ZoneHourKey, RiskScore>) -> Result<()> {
    let keyed: BTreeMap<String, &RiskScore> = scores
        .iter()
        .map(|(key, score)| (key.composite(), score))
        .collect();
    write_json_map(path, &keyed, "risk scores")
}
