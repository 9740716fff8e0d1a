//! Statistics Engine
//!
//! Grouped aggregation over validated trips: per zone-hour exposure counts
//! and durations, and per-zone revenue dispersion. Mean, variance, and
//! standard deviation are computed by explicit two-pass summation
//! (population variance), never a library routine: the formulas are part of
//! the numeric contract, including the empty-group and singleton-group
//! behavior. Inputs are the already-rounded persisted values; aggregation
//! never re-rounds its inputs.

use crate::models::{round2, round4, ValidatedTrip, ZoneHourKey, ZoneHourMetric, ZoneRevenueMetric};
use std::collections::BTreeMap;
use tracing::info;

/// Two-pass mean / population variance / standard deviation.
/// An empty slice yields (0, 0, 0) rather than failing.
pub fn mean_variance_stddev(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let mut sum_squared_diff = 0.0;
    for value in values {
        let diff = value - mean;
        sum_squared_diff += diff * diff;
    }

    let variance = sum_squared_diff / values.len() as f64;
    (mean, variance, variance.sqrt())
}

/// Group trips by (pickup zone, hour of day) and compute exposure metrics.
/// Exposure is the raw trip count; no smoothing or trimming.
pub fn compute_zone_hour_metrics(
    trips: &[ValidatedTrip],
) -> BTreeMap<ZoneHourKey, ZoneHourMetric> {
    let mut groups: BTreeMap<ZoneHourKey, (u64, f64)> = BTreeMap::new();

    for trip in trips {
        let key = ZoneHourKey::new(trip.pulocation_id, trip.hour_of_day);
        let entry = groups.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += trip.trip_duration_minutes;
    }

    let metrics: BTreeMap<ZoneHourKey, ZoneHourMetric> = groups
        .into_iter()
        .map(|(key, (count, total_duration))| {
            let avg = if count > 0 {
                total_duration / count as f64
            } else {
                0.0
            };
            (
                key,
                ZoneHourMetric {
                    zone_id: key.zone_id,
                    hour: key.hour,
                    trip_count: count,
                    avg_trip_duration: round2(avg),
                    exposure_score: count,
                },
            )
        })
        .collect();

    info!(buckets = metrics.len(), "Computed zone-hour exposure metrics");
    metrics
}

/// Group trip totals by pickup zone and compute revenue dispersion metrics.
/// Stability is `max(0, 1 - stddev / max_spread)` where the spread guard is
/// `2 * mean` for a positive mean and 1 otherwise.
pub fn compute_zone_revenue_metrics(
    trips: &[ValidatedTrip],
) -> BTreeMap<i64, ZoneRevenueMetric> {
    let mut zone_fares: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for trip in trips {
        zone_fares
            .entry(trip.pulocation_id)
            .or_default()
            .push(trip.total_amount);
    }

    let metrics: BTreeMap<i64, ZoneRevenueMetric> = zone_fares
        .into_iter()
        .map(|(zone_id, fares)| {
            let (mean, variance, std_dev) = mean_variance_stddev(&fares);

            let max_spread = if mean > 0.0 { mean * 2.0 } else { 1.0 };
            let stability_score = (1.0 - std_dev / max_spread).max(0.0);

            (
                zone_id,
                ZoneRevenueMetric {
                    zone_id,
                    avg_revenue: round2(mean),
                    revenue_variance: round2(variance),
                    revenue_std_dev: round2(std_dev),
                    stability_score: round4(stability_score),
                },
            )
        })
        .collect();

    info!(zones = metrics.len(), "Computed zone revenue volatility metrics");
    metrics
}
