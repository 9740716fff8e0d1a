//! Risk Scoring Engine
//!
//! Combines exposure and revenue-volatility signals into a bounded [0,1]
//! composite score per zone-hour bucket. Normalization denominators are
//! global maxima computed once per run (floored at 1), so a single outlier
//! bucket depresses every other bucket's relative density score. Weights
//! are externally configured and expected, not enforced, to sum to 1.

use crate::config::PipelineConfig;
use crate::models::{round4, RiskScore, ZoneHourKey, ZoneHourMetric, ZoneRevenueMetric};
use std::collections::BTreeMap;
use tracing::info;

/// Score every zone-hour bucket present in the exposure metrics. Zones
/// without a revenue metric contribute zero volatility. Empty input
/// degenerates to an empty result, not a fault.
pub fn compute_risk_scores(
    exposure: &BTreeMap<ZoneHourKey, ZoneHourMetric>,
    revenue: &BTreeMap<i64, ZoneRevenueMetric>,
    config: &PipelineConfig,
) -> BTreeMap<ZoneHourKey, RiskScore> {
    let weights = &config.risk_weights;

    // Global normalization denominators, floored at 1. Volatility uses the
    // stored 2-decimal stddev, matching the persisted metric values.
    let max_trip_count = exposure
        .values()
        .map(|m| m.trip_count)
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let mut max_volatility = revenue
        .values()
        .map(|m| m.revenue_std_dev)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_volatility.is_finite() || max_volatility <= 0.0 {
        max_volatility = 1.0;
    }

    let scores: BTreeMap<ZoneHourKey, RiskScore> = exposure
        .iter()
        .map(|(key, metric)| {
            let density_norm = metric.trip_count as f64 / max_trip_count;

            let late_night_factor = if config.is_late_night(key.hour) {
                1.0
            } else {
                0.0
            };

            let volatility_norm = revenue
                .get(&key.zone_id)
                .map(|m| m.revenue_std_dev / max_volatility)
                .unwrap_or(0.0);

            let raw_score = weights.density * density_norm
                + weights.late_night * late_night_factor
                + weights.volatility * volatility_norm;
            let risk_score = raw_score.clamp(0.0, 1.0);

            (
                *key,
                RiskScore {
                    zone_id: key.zone_id,
                    hour: key.hour,
                    trip_count: metric.trip_count,
                    density_component: round4(weights.density * density_norm),
                    late_night_component: round4(weights.late_night * late_night_factor),
                    volatility_component: round4(weights.volatility * volatility_norm),
                    risk_score: round4(risk_score),
                },
            )
        })
        .collect();

    info!(buckets = scores.len(), "Computed risk scores");
    log_extremes(&scores);
    scores
}

/// Report the highest and lowest scoring buckets. Ties resolve to the first
/// bucket in key order.
fn log_extremes(scores: &BTreeMap<ZoneHourKey, RiskScore>) {
    let highest = scores.values().fold(None::<&RiskScore>, |best, s| match best {
        Some(b) if b.risk_score >= s.risk_score => Some(b),
        _ => Some(s),
    });
    let lowest = scores.values().fold(None::<&RiskScore>, |best, s| match best {
        Some(b) if b.risk_score <= s.risk_score => Some(b),
        _ => Some(s),
    });

    if let (Some(high), Some(low)) = (highest, lowest) {
        info!(
            zone = high.zone_id,
            hour = high.hour,
            score = high.risk_score,
            "Highest risk bucket"
        );
        info!(
            zone = low.zone_id,
            hour = low.hour,
            score = low.risk_score,
            "Lowest risk bucket"
        );
    }
}
