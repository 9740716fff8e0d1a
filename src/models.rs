//! Domain Types
//!
//! Value types flowing through the pipeline: raw rows, validated trips,
//! exclusion records, aggregation keys, and the three metric collections.
//! Field order on `ValidatedTrip` defines the cleaned-CSV column order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Canonical timestamp format for all persisted trip timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A raw input row exactly as received: field name -> textual value.
/// No invariants hold until the validator has accepted it.
pub type RawRecord = HashMap<String, String>;

/// Round to 2 decimal places (monetary values, distances, durations).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Round to 4 decimal places (scores).
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serializes trip timestamps in canonical `YYYY-MM-DD HH:MM:SS` form.
pub mod trip_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map_err(serde::de::Error::custom)
    }
}

/// Serializes monetary values with exactly 2 decimal places.
pub mod money {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:.2}", v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(d)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Validated trip
// ============================================================================

/// A trip record that has passed every validation rule. Field order here is
/// the cleaned-CSV column order; derived features come last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedTrip {
    /// 1-based position in the source stream; unique within a run.
    pub trip_id: u64,
    pub vendor_id: Option<i64>,
    #[serde(with = "trip_timestamp")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(with = "trip_timestamp")]
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i64,
    pub trip_distance: f64,
    pub ratecode_id: i64,
    pub store_and_fwd_flag: String,
    pub pulocation_id: i64,
    pub dolocation_id: i64,
    pub payment_type: i64,
    #[serde(with = "money")]
    pub fare_amount: f64,
    #[serde(with = "money")]
    pub extra: f64,
    #[serde(with = "money")]
    pub mta_tax: f64,
    #[serde(with = "money")]
    pub tip_amount: f64,
    #[serde(with = "money")]
    pub tolls_amount: f64,
    #[serde(with = "money")]
    pub improvement_surcharge: f64,
    #[serde(with = "money")]
    pub total_amount: f64,
    #[serde(with = "money")]
    pub congestion_surcharge: f64,
    // Derived features
    pub trip_duration_minutes: f64,
    pub hour_of_day: u32,
}

// ============================================================================
// Exclusions
// ============================================================================

/// Closed taxonomy of validation failure reasons. Exactly one reason is
/// attributed per excluded record: the first rule it fails in evaluation
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    InvalidDatetimeFormat,
    DropoffBeforeOrEqualPickup,
    DateOutOfRange,
    NegativeOrNullDistance,
    DistanceExceedsMax,
    NegativeOrNullFare,
    FareExceedsMax,
    InvalidPassengerCount,
    PassengerCountExceedsMax,
    InvalidPulocationId,
    InvalidDolocationId,
    TripDurationTooShort,
    TripDurationExceedsMax,
    InvalidRatecode,
    InvalidPaymentType,
    InvalidStoreFwdFlag,
    /// Unexpected per-record fault, caught at the loop boundary. Carries the
    /// fault message truncated to 30 characters.
    ProcessingError(String),
}

impl ExclusionReason {
    /// Stable string code used in the exclusion log and counters.
    pub fn code(&self) -> String {
        match self {
            Self::InvalidDatetimeFormat => "invalid_datetime_format".to_string(),
            Self::DropoffBeforeOrEqualPickup => "dropoff_before_or_equal_pickup".to_string(),
            Self::DateOutOfRange => "date_out_of_range".to_string(),
            Self::NegativeOrNullDistance => "negative_or_null_distance".to_string(),
            Self::DistanceExceedsMax => "distance_exceeds_max".to_string(),
            Self::NegativeOrNullFare => "negative_or_null_fare".to_string(),
            Self::FareExceedsMax => "fare_exceeds_max".to_string(),
            Self::InvalidPassengerCount => "invalid_passenger_count".to_string(),
            Self::PassengerCountExceedsMax => "passenger_count_exceeds_max".to_string(),
            Self::InvalidPulocationId => "invalid_pulocation_id".to_string(),
            Self::InvalidDolocationId => "invalid_dolocation_id".to_string(),
            Self::TripDurationTooShort => "trip_duration_too_short".to_string(),
            Self::TripDurationExceedsMax => "trip_duration_exceeds_max".to_string(),
            Self::InvalidRatecode => "invalid_ratecode".to_string(),
            Self::InvalidPaymentType => "invalid_payment_type".to_string(),
            Self::InvalidStoreFwdFlag => "invalid_store_fwd_flag".to_string(),
            Self::ProcessingError(msg) => {
                let truncated: String = msg.chars().take(30).collect();
                format!("processing_error_{}", truncated)
            }
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// One entry in the exclusion ledger: source position plus the first rule
/// the record failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRecord {
    pub index: u64,
    pub reason: ExclusionReason,
}

// ============================================================================
// Run counters
// ============================================================================

/// Summary counters for a cleaning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningStats {
    pub total_processed: u64,
    pub total_valid: u64,
    pub total_excluded: u64,
    pub excluded_by_reason: BTreeMap<String, u64>,
}

impl CleaningStats {
    pub fn record_valid(&mut self) {
        self.total_processed += 1;
        self.total_valid += 1;
    }

    pub fn record_excluded(&mut self, reason: &ExclusionReason) {
        self.total_processed += 1;
        self.total_excluded += 1;
        *self.excluded_by_reason.entry(reason.code()).or_insert(0) += 1;
    }

    /// Percentage of processed rows retained, or 0 if nothing was processed.
    pub fn retention_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.total_valid as f64 / self.total_processed as f64 * 100.0
    }
}

// ============================================================================
// Aggregation keys and metrics
// ============================================================================

/// Composite key identifying a zone and an hour-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneHourKey {
    pub zone_id: i64,
    pub hour: u32,
}

impl ZoneHourKey {
    pub fn new(zone_id: i64, hour: u32) -> Self {
        Self { zone_id, hour }
    }

    /// String form used as the JSON map key: `"{zone}_{hour}"`.
    pub fn composite(&self) -> String {
        format!("{}_{}", self.zone_id, self.hour)
    }
}

impl fmt::Display for ZoneHourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {} hour {}", self.zone_id, self.hour)
    }
}

/// Exposure metrics per zone-hour bucket. Exposure is the raw trip count;
/// no smoothing or decay is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneHourMetric {
    pub zone_id: i64,
    pub hour: u32,
    pub trip_count: u64,
    pub avg_trip_duration: f64,
    pub exposure_score: u64,
}

/// Revenue dispersion per pickup zone. Variance is population variance over
/// already-rounded trip totals; stability is a bounded [0,1] inverse of
/// volatility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRevenueMetric {
    pub zone_id: i64,
    pub avg_revenue: f64,
    pub revenue_variance: f64,
    pub revenue_std_dev: f64,
    pub stability_score: f64,
}

/// Composite risk score per zone-hour bucket. Each weighted term is retained
/// individually for explainability; the combined score is clamped to [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub zone_id: i64,
    pub hour: u32,
    pub trip_count: u64,
    pub density_component: f64,
    pub late_night_component: f64,
    pub volatility_component: f64,
    pub risk_score: f64,
}
