//! Record Validation
//!
//! Applies the ordered battery of business and plausibility rules to one raw
//! record. The first failing rule wins; later rules are never evaluated, so
//! a record failing multiple rules is always attributed to the earliest one.
//! Evaluation order: temporal -> range -> spatial -> duration -> categorical.
//!
//! Malformed fields are a validation failure, not a process fault: every
//! outcome is `Ok(ValidatedTrip)` or `Err(ExclusionReason)`, never a panic
//! surfaced to the caller.

use crate::config::PipelineConfig;
use crate::models::{round2, ExclusionReason, RawRecord, ValidatedTrip, TIMESTAMP_FORMAT};
use crate::zones::ZoneCatalog;
use chrono::{Datelike, NaiveDateTime, Timelike};

// ============================================================================
// Field parsing
// ============================================================================

/// Parse a timestamp in canonical `YYYY-MM-DD HH:MM:SS` form. One malformed
/// variant is tolerated: trailing extraneous text after the seconds field,
/// recovered by truncating at the first comma.
fn parse_datetime(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(dt);
    }
    let truncated = raw.split(',').next()?.trim();
    NaiveDateTime::parse_from_str(truncated, TIMESTAMP_FORMAT).ok()
}

fn parse_f64(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

/// Integer fields arrive as either "3" or "3.0"; parse through f64 and
/// truncate, matching the cleaned-data convention.
fn parse_i64(raw: Option<&str>) -> Option<i64> {
    parse_f64(raw).map(|v| v as i64)
}

fn field<'a>(row: &'a RawRecord, name: &str) -> Option<&'a str> {
    row.get(name).map(String::as_str)
}

// ============================================================================
// Validator
// ============================================================================

/// Validates raw records against the configured rule battery. Holds a shared
/// read-only view of the zone catalog; never mutates it.
pub struct TripValidator<'a> {
    config: &'a PipelineConfig,
    zones: &'a ZoneCatalog,
}

impl<'a> TripValidator<'a> {
    pub fn new(config: &'a PipelineConfig, zones: &'a ZoneCatalog) -> Self {
        Self { config, zones }
    }

    /// Validate one raw record at its 1-based source index. Returns the
    /// normalized trip or the single reason for exclusion.
    pub fn validate(
        &self,
        row: &RawRecord,
        source_index: u64,
    ) -> Result<ValidatedTrip, ExclusionReason> {
        let cfg = self.config;

        // Rule 1: both timestamps must parse
        let pickup = parse_datetime(field(row, "tpep_pickup_datetime"));
        let dropoff = parse_datetime(field(row, "tpep_dropoff_datetime"));
        let (Some(pickup), Some(dropoff)) = (pickup, dropoff) else {
            return Err(ExclusionReason::InvalidDatetimeFormat);
        };

        // Rule 2: strict temporal ordering
        if dropoff <= pickup {
            return Err(ExclusionReason::DropoffBeforeOrEqualPickup);
        }

        // Rule 3: pickup must fall in the target month
        if pickup.year() != cfg.target_year || pickup.month() != cfg.target_month {
            return Err(ExclusionReason::DateOutOfRange);
        }

        // Rule 4: distance
        let trip_distance = parse_f64(field(row, "trip_distance"));
        let trip_distance = match trip_distance {
            Some(d) if d >= 0.0 => d,
            _ => return Err(ExclusionReason::NegativeOrNullDistance),
        };
        if trip_distance > cfg.max_distance_miles {
            return Err(ExclusionReason::DistanceExceedsMax);
        }

        // Rule 5: fare
        let fare_amount = parse_f64(field(row, "fare_amount"));
        let fare_amount = match fare_amount {
            Some(f) if f >= cfg.min_fare => f,
            _ => return Err(ExclusionReason::NegativeOrNullFare),
        };
        if fare_amount > cfg.max_fare {
            return Err(ExclusionReason::FareExceedsMax);
        }

        // Rule 6: passenger count
        let passenger_count = parse_i64(field(row, "passenger_count"));
        let passenger_count = match passenger_count {
            Some(p) if p >= cfg.min_passenger_count => p,
            _ => return Err(ExclusionReason::InvalidPassengerCount),
        };
        if passenger_count > cfg.max_passenger_count {
            return Err(ExclusionReason::PassengerCountExceedsMax);
        }

        // Rule 7: pickup and dropoff zones must be in the catalog
        let pulocation_id = parse_i64(field(row, "PULocationID"));
        let pulocation_id = match pulocation_id {
            Some(z) if self.zones.contains(z) => z,
            _ => return Err(ExclusionReason::InvalidPulocationId),
        };
        let dolocation_id = parse_i64(field(row, "DOLocationID"));
        let dolocation_id = match dolocation_id {
            Some(z) if self.zones.contains(z) => z,
            _ => return Err(ExclusionReason::InvalidDolocationId),
        };

        // Rule 8: derived duration within bounds
        let trip_duration_minutes = (dropoff - pickup).num_seconds() as f64 / 60.0;
        if trip_duration_minutes < cfg.min_trip_duration_minutes {
            return Err(ExclusionReason::TripDurationTooShort);
        }
        if trip_duration_minutes > cfg.max_trip_duration_minutes {
            return Err(ExclusionReason::TripDurationExceedsMax);
        }

        // Rule 9: rate code
        let ratecode_id = parse_i64(field(row, "RatecodeID"));
        let ratecode_id = match ratecode_id {
            Some(c) if cfg.is_valid_rate_code(c) => c,
            _ => return Err(ExclusionReason::InvalidRatecode),
        };

        // Rule 10: payment type
        let payment_type = parse_i64(field(row, "payment_type"));
        let payment_type = match payment_type {
            Some(p) if cfg.is_valid_payment_type(p) => p,
            _ => return Err(ExclusionReason::InvalidPaymentType),
        };

        // Rule 11: store-and-forward flag
        let store_and_fwd_flag = field(row, "store_and_fwd_flag").unwrap_or("").trim();
        if !cfg.is_valid_store_fwd_flag(store_and_fwd_flag) {
            return Err(ExclusionReason::InvalidStoreFwdFlag);
        }

        // Secondary charges default to 0.0 when absent or unparsable.
        let extra = parse_f64(field(row, "extra")).unwrap_or(0.0);
        let mta_tax = parse_f64(field(row, "mta_tax")).unwrap_or(0.0);
        let tip_amount = parse_f64(field(row, "tip_amount")).unwrap_or(0.0);
        let tolls_amount = parse_f64(field(row, "tolls_amount")).unwrap_or(0.0);
        let improvement_surcharge = parse_f64(field(row, "improvement_surcharge")).unwrap_or(0.0);
        let congestion_surcharge = parse_f64(field(row, "congestion_surcharge")).unwrap_or(0.0);
        let total_amount = parse_f64(field(row, "total_amount")).unwrap_or(0.0);

        Ok(ValidatedTrip {
            trip_id: source_index,
            vendor_id: parse_i64(field(row, "VendorID")),
            pickup_datetime: pickup,
            dropoff_datetime: dropoff,
            passenger_count,
            trip_distance: round2(trip_distance),
            ratecode_id,
            store_and_fwd_flag: store_and_fwd_flag.to_string(),
            pulocation_id,
            dolocation_id,
            payment_type,
            fare_amount: round2(fare_amount),
            extra: round2(extra),
            mta_tax: round2(mta_tax),
            tip_amount: round2(tip_amount),
            tolls_amount: round2(tolls_amount),
            improvement_surcharge: round2(improvement_surcharge),
            total_amount: round2(total_amount),
            congestion_surcharge: round2(congestion_surcharge),
            trip_duration_minutes: round2(trip_duration_minutes),
            hour_of_day: pickup.hour(),
        })
    }
}
