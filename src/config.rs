//! Pipeline Configuration
//!
//! Centralized thresholds, categorical sets, risk weights, and processing
//! parameters for the cleaning and scoring stages. Everything here is an
//! injected parameter: compiled-in defaults, optionally overlaid by a TOML
//! file, with path-level flags layered on by the CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Weights for the composite risk score. Expected (not enforced) to sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub density: f64,
    pub late_night: f64,
    pub volatility: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            density: 0.4,
            late_night: 0.3,
            volatility: 0.3,
        }
    }
}

/// Full configuration surface for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Validation thresholds
    pub max_distance_miles: f64,
    pub min_fare: f64,
    pub max_fare: f64,
    pub min_trip_duration_minutes: f64,
    pub max_trip_duration_minutes: f64,
    pub min_passenger_count: i64,
    pub max_passenger_count: i64,

    // Closed categorical sets
    pub valid_rate_codes: Vec<i64>,
    pub valid_payment_types: Vec<i64>,
    pub valid_store_fwd_flags: Vec<String>,

    // Target month: pickups outside this month are excluded
    pub target_year: i32,
    pub target_month: u32,

    // Reference data
    pub expected_zone_count: i64,

    // Processing parameters
    pub batch_size: usize,
    /// Optional row cap for bounded test runs. `None` processes everything.
    pub max_rows: Option<u64>,

    // Risk scoring
    pub late_night_hours: Vec<u32>,
    pub risk_weights: RiskWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_distance_miles: 50.0,
            min_fare: 0.0,
            max_fare: 500.0,
            min_trip_duration_minutes: 1.0,
            max_trip_duration_minutes: 1440.0,
            min_passenger_count: 1,
            max_passenger_count: 8,
            valid_rate_codes: vec![1, 2, 3, 4, 5],
            valid_payment_types: vec![1, 2, 3, 4, 5],
            valid_store_fwd_flags: vec!["Y".to_string(), "N".to_string()],
            target_year: 2019,
            target_month: 1,
            expected_zone_count: 263,
            batch_size: 50_000,
            max_rows: None,
            late_night_hours: vec![22, 23, 0, 1, 2, 3, 4, 5],
            risk_weights: RiskWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Fields absent from the file keep
    /// their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn is_late_night(&self, hour: u32) -> bool {
        self.late_night_hours.contains(&hour)
    }

    pub fn is_valid_rate_code(&self, code: i64) -> bool {
        self.valid_rate_codes.contains(&code)
    }

    pub fn is_valid_payment_type(&self, payment: i64) -> bool {
        self.valid_payment_types.contains(&payment)
    }

    pub fn is_valid_store_fwd_flag(&self, flag: &str) -> bool {
        self.valid_store_fwd_flags.iter().any(|f| f == flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.max_distance_miles, 50.0);
        assert_eq!(cfg.max_fare, 500.0);
        assert_eq!(cfg.max_passenger_count, 8);
        assert_eq!(cfg.expected_zone_count, 263);
        assert_eq!(cfg.batch_size, 50_000);
        assert!(cfg.max_rows.is_none());
        assert!((cfg.risk_weights.density + cfg.risk_weights.late_night
            + cfg.risk_weights.volatility
            - 1.0)
            .abs()
            < 1e-9);
    }

    #[test]
    fn late_night_wraps_midnight() {
        let cfg = PipelineConfig::default();
        assert!(cfg.is_late_night(23));
        assert!(cfg.is_late_night(0));
        assert!(cfg.is_late_night(5));
        assert!(!cfg.is_late_night(6));
        assert!(!cfg.is_late_night(21));
    }

    #[test]
    fn partial_toml_overlay_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_fare = 250.0\nbatch_size = 100").unwrap();
        writeln!(file, "[risk_weights]\ndensity = 0.5").unwrap();

        let cfg = PipelineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(cfg.max_fare, 250.0);
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.risk_weights.density, 0.5);
        // Untouched fields keep defaults
        assert_eq!(cfg.max_distance_miles, 50.0);
        assert_eq!(cfg.valid_rate_codes, vec![1, 2, 3, 4, 5]);
    }
}
