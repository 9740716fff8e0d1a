//! Trip-Risk Backend Library
//!
//! Ingests raw per-trip transportation records, validates them against
//! business and plausibility rules, derives per-trip features, then
//! aggregates the survivors into zone-hour exposure statistics, zone
//! revenue volatility statistics, and a composite risk score per zone-hour
//! bucket for downstream insurance pricing tooling.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod sinks;
pub mod stats;
pub mod validation;
pub mod zones;
