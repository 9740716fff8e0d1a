//! End-to-end pipeline integration tests
//!
//! Drives the full clean -> aggregate -> score chain over small fixture
//! inputs and checks the persisted artifacts: cleaned CSV, exclusion
//! ledger, and the three metrics JSON files.

use std::fs;
use std::path::Path;

use triprisk_backend::config::PipelineConfig;
use triprisk_backend::models::ZoneHourKey;
use triprisk_backend::pipeline::{CleaningOutcome, CleaningPipeline};
use triprisk_backend::risk::compute_risk_scores;
use triprisk_backend::sinks;
use triprisk_backend::stats::{compute_zone_hour_metrics, compute_zone_revenue_metrics};
use triprisk_backend::zones::ZoneCatalog;

const HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,RatecodeID,store_and_fwd_flag,PULocationID,DOLocationID,payment_type,fare_amount,extra,mta_tax,tip_amount,tolls_amount,improvement_surcharge,total_amount,congestion_surcharge";

/// Five raw records: three valid (zone 10 hour 8 x2, zone 10 hour 23 x1),
/// one with a broken timestamp, one with a fare over the cap.
fn scenario_input() -> String {
    [
        HEADER,
        "1,2019-01-10 08:00:00,2019-01-10 08:20:00,1,2.5,1,N,10,12,1,12.00,0.5,0.5,1.0,0,0.3,14.30,0",
        "1,not-a-timestamp,2019-01-10 09:00:00,1,2.5,1,N,10,12,1,10.00,0,0,0,0,0.3,10.30,0",
        "2,2019-01-10 08:30:00,2019-01-10 08:50:00,2,3.0,1,N,10,14,1,15.00,0.5,0.5,2.0,0,0.3,18.30,0",
        "1,2019-01-10 10:00:00,2019-01-10 10:20:00,1,2.0,1,N,10,12,1,600,0,0,0,0,0.3,600.30,0",
        "2,2019-01-10 23:10:00,2019-01-10 23:30:00,1,4.0,1,N,10,16,2,20.00,0.5,0.5,0,0,0.3,21.30,0",
    ]
    .join("\n")
}

fn run_cleaning(config: PipelineConfig, input: &str) -> CleaningOutcome {
    let pipeline = CleaningPipeline::new(config, ZoneCatalog::from_range(263));
    let reader = csv::Reader::from_reader(input.as_bytes());
    pipeline.run(reader).unwrap()
}

fn write_input(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("raw_trips.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn end_to_end_scenario_matches_expected_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();

    let input_path = write_input(dir.path(), &scenario_input());
    let pipeline = CleaningPipeline::new(config.clone(), ZoneCatalog::from_range(263));
    let outcome = pipeline.run_file(&input_path).unwrap();

    assert_eq!(outcome.stats.total_processed, 5);
    assert_eq!(outcome.stats.total_valid, 3);
    assert_eq!(outcome.stats.total_excluded, 2);

    // Persist cleaned output and ledger
    let cleaned_path = dir.path().join("cleaned_trips.csv");
    let excluded_path = dir.path().join("excluded_records.log");
    sinks::write_cleaned_trips(&cleaned_path, &outcome.trips).unwrap();
    sinks::write_exclusion_log(&excluded_path, &outcome.exclusions).unwrap();

    // Exclusion ledger: exactly two entries, in source order, with the
    // expected reasons
    let ledger = fs::read_to_string(&excluded_path).unwrap();
    let lines: Vec<&str> = ledger.lines().collect();
    assert_eq!(
        lines,
        vec![
            "index,reason",
            "2,invalid_datetime_format",
            "4,fare_exceeds_max"
        ]
    );

    // Score from the persisted cleaned file, as the standalone score stage
    // does
    let trips = sinks::read_cleaned_trips(&cleaned_path).unwrap();
    assert_eq!(trips.len(), 3);

    let exposure = compute_zone_hour_metrics(&trips);
    let revenue = compute_zone_revenue_metrics(&trips);
    let scores = compute_risk_scores(&exposure, &revenue, &config);

    // Zone-hour buckets: (10,8) count 2, (10,23) count 1
    assert_eq!(exposure.len(), 2);
    assert_eq!(exposure[&ZoneHourKey::new(10, 8)].trip_count, 2);
    assert_eq!(exposure[&ZoneHourKey::new(10, 23)].trip_count, 1);

    // Aggregation soundness
    let total: u64 = exposure.values().map(|m| m.trip_count).sum();
    assert_eq!(total, outcome.stats.total_valid);

    // Late-night component: present at hour 23, absent at hour 8
    let morning = &scores[&ZoneHourKey::new(10, 8)];
    let night = &scores[&ZoneHourKey::new(10, 23)];
    assert_eq!(morning.late_night_component, 0.0);
    assert!(night.late_night_component > 0.0);
    assert_eq!(night.late_night_component, config.risk_weights.late_night);

    // Metrics sinks produce key-addressable JSON
    let metrics_dir = dir.path().join("processed");
    sinks::write_zone_hour_metrics(&metrics_dir.join("zone_hour_metrics.json"), &exposure)
        .unwrap();
    sinks::write_zone_revenue_metrics(&metrics_dir.join("zone_revenue_metrics.json"), &revenue)
        .unwrap();
    sinks::write_risk_scores(&metrics_dir.join("zone_risk_scores.json"), &scores).unwrap();

    let exposure_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(metrics_dir.join("zone_hour_metrics.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(exposure_json["10_8"]["trip_count"], 2);
    assert_eq!(exposure_json["10_23"]["trip_count"], 1);

    let risk_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(metrics_dir.join("zone_risk_scores.json")).unwrap(),
    )
    .unwrap();
    assert!(risk_json["10_23"]["late_night_component"].as_f64().unwrap() > 0.0);
    assert_eq!(risk_json["10_8"]["late_night_component"].as_f64().unwrap(), 0.0);

    let revenue_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(metrics_dir.join("zone_revenue_metrics.json")).unwrap(),
    )
    .unwrap();
    assert!(revenue_json["10"]["revenue_std_dev"].as_f64().is_some());
}

#[test]
fn rerunning_identical_input_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();

    let mut artifacts: Vec<(String, String, String)> = Vec::new();
    for run in 0..2 {
        let run_dir = dir.path().join(format!("run{}", run));
        fs::create_dir_all(&run_dir).unwrap();

        let outcome = run_cleaning(config.clone(), &scenario_input());
        let cleaned = run_dir.join("cleaned_trips.csv");
        let excluded = run_dir.join("excluded_records.log");
        sinks::write_cleaned_trips(&cleaned, &outcome.trips).unwrap();
        sinks::write_exclusion_log(&excluded, &outcome.exclusions).unwrap();

        let exposure = compute_zone_hour_metrics(&outcome.trips);
        let revenue = compute_zone_revenue_metrics(&outcome.trips);
        let scores = compute_risk_scores(&exposure, &revenue, &config);
        let risk_path = run_dir.join("zone_risk_scores.json");
        sinks::write_risk_scores(&risk_path, &scores).unwrap();

        artifacts.push((
            fs::read_to_string(&cleaned).unwrap(),
            fs::read_to_string(&excluded).unwrap(),
            fs::read_to_string(&risk_path).unwrap(),
        ));
    }

    assert_eq!(artifacts[0].0, artifacts[1].0);
    assert_eq!(artifacts[0].1, artifacts[1].1);
    assert_eq!(artifacts[0].2, artifacts[1].2);
}

#[test]
fn batch_size_and_row_cap_compose() {
    // Identical validation outcomes for pathological batch sizes, and a row
    // cap that simply stops reading
    let baseline = run_cleaning(PipelineConfig::default(), &scenario_input());

    let tiny_batches = run_cleaning(
        PipelineConfig {
            batch_size: 1,
            ..PipelineConfig::default()
        },
        &scenario_input(),
    );
    assert_eq!(tiny_batches.stats.total_valid, baseline.stats.total_valid);
    assert_eq!(
        tiny_batches.stats.excluded_by_reason,
        baseline.stats.excluded_by_reason
    );

    let capped = run_cleaning(
        PipelineConfig {
            max_rows: Some(2),
            ..PipelineConfig::default()
        },
        &scenario_input(),
    );
    assert_eq!(capped.stats.total_processed, 2);
    assert_eq!(capped.stats.total_valid, 1);
    assert_eq!(capped.exclusions[0].index, 2);
}

#[test]
fn variance_fixture_via_full_pipeline() {
    // Three trips from one zone with totals 0, 10, 20: mean 10, population
    // variance 66.67, stddev ~8.165 stored as 8.16
    let input = [
        HEADER,
        "1,2019-01-10 08:00:00,2019-01-10 08:20:00,1,2.5,1,N,10,12,1,5.00,0,0,0,0,0,0,0",
        "1,2019-01-10 09:00:00,2019-01-10 09:20:00,1,2.5,1,N,10,12,1,5.00,0,0,0,0,0,10.00,0",
        "1,2019-01-10 10:00:00,2019-01-10 10:20:00,1,2.5,1,N,10,12,1,5.00,0,0,0,0,0,20.00,0",
    ]
    .join("\n");

    let outcome = run_cleaning(PipelineConfig::default(), &input);
    assert_eq!(outcome.stats.total_valid, 3);

    let revenue = compute_zone_revenue_metrics(&outcome.trips);
    let zone = &revenue[&10];
    assert_eq!(zone.avg_revenue, 10.0);
    assert_eq!(zone.revenue_variance, 66.67);
    assert_eq!(zone.revenue_std_dev, 8.16);
}

#[test]
fn missing_input_is_fatal_with_clear_context() {
    let pipeline = CleaningPipeline::new(PipelineConfig::default(), ZoneCatalog::from_range(263));
    let err = pipeline
        .run_file(Path::new("/nonexistent/raw_trips.csv"))
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/raw_trips.csv"));
}

#[test]
fn zone_lookup_fallback_is_exercised_end_to_end() {
    // A lookup with only a handful of zones triggers the contiguous-range
    // fallback, so records in high-numbered zones still validate
    let dir = tempfile::tempdir().unwrap();
    let lookup = dir.path().join("taxi_zone_lookup.csv");
    fs::write(&lookup, "LocationID,Borough,Zone\n1,A,X\n2,B,Y\n").unwrap();

    let config = PipelineConfig::default();
    let zones = ZoneCatalog::load(&lookup, config.expected_zone_count);
    assert!(zones.used_fallback());

    let input = [
        HEADER,
        "1,2019-01-10 08:00:00,2019-01-10 08:20:00,1,2.5,1,N,200,201,1,12.00,0,0,0,0,0,12.00,0",
    ]
    .join("\n");
    let pipeline = CleaningPipeline::new(config, zones);
    let outcome = pipeline
        .run(csv::Reader::from_reader(input.as_bytes()))
        .unwrap();
    assert_eq!(outcome.stats.total_valid, 1);
}

#[test]
fn scoring_empty_cleaned_set_produces_empty_metrics() {
    let config = PipelineConfig::default();
    let exposure = compute_zone_hour_metrics(&[]);
    let revenue = compute_zone_revenue_metrics(&[]);
    let scores = compute_risk_scores(&exposure, &revenue, &config);
    assert!(scores.is_empty());

    // Sinks still write valid (empty) JSON objects
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zone_risk_scores.json");
    sinks::write_risk_scores(&path, &scores).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed, serde_json::json!({}));
}
