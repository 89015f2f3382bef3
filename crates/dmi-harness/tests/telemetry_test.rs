//! Integration test: telemetry readers against recorded monitor output.
//!
//! Validates that:
//! 1. Bandwidth records skip the malformed record and keep arrival order.
//! 2. The 95th percentile of the recorded window is the expected sample.
//! 3. The per-node stream pairs node 0/1 ticks into samples.
//! 4. The latency stream summarizes and rejects malformed lines.
//! 5. CSV curve tables load and match the built-in reference fixtures.
//! 6. Recorded windows replay through the controller with the warm-up half
//!    of each window dropped.
//!
//! Run: cargo test -p dmi-harness --test telemetry_test

use std::path::{Path, PathBuf};

use dmi_core::{
    BandwidthSample, ControllerConfig, DEFAULT_PERCENTILE, DEFAULT_WINDOW_PERCENTILE, DmiError,
    RatioState, StepRule, WindowedController, select_percentile,
};
use dmi_harness::curve_file::{DEFAULT_BANDWIDTH_COLUMN, load_curve, load_curve_any};
use dmi_harness::telemetry::{
    LatencySummary, parse_latency, read_bandwidth_records, read_latency, read_node_bandwidth,
};
use dmi_harness::{CurveFixture, HarnessError};

fn workspace_root() -> PathBuf {
    let manifest = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    workspace_root().join("tests/fixtures").join(name)
}

#[test]
fn records_skip_malformed_block() {
    let read = read_bandwidth_records(&fixture("bwmon_records.txt")).expect("records should load");
    let totals: Vec<f64> = read.samples.iter().map(|s| s.total).collect();
    assert_eq!(totals, vec![75000.0, 92000.0, 84000.0, 78000.0]);
    assert_eq!(read.skipped.len(), 1);
    assert!(matches!(
        &read.skipped[0],
        DmiError::MalformedTelemetryRecord { line: 10, content } if content.contains("unavailable")
    ));
    assert!(!read.truncated);
}

#[test]
fn percentile_of_recorded_window() {
    let read = read_bandwidth_records(&fixture("bwmon_records.txt")).unwrap();
    let p95 = select_percentile(&read.samples, DEFAULT_PERCENTILE).unwrap();
    assert_eq!(p95, BandwidthSample::new(56000.0, 28000.0, 84000.0));
    let p50 = select_percentile(&read.samples, 50).unwrap();
    assert_eq!(p50.total, 78000.0);
    assert_eq!(
        select_percentile(&read.samples, 101),
        Err(DmiError::InvalidPercentile(101))
    );
}

#[test]
fn recorded_windows_replay_through_controller() {
    let read = read_bandwidth_records(&fixture("bwmon_records.txt")).unwrap();
    let mut ctl = WindowedController::new(
        ControllerConfig::default(),
        DEFAULT_WINDOW_PERCENTILE,
        RatioState::new(100, 0, 1.0),
    )
    .unwrap();
    let steps = ctl.replay(read.samples.chunks_exact(2)).unwrap();

    let observed: Vec<f64> = steps.iter().map(|s| s.reading.sample.total).collect();
    assert_eq!(observed, vec![92000.0, 78000.0]);
    assert!(steps.iter().all(|s| s.reading.discarded == 1));
    let ratios: Vec<u8> = steps.iter().map(|s| s.state.ratio).collect();
    assert_eq!(ratios, vec![92, 96]);
    assert_eq!(steps[0].decision.rule, StepRule::ColdStart);
    assert_eq!(steps[1].decision.rule, StepRule::Regressing);
    assert_eq!(ctl.state().bandwidth, 78000.0);
}

#[test]
fn node_stream_pairs_ticks() {
    let series = read_node_bandwidth(&fixture("bwmon_node.txt")).expect("node stream should load");
    assert_eq!(series.local, vec![50000.0, 62000.0, 56000.0]);
    assert_eq!(series.remote, vec![25000.0, 30000.0, 28000.0]);
    let samples = series.samples();
    let p95 = select_percentile(&samples, DEFAULT_PERCENTILE).unwrap();
    assert_eq!(p95, BandwidthSample::new(56000.0, 28000.0, 84000.0));
}

#[test]
fn latency_stream_summary() {
    let samples = read_latency(&fixture("latency.txt")).expect("latency should load");
    assert_eq!(samples.len(), 4);
    let summary = LatencySummary::from_samples(&samples);
    assert_eq!(summary.mean_local, 115.0);
    assert_eq!(summary.mean_remote, 301.0);
    assert_eq!(summary.max_local, 121);
    assert_eq!(summary.max_remote, 310);
}

#[test]
fn latency_stream_is_strict() {
    let err = parse_latency("local 1 remote 2\nremote 3 local 4\n").unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Dmi(DmiError::MalformedTelemetryRecord { line: 2, .. })
    ));
}

#[test]
fn missing_telemetry_file_is_io_error() {
    let err = read_bandwidth_records(&fixture("does_not_exist.txt")).unwrap_err();
    assert!(matches!(err, HarnessError::Io(_)));
}

#[test]
fn csv_curves_match_builtin_fixtures() {
    let primary = load_curve(&fixture("reference_primary.csv"), DEFAULT_BANDWIDTH_COLUMN)
        .expect("primary curve should load");
    let builtin = CurveFixture::reference_primary().to_curve().unwrap();
    assert_eq!(primary, builtin);
    assert_eq!(primary.get(65).unwrap(), 654.157);

    let secondary = load_curve_any(&fixture("reference_secondary.csv"), DEFAULT_BANDWIDTH_COLUMN)
        .expect("secondary curve should load");
    assert_eq!(secondary, CurveFixture::reference_secondary().to_curve().unwrap());
    assert_eq!(secondary.peak(), (88, 404.946));
}

#[test]
fn runtime_column_loads_as_alternate_curve() {
    let runtime = load_curve(&fixture("reference_primary.csv"), "Runtime").unwrap();
    assert_eq!(runtime.get(70).unwrap(), 9.8);
}
