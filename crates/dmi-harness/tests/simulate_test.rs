//! Integration test: end-to-end simulation run with logging and export.
//!
//! Validates that:
//! 1. A two-phase run over the recorded CSV curves reproduces the reference trace.
//! 2. The JSONL log written to disk passes schema validation.
//! 3. Exported traces are indexed with matching SHA-256 digests.
//! 4. JSON curve fixtures load the same curve as the CSV tables.
//! 5. A too-small iteration cap fails with a timeout and a logged outcome.
//!
//! Run: cargo test -p dmi-harness --test simulate_test

use std::path::{Path, PathBuf};

use dmi_core::{DmiError, SimulatorConfig, StepRounding};
use dmi_harness::curve_file::{DEFAULT_BANDWIDTH_COLUMN, load_curve_any};
use dmi_harness::structured_log::{ArtifactIndex, LogEmitter, sha256_hex, validate_log_file};
use dmi_harness::trace_export::{self, TraceFormat};
use dmi_harness::{CurveFixture, HarnessError, RunConfig, SimulationRunner};

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

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dmi-harness-{}-{test}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

fn load(name: &str) -> dmi_core::BandwidthCurve {
    load_curve_any(&fixture(name), DEFAULT_BANDWIDTH_COLUMN).expect("curve should load")
}

#[test]
fn two_phase_run_reproduces_reference_trace() {
    let dir = scratch_dir("reference");
    let log_path = dir.join("run.jsonl");
    let mut log = LogEmitter::to_file(&log_path, "it-ref", "simulator").unwrap();

    let trace = SimulationRunner::new(RunConfig::default())
        .run(
            load("reference_primary.csv"),
            Some(load("reference_secondary.csv")),
            &mut log,
        )
        .expect("reference run converges");
    drop(log);

    assert_eq!(
        trace.ratios(),
        vec![100, 92, 85, 78, 71, 69, 69, 69, 69, 69, 77, 85, 91, 88, 88]
    );
    assert_eq!(trace.primary_converged_at, Some(6));
    assert_eq!(trace.switched_at, Some(10));
    assert_eq!(trace.secondary_converged_at, Some(14));

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert!(errors.is_empty(), "schema violations: {errors:?}");
    // start + 11 steps + 3 holds + 2 converged + 1 switch + complete
    assert_eq!(lines, 19);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn truncating_rounding_reproduces_recorded_trace() {
    let mut config = RunConfig::default();
    config.controller.rounding = StepRounding::TowardZero;
    let trace = SimulationRunner::new(config)
        .run(
            load("reference_primary.csv"),
            Some(load("reference_secondary.csv")),
            &mut LogEmitter::sink("it-trunc", "simulator"),
        )
        .unwrap();
    assert_eq!(
        trace.ratios(),
        vec![100, 92, 86, 80, 74, 70, 70, 70, 70, 70, 78, 86, 91, 89, 89]
    );
}

#[test]
fn exported_traces_are_indexed() {
    let dir = scratch_dir("export");
    let trace = SimulationRunner::new(RunConfig::default())
        .run(
            load("reference_primary.csv"),
            None,
            &mut LogEmitter::sink("it-export", "simulator"),
        )
        .unwrap();

    let mut index = ArtifactIndex::new("it-export");
    let json_path = dir.join("trace.json");
    let csv_path = dir.join("trace.csv");
    let json_digest = trace_export::export(&trace, TraceFormat::Json, &json_path, &mut index).unwrap();
    let csv_digest = trace_export::export(&trace, TraceFormat::Csv, &csv_path, &mut index).unwrap();

    assert_eq!(json_digest, sha256_hex(&std::fs::read(&json_path).unwrap()));
    assert_eq!(csv_digest, sha256_hex(&std::fs::read(&csv_path).unwrap()));
    assert_eq!(index.artifacts.len(), 2);
    assert_eq!(index.artifacts[1].kind, "trace_csv");

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), trace.len() + 1);
    assert!(csv.lines().last().unwrap().starts_with("6,primary,69,0,"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn json_fixture_file_matches_csv_table() {
    let dir = scratch_dir("fixture");
    let path = dir.join("primary.json");
    std::fs::write(&path, CurveFixture::reference_primary().to_json().unwrap()).unwrap();
    let from_json = load_curve_any(&path, DEFAULT_BANDWIDTH_COLUMN).unwrap();
    assert_eq!(from_json, load("reference_primary.csv"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn iteration_cap_times_out() {
    let dir = scratch_dir("timeout");
    let log_path = dir.join("run.jsonl");
    let mut log = LogEmitter::to_file(&log_path, "it-cap", "simulator").unwrap();
    let config = RunConfig {
        simulator: SimulatorConfig {
            max_iterations: 8,
            ..SimulatorConfig::default()
        },
        ..RunConfig::default()
    };
    let err = SimulationRunner::new(config)
        .run(
            load("reference_primary.csv"),
            Some(load("reference_secondary.csv")),
            &mut log,
        )
        .unwrap_err();
    drop(log);
    assert!(matches!(
        err,
        HarnessError::Dmi(DmiError::ConvergenceTimeout { iterations: 8 })
    ));

    let content = std::fs::read_to_string(&log_path).unwrap();
    let last: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
    assert_eq!(last["event"], "simulation_failed");
    assert_eq!(last["outcome"], "timeout");
    let _ = std::fs::remove_dir_all(&dir);
}
