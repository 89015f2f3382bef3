//! Offline tooling around the DMI controller.
//!
//! This crate provides:
//! - Telemetry readers: bandwidth records, per-node bandwidth monitor output,
//!   and access-latency samples
//! - Curve loading: bandwidth-vs-ratio CSV tables and JSON curve fixtures
//! - Simulation runner: closed-loop runs with structured JSONL logging
//! - Trace export: JSON/CSV controller traces plus an artifact index

#![forbid(unsafe_code)]

pub mod curve_file;
pub mod error;
pub mod fixtures;
pub mod runner;
pub mod structured_log;
pub mod telemetry;
pub mod trace_export;

pub use error::HarnessError;
pub use fixtures::CurveFixture;
pub use runner::{RunConfig, SimulationRunner};
