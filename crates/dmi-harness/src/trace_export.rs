//! Controller trace export.
//!
//! JSON carries the full [`SimulationTrace`] including convergence markers.
//! CSV carries one row per point: `iteration,phase,ratio,step,bandwidth`.

use std::io::Write;
use std::path::Path;

use dmi_core::SimulationTrace;

use crate::error::HarnessError;
use crate::structured_log::{ArtifactIndex, sha256_hex};

/// Output format of an exported trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TraceFormat {
    #[default]
    Json,
    Csv,
}

impl TraceFormat {
    /// Artifact kind recorded in the index.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Json => "trace_json",
            Self::Csv => "trace_csv",
        }
    }
}

pub const CSV_HEADER: [&str; 5] = ["iteration", "phase", "ratio", "step", "bandwidth"];

pub fn to_json(trace: &SimulationTrace) -> Result<String, HarnessError> {
    Ok(serde_json::to_string_pretty(trace)?)
}

pub fn write_csv<W: Write>(trace: &SimulationTrace, writer: W) -> Result<(), HarnessError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for p in &trace.points {
        wtr.write_record([
            p.iteration.to_string(),
            p.phase.as_str().to_string(),
            p.ratio.to_string(),
            p.step.to_string(),
            p.bandwidth.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv(trace: &SimulationTrace) -> Result<String, HarnessError> {
    let mut buf = Vec::new();
    write_csv(trace, &mut buf)?;
    String::from_utf8(buf).map_err(|e| HarnessError::Io(std::io::Error::other(e)))
}

/// Render `trace` in `format`.
pub fn render(trace: &SimulationTrace, format: TraceFormat) -> Result<String, HarnessError> {
    match format {
        TraceFormat::Json => to_json(trace),
        TraceFormat::Csv => to_csv(trace),
    }
}

/// Write `trace` to `path` and record it in `index`. Returns the SHA-256 of
/// the written bytes.
pub fn export(
    trace: &SimulationTrace,
    format: TraceFormat,
    path: &Path,
    index: &mut ArtifactIndex,
) -> Result<String, HarnessError> {
    let body = render(trace, format)?;
    std::fs::write(path, &body)?;
    let digest = sha256_hex(body.as_bytes());
    index.add(path.display().to_string(), format.kind(), digest.clone());
    Ok(digest)
}
