//! Readers for bandwidth-monitor and latency-monitor output.
//!
//! Three formats are supported:
//!
//! - **Bandwidth records**: blocks of a local line and a remote line each
//!   containing `Total <n> MB/s`, a `<label>: <n>` total line, and a blank
//!   separator. A block that is not exactly those three lines, or whose lines
//!   do not match, is skipped and reported; a short trailing block ends the
//!   read.
//! - **Node stream**: free-form monitor output where only
//!   `Node <id>: ... Total <n> MB/s` lines are meaningful. Node 0 is local,
//!   node 1 remote; any other node is an error.
//! - **Latency stream**: every non-blank line must be
//!   `local <cycles> remote <cycles>`. Unlike the bandwidth readers, the first
//!   bad line fails the whole read.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use dmi_core::{BandwidthSample, DmiError};

use crate::error::HarnessError;

static NODE_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total (\d+) MB/s").expect("valid regex")
});
static LABELED_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:]+:\s*(\d+)\s*$").expect("valid regex")
});
static NODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Node (\d): .* Total (\d+) MB/s").expect("valid regex")
});
static LATENCY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"local (\d+) remote (\d+)").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Bandwidth records
// ---------------------------------------------------------------------------

/// Result of reading a bandwidth record stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordRead {
    /// Parsed samples in arrival order.
    pub samples: Vec<BandwidthSample>,
    /// One entry per skipped record, pointing at the first bad line.
    pub skipped: Vec<DmiError>,
    /// The stream ended inside a record.
    pub truncated: bool,
}

fn malformed(line: usize, content: &str) -> DmiError {
    DmiError::MalformedTelemetryRecord {
        line,
        content: content.to_string(),
    }
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn parse_record(block: &[(usize, &str)]) -> Result<BandwidthSample, DmiError> {
    let [(local_no, local), (remote_no, remote), (total_no, total)] = block else {
        // Wrong line count: report the first extra line, or the block start.
        let (line, content) = block.get(3).or(block.first()).copied().unwrap_or((0, ""));
        return Err(malformed(line, content));
    };
    let local_bw = capture_u64(&NODE_TOTAL, local).ok_or_else(|| malformed(*local_no, local))?;
    let remote_bw =
        capture_u64(&NODE_TOTAL, remote).ok_or_else(|| malformed(*remote_no, remote))?;
    let total_bw =
        capture_u64(&LABELED_TOTAL, total).ok_or_else(|| malformed(*total_no, total))?;
    Ok(BandwidthSample::new(
        local_bw as f64,
        remote_bw as f64,
        total_bw as f64,
    ))
}

/// Parse bandwidth records from text.
///
/// Records are blank-line delimited blocks, so a malformed block never
/// consumes lines of its neighbours.
#[must_use]
pub fn parse_bandwidth_records(text: &str) -> RecordRead {
    let mut blocks: Vec<Vec<(usize, &str)>> = Vec::new();
    let mut current = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push((i + 1, line));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let mut out = RecordRead::default();
    let last = blocks.len().saturating_sub(1);
    for (idx, block) in blocks.iter().enumerate() {
        if block.len() < 3 && idx == last {
            out.truncated = true;
            break;
        }
        match parse_record(block) {
            Ok(sample) => out.samples.push(sample),
            Err(err) => out.skipped.push(err),
        }
    }
    out
}

/// Read bandwidth records from a file.
pub fn read_bandwidth_records(path: &Path) -> Result<RecordRead, HarnessError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_bandwidth_records(&content))
}

// ---------------------------------------------------------------------------
// Node stream
// ---------------------------------------------------------------------------

/// Per-node bandwidth series (MB/s) in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSeries {
    pub local: Vec<f64>,
    pub remote: Vec<f64>,
}

impl NodeSeries {
    /// Pair local and remote ticks into samples. A local-only series is
    /// allowed; its remote bandwidth is zero.
    #[must_use]
    pub fn samples(&self) -> Vec<BandwidthSample> {
        self.local
            .iter()
            .enumerate()
            .map(|(i, &local)| {
                let remote = self.remote.get(i).copied().unwrap_or(0.0);
                BandwidthSample::new(local, remote, local + remote)
            })
            .collect()
    }
}

/// Parse per-node monitor output.
pub fn parse_node_bandwidth(text: &str) -> Result<NodeSeries, HarnessError> {
    let mut series = NodeSeries::default();
    for (i, line) in text.lines().enumerate() {
        let Some(caps) = NODE_LINE.captures(line) else {
            continue;
        };
        let (Some(node), Some(bw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let node: u32 = node
            .as_str()
            .parse()
            .map_err(|_| HarnessError::Dmi(malformed(i + 1, line)))?;
        let bw: f64 = bw
            .as_str()
            .parse()
            .map_err(|_| HarnessError::Dmi(malformed(i + 1, line)))?;
        match node {
            0 => series.local.push(bw),
            1 => series.remote.push(bw),
            _ => return Err(HarnessError::InvalidNode { node, line: i + 1 }),
        }
    }

    if series.local.len() != series.remote.len() && !series.remote.is_empty() {
        return Err(HarnessError::MismatchedSeries {
            local: series.local.len(),
            remote: series.remote.len(),
        });
    }
    Ok(series)
}

pub fn read_node_bandwidth(path: &Path) -> Result<NodeSeries, HarnessError> {
    let content = std::fs::read_to_string(path)?;
    parse_node_bandwidth(&content)
}

// ---------------------------------------------------------------------------
// Latency stream
// ---------------------------------------------------------------------------

/// Access latency (cycles) of one sampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySample {
    pub local: u64,
    pub remote: u64,
}

/// Parse latency samples; any non-matching non-blank line is fatal.
pub fn parse_latency(text: &str) -> Result<Vec<LatencySample>, HarnessError> {
    let mut samples = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut matches = LATENCY_LINE.captures_iter(line);
        let (Some(caps), None) = (matches.next(), matches.next()) else {
            return Err(malformed(i + 1, line).into());
        };
        let parse = |idx: usize| -> Result<u64, HarnessError> {
            caps.get(idx)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(|| malformed(i + 1, line).into())
        };
        samples.push(LatencySample {
            local: parse(1)?,
            remote: parse(2)?,
        });
    }
    Ok(samples)
}

/// Aggregate view of a latency stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_local: f64,
    pub mean_remote: f64,
    pub max_local: u64,
    pub max_remote: u64,
}

impl LatencySummary {
    #[must_use]
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let sum_local: u64 = samples.iter().map(|s| s.local).sum();
        let sum_remote: u64 = samples.iter().map(|s| s.remote).sum();
        Self {
            samples: samples.len(),
            mean_local: sum_local as f64 / n,
            mean_remote: sum_remote as f64 / n,
            max_local: samples.iter().map(|s| s.local).max().unwrap_or(0),
            max_remote: samples.iter().map(|s| s.remote).max().unwrap_or(0),
        }
    }
}

pub fn read_latency(path: &Path) -> Result<Vec<LatencySample>, HarnessError> {
    let content = std::fs::read_to_string(path)?;
    parse_latency(&content)
}
