//! Structured logging contract for DMI simulation and telemetry runs.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`ArtifactIndex`]: links logs to exported traces with SHA-256 integrity.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

use dmi_core::{Phase, StepDecision, TracePoint};

/// Event name of a per-iteration controller decision.
pub const EVENT_CONTROLLER_STEP: &str = "controller_step";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];
const OUTCOMES: [&str; 4] = ["pass", "fail", "error", "timeout"];
const PHASES: [&str; 2] = ["primary", "secondary"];
const RULES: [&str; 4] = [
    "LowBandwidthEscape",
    "ColdStart",
    "Improving",
    "Regressing",
];

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
    Timeout,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Emitting component (`simulator`, `telemetry`, `cli`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
    /// Control-law branch (`ColdStart|Improving|Regressing|LowBandwidthEscape`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            component: None,
            phase: None,
            iteration: None,
            ratio: None,
            step: None,
            bandwidth: None,
            rule: None,
            outcome: None,
            duration_ms: None,
            artifact_refs: None,
            details: None,
        }
    }

    /// Set the run ID.
    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Copy iteration, phase, ratio, step and bandwidth from a trace point.
    #[must_use]
    pub fn with_point(mut self, point: &TracePoint) -> Self {
        self.phase = Some(point.phase);
        self.iteration = Some(point.iteration);
        self.ratio = Some(point.ratio);
        self.step = Some(point.step);
        self.bandwidth = Some(point.bandwidth);
        self
    }

    /// Attach the controller decision that produced the point.
    #[must_use]
    pub fn with_decision(mut self, decision: &StepDecision) -> Self {
        self.rule = Some(decision.rule.as_str().to_string());
        self.details = Some(serde_json::json!({
            "proposed_step": decision.proposed_step,
            "dead_zone": decision.dead_zone,
            "saturated": decision.saturated,
            "ratio_clamped": decision.ratio_clamped,
        }));
        self
    }

    /// Set the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Set duration in milliseconds.
    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Add artifact references.
    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

/// A single artifact entry in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Artifact index linking a run's log to the files it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an artifact entry with a precomputed digest.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
            description: None,
        });
        self
    }

    /// Hash a file on disk and add it.
    pub fn add_file(&mut self, path: &Path, kind: impl Into<String>) -> std::io::Result<&mut Self> {
        let bytes = std::fs::read(path)?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&bytes),
            size_bytes: Some(bytes.len() as u64),
            description: None,
        });
        Ok(self)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lowercase hex SHA-256 digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a file or buffer.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
    component: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str, component: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(
            Box::new(std::io::BufWriter::new(file)),
            run_id,
            component,
        ))
    }

    /// Create an emitter over an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write>, run_id: &str, component: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
            component: component.to_string(),
        }
    }

    /// Create an emitter that discards output (for runs without `--log`).
    #[must_use]
    pub fn sink(run_id: &str, component: &str) -> Self {
        Self::to_writer(Box::new(std::io::sink()), run_id, component)
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Generate the next trace ID.
    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.run_id, self.component, self.seq)
    }

    /// Start an entry with auto-generated trace_id, run_id and component.
    pub fn entry(&mut self, level: LogLevel, event: &str) -> LogEntry {
        let trace_id = self.next_trace_id();
        LogEntry::new(trace_id, level, event)
            .with_run(self.run_id.clone())
            .with_component(self.component.clone())
    }

    /// Emit a log entry with only the auto-generated fields.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = self.entry(level, event);
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

fn check_vocab(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    allowed: &[&str],
    line_number: usize,
    errors: &mut Vec<LogValidationError>,
) {
    if let Some(value) = obj.get(field).and_then(|v| v.as_str())
        && !allowed.contains(&value)
    {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message: format!("invalid {field}: '{value}'"),
        });
    }
}

/// Validate a single JSONL line against the schema.
///
/// Returns the parsed entry if valid, or a list of validation errors.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    // Required fields
    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    check_vocab(obj, "level", &LEVELS, line_number, &mut errors);
    check_vocab(obj, "outcome", &OUTCOMES, line_number, &mut errors);
    check_vocab(obj, "phase", &PHASES, line_number, &mut errors);
    check_vocab(obj, "rule", &RULES, line_number, &mut errors);

    // Controller step events must be explainable on their own.
    if obj.get("event").and_then(|v| v.as_str()) == Some(EVENT_CONTROLLER_STEP) {
        for field in ["iteration", "phase", "ratio", "step", "bandwidth", "rule"] {
            if obj.get(field).is_none_or(serde_json::Value::is_null) {
                errors.push(LogValidationError {
                    line_number,
                    field: field.to_string(),
                    message: format!("{EVENT_CONTROLLER_STEP} events must include {field}"),
                });
            }
        }
    }

    if let Some(ratio) = obj.get("ratio").and_then(serde_json::Value::as_u64)
        && ratio > 100
    {
        errors.push(LogValidationError {
            line_number,
            field: "ratio".to_string(),
            message: format!("ratio {ratio} outside [0, 100]"),
        });
    }

    // Validate trace_id format: should contain ::
    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError {
            line_number,
            field: "trace_id".to_string(),
            message: format!(
                "trace_id should follow <run_id>::<component>::<seq> format, got: '{trace_id}'"
            ),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // If validation passed, try full deserialization
    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<deserialization>".to_string(),
                message: format!("failed to deserialize: {e}"),
            });
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the total line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 3339 UTC timestamp with millisecond precision.
fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

// Days since 1970-01-01 to proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
