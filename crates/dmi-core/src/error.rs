//! Error type shared by every DMI component.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DmiError {
    #[error("invalid percentile {0}: must be within [0, 100]")]
    InvalidPercentile(i32),
    #[error("cannot select a percentile from an empty sample set")]
    EmptySampleSet,
    #[error("ratio {ratio} out of range: curve covers [{min}, {max}]")]
    RatioOutOfRange { ratio: u32, min: u8, max: u8 },
    #[error("division by zero in {context}: previous bandwidth is 0")]
    DivisionByZero { context: &'static str },
    #[error("malformed telemetry record at line {line}: {content:?}")]
    MalformedTelemetryRecord { line: usize, content: String },
    #[error("no convergence after {iterations} iterations")]
    ConvergenceTimeout { iterations: usize },
    #[error("bandwidth curve has no points")]
    EmptyCurve,
    #[error("duplicate ratio {0} in bandwidth curve")]
    DuplicateRatio(u8),
    #[error("invalid bandwidth {value} at ratio {ratio}")]
    InvalidBandwidth { ratio: u8, value: f64 },
    #[error("invalid controller config: {0}")]
    InvalidConfig(String),
}
