//! Controller and simulator configuration.
//!
//! Defaults reproduce the reference tuning of the interleave controller.
//! Each controller field can be overridden from the environment:
//! - `DMI_MIN_STEP`: dead-zone width (steps smaller than this are dropped).
//! - `DMI_MAX_STEP`: saturation limit for a single ratio move.
//! - `DMI_LOW_BW_THRESHOLD`: bandwidth (MB/s scale of the telemetry) below
//!   which the controller keeps moving at its previous step magnitude.
//! - `DMI_STEP_ROUNDING`: `nearest` (default) or `toward-zero`.
//!
//! Unparsable values are ignored and the default is kept.

use serde::{Deserialize, Serialize};

use crate::error::DmiError;

pub const ENV_MIN_STEP: &str = "DMI_MIN_STEP";
pub const ENV_MAX_STEP: &str = "DMI_MAX_STEP";
pub const ENV_LOW_BW_THRESHOLD: &str = "DMI_LOW_BW_THRESHOLD";
pub const ENV_STEP_ROUNDING: &str = "DMI_STEP_ROUNDING";

/// How a fractional step is turned into a whole-percent ratio move.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepRounding {
    /// Round half away from zero.
    #[default]
    Nearest,
    /// Truncate toward zero. Matches traces recorded by the original
    /// calibration tool.
    TowardZero,
}

impl StepRounding {
    /// Parse from string (case-insensitive). Unknown values map to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "toward-zero" | "toward_zero" | "trunc" | "truncate" => Self::TowardZero,
            _ => Self::Nearest,
        }
    }

    /// Apply the rounding mode to a fractional step.
    #[must_use]
    pub fn apply(self, value: f64) -> i32 {
        let rounded = match self {
            Self::Nearest => value.round(),
            Self::TowardZero => value.trunc(),
        };
        // Saturating float-to-int cast; saturation clamps the result anyway.
        rounded as i32
    }
}

/// Tunables of the ratio control law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Dead zone: steps with magnitude below this are suppressed.
    pub min_step: i32,
    /// Saturation: steps are clamped to `±max_step`.
    pub max_step: i32,
    /// Observed bandwidth below this triggers the low-bandwidth escape.
    pub low_bandwidth_threshold: f64,
    pub rounding: StepRounding,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_step: 2,
            max_step: 8,
            low_bandwidth_threshold: 250.0,
            rounding: StepRounding::Nearest,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by any `DMI_*` variables present in the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Split out of [`Self::from_env`] so the
    /// parsing can be tested without touching the process environment.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MIN_STEP).and_then(|v| v.trim().parse().ok()) {
            self.min_step = v;
        }
        if let Some(v) = lookup(ENV_MAX_STEP).and_then(|v| v.trim().parse().ok()) {
            self.max_step = v;
        }
        if let Some(v) = lookup(ENV_LOW_BW_THRESHOLD).and_then(|v| v.trim().parse().ok()) {
            self.low_bandwidth_threshold = v;
        }
        if let Some(v) = lookup(ENV_STEP_ROUNDING) {
            self.rounding = StepRounding::from_str_loose(&v);
        }
        self
    }

    /// Reject configurations the control law cannot run with.
    pub fn validate(&self) -> Result<(), DmiError> {
        if self.min_step < 0 {
            return Err(DmiError::InvalidConfig(format!(
                "min_step {} is negative",
                self.min_step
            )));
        }
        if self.max_step <= 0 {
            return Err(DmiError::InvalidConfig(format!(
                "max_step {} must be positive",
                self.max_step
            )));
        }
        if self.min_step > self.max_step {
            return Err(DmiError::InvalidConfig(format!(
                "min_step {} exceeds max_step {}",
                self.min_step, self.max_step
            )));
        }
        if !self.low_bandwidth_threshold.is_finite() || self.low_bandwidth_threshold < 0.0 {
            return Err(DmiError::InvalidConfig(format!(
                "low_bandwidth_threshold {} must be finite and non-negative",
                self.low_bandwidth_threshold
            )));
        }
        Ok(())
    }
}

/// Tunables of the closed-loop simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Ratio the loop starts from (100 = all local).
    pub initial_ratio: u8,
    /// Sentinel "previous bandwidth" for the first iteration. Must be non-zero.
    pub initial_bandwidth: f64,
    /// No-op points recorded after primary convergence, before the phase switch.
    pub hold_iterations: usize,
    /// Hard cap on recorded points.
    pub max_iterations: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_ratio: crate::MAX_RATIO,
            initial_bandwidth: 1.0,
            hold_iterations: 3,
            max_iterations: 1000,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), DmiError> {
        if self.initial_ratio > crate::MAX_RATIO {
            return Err(DmiError::InvalidConfig(format!(
                "initial_ratio {} exceeds {}",
                self.initial_ratio,
                crate::MAX_RATIO
            )));
        }
        if !self.initial_bandwidth.is_finite() || self.initial_bandwidth == 0.0 {
            return Err(DmiError::InvalidConfig(format!(
                "initial_bandwidth {} must be finite and non-zero",
                self.initial_bandwidth
            )));
        }
        if self.max_iterations == 0 {
            return Err(DmiError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
