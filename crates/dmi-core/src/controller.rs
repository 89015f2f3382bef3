//! # Ratio Controller: Bounded Hill Climbing on Interleave Ratio
//!
//! Each control period the controller observes one aggregate bandwidth value
//! and moves the interleave ratio toward higher bandwidth. The sign and
//! magnitude of the previous move act as momentum.
//!
//! ## Control law
//!
//! With `delta = (prev_bw - observed) / prev_bw`:
//!
//! ```text
//! observed < low_bw_threshold   step = |prev_step|
//! prev_step == 0                step = round(prev_ratio * delta), 0 if |step| < 2*min_step
//! observed > prev_bw            damping = |delta*100 / prev_step|
//!                               step = damping < 1 ? round(damping * prev_step) : prev_step
//! otherwise                     step = round(-prev_step / 2)
//! ```
//!
//! followed by the dead zone (`|step| < min_step` → 0), saturation
//! (`|step| <= max_step`) and clamping of the new ratio to `[0, 100]`.
//!
//! The low-bandwidth escape keeps only the magnitude of the previous step, so
//! a controller that was moving down will move up. This is long-standing
//! behavior and is pinned by a regression test.

use serde::{Deserialize, Serialize};

use crate::MAX_RATIO;
use crate::config::ControllerConfig;
use crate::error::DmiError;

/// Controller state carried between control periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioState {
    /// Percent of data placed in local memory, within `[0, 100]`.
    pub ratio: u8,
    /// Signed step applied to reach `ratio`.
    pub step: i32,
    /// Bandwidth observed at the previous ratio.
    pub bandwidth: f64,
}

impl RatioState {
    #[must_use]
    pub const fn new(ratio: u8, step: i32, bandwidth: f64) -> Self {
        Self {
            ratio,
            step,
            bandwidth,
        }
    }
}

/// Branch of the control law that produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepRule {
    LowBandwidthEscape,
    ColdStart,
    Improving,
    Regressing,
}

impl StepRule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowBandwidthEscape => "LowBandwidthEscape",
            Self::ColdStart => "ColdStart",
            Self::Improving => "Improving",
            Self::Regressing => "Regressing",
        }
    }
}

/// Explanation of one controller decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDecision {
    pub rule: StepRule,
    /// Step proposed by the rule, before dead zone and saturation.
    pub proposed_step: i32,
    /// The dead zone zeroed a non-zero proposal.
    pub dead_zone: bool,
    /// The proposal was clamped to `±max_step`.
    pub saturated: bool,
    /// `ratio + step` fell outside `[0, 100]` and was clamped.
    pub ratio_clamped: bool,
}

/// Stateless wrapper binding the control law to a configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioController {
    config: ControllerConfig,
}

impl RatioController {
    /// Creates a controller after validating `config`.
    pub fn new(config: ControllerConfig) -> Result<Self, DmiError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Next state for one observed bandwidth.
    pub fn step(&self, prev: &RatioState, observed: f64) -> Result<RatioState, DmiError> {
        adjust_ratio(prev, observed, &self.config)
    }

    /// Next state plus the decision that produced it.
    pub fn step_explained(
        &self,
        prev: &RatioState,
        observed: f64,
    ) -> Result<(RatioState, StepDecision), DmiError> {
        decide(prev, observed, &self.config)
    }
}

/// Apply the control law once.
pub fn adjust_ratio(
    prev: &RatioState,
    observed: f64,
    cfg: &ControllerConfig,
) -> Result<RatioState, DmiError> {
    decide(prev, observed, cfg).map(|(state, _)| state)
}

fn relative_change(prev: &RatioState, observed: f64, context: &'static str) -> Result<f64, DmiError> {
    if prev.bandwidth == 0.0 {
        return Err(DmiError::DivisionByZero { context });
    }
    Ok((prev.bandwidth - observed) / prev.bandwidth)
}

fn decide(
    prev: &RatioState,
    observed: f64,
    cfg: &ControllerConfig,
) -> Result<(RatioState, StepDecision), DmiError> {
    if !observed.is_finite() {
        return Err(DmiError::InvalidBandwidth {
            ratio: prev.ratio,
            value: observed,
        });
    }
    if !prev.bandwidth.is_finite() {
        return Err(DmiError::InvalidBandwidth {
            ratio: prev.ratio,
            value: prev.bandwidth,
        });
    }

    let (rule, proposed) = if observed < cfg.low_bandwidth_threshold {
        (StepRule::LowBandwidthEscape, prev.step.saturating_abs())
    } else if prev.step == 0 {
        let delta = relative_change(prev, observed, "cold start")?;
        let step = cfg.rounding.apply(f64::from(prev.ratio) * delta);
        let step = if step.saturating_abs() < cfg.min_step.saturating_mul(2) {
            0
        } else {
            step
        };
        (StepRule::ColdStart, step)
    } else if observed > prev.bandwidth {
        let delta = relative_change(prev, observed, "damping")?;
        let last = f64::from(prev.step);
        let damping = (delta * 100.0 / last).abs();
        let step = if damping < 1.0 {
            cfg.rounding.apply(damping * last)
        } else {
            prev.step
        };
        (StepRule::Improving, step)
    } else {
        (
            StepRule::Regressing,
            cfg.rounding.apply(-f64::from(prev.step) / 2.0),
        )
    };

    let magnitude = proposed.saturating_abs();
    let (step, dead_zone, saturated) = if magnitude < cfg.min_step {
        (0, proposed != 0, false)
    } else if magnitude > cfg.max_step {
        (cfg.max_step * proposed.signum(), false, true)
    } else {
        (proposed, false, false)
    };

    let target = i64::from(prev.ratio) + i64::from(step);
    let max = i64::from(MAX_RATIO);
    let ratio_clamped = !(0..=max).contains(&target);
    // Clamped into [0, 100], so the narrowing cannot truncate.
    let ratio = target.clamp(0, max) as u8;

    Ok((
        RatioState {
            ratio,
            step,
            bandwidth: observed,
        },
        StepDecision {
            rule,
            proposed_step: proposed,
            dead_zone,
            saturated,
            ratio_clamped,
        },
    ))
}
