//! Offline closed-loop simulation of the interleave controller.
//!
//! The simulator stands in for hardware: each iteration it reads the
//! bandwidth a recorded [`BandwidthCurve`] predicts at the current ratio and
//! feeds it to the [`RatioController`]. A workload phase change is modelled
//! by swapping to a secondary curve once the primary phase has converged.
//!
//! Convergence: the ratio did not change across the last controller
//! iteration of the active phase.

use serde::{Deserialize, Serialize};

use crate::config::{ControllerConfig, SimulatorConfig};
use crate::controller::{RatioController, RatioState, StepDecision, StepRule};
use crate::curve::BandwidthCurve;
use crate::error::DmiError;

/// Workload phase being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Primary,
    Secondary,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// One recorded point of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub iteration: usize,
    pub phase: Phase,
    pub ratio: u8,
    pub step: i32,
    pub bandwidth: f64,
    /// Control-law branch for controller iterations; `None` for the initial
    /// point and hold points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<StepRule>,
}

/// Full output of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    pub points: Vec<TracePoint>,
    /// Iteration at which the primary phase converged.
    pub primary_converged_at: Option<usize>,
    /// First iteration run against the secondary curve.
    pub switched_at: Option<usize>,
    /// Iteration at which the secondary phase re-converged.
    pub secondary_converged_at: Option<usize>,
}

impl SimulationTrace {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn ratios(&self) -> Vec<u8> {
        self.points.iter().map(|p| p.ratio).collect()
    }

    #[must_use]
    pub fn steps(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.step).collect()
    }

    #[must_use]
    pub fn bandwidths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.bandwidth).collect()
    }

    /// Ratio the run ended at.
    #[must_use]
    pub fn final_ratio(&self) -> Option<u8> {
        self.points.last().map(|p| p.ratio)
    }

    fn push(&mut self, phase: Phase, state: &RatioState, rule: Option<StepRule>) -> TracePoint {
        let point = TracePoint {
            iteration: self.points.len(),
            phase,
            ratio: state.ratio,
            step: state.step,
            bandwidth: state.bandwidth,
            rule,
        };
        self.points.push(point);
        point
    }
}

/// Closed-loop driver for the ratio controller.
#[derive(Debug, Clone)]
pub struct Simulator {
    controller: RatioController,
    config: SimulatorConfig,
    primary: BandwidthCurve,
    secondary: Option<BandwidthCurve>,
}

impl Simulator {
    /// Simulator over a single workload phase.
    pub fn new(
        primary: BandwidthCurve,
        controller: ControllerConfig,
        config: SimulatorConfig,
    ) -> Result<Self, DmiError> {
        config.validate()?;
        Ok(Self {
            controller: RatioController::new(controller)?,
            config,
            primary,
            secondary: None,
        })
    }

    /// Add the curve the workload switches to after primary convergence.
    #[must_use]
    pub fn with_secondary(mut self, secondary: BandwidthCurve) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Run to convergence.
    pub fn run(&self) -> Result<SimulationTrace, DmiError> {
        self.run_with(|_, _| {})
    }

    /// Run to convergence, reporting every recorded point to `observer`
    /// together with the controller decision that produced it.
    pub fn run_with<F>(&self, mut observer: F) -> Result<SimulationTrace, DmiError>
    where
        F: FnMut(&TracePoint, Option<&StepDecision>),
    {
        let max = self.config.max_iterations;
        let mut trace = SimulationTrace::default();
        let mut phase = Phase::Primary;
        let mut curve = &self.primary;
        let mut state = RatioState::new(self.config.initial_ratio, 0, self.config.initial_bandwidth);

        let initial = trace.push(phase, &state, None);
        observer(&initial, None);

        loop {
            if trace.len() >= max {
                return Err(DmiError::ConvergenceTimeout {
                    iterations: trace.len(),
                });
            }

            let observed = curve.get(state.ratio)?;
            let (next, decision) = self.controller.step_explained(&state, observed)?;
            let converged = next.ratio == state.ratio;
            state = next;
            let point = trace.push(phase, &state, Some(decision.rule));
            observer(&point, Some(&decision));

            if !converged {
                continue;
            }

            match phase {
                Phase::Primary => {
                    trace.primary_converged_at = Some(point.iteration);
                    let Some(secondary) = self.secondary.as_ref() else {
                        break;
                    };
                    // Hold the converged ratio before the workload changes.
                    state.step = 0;
                    for _ in 0..self.config.hold_iterations {
                        if trace.len() >= max {
                            return Err(DmiError::ConvergenceTimeout {
                                iterations: trace.len(),
                            });
                        }
                        let hold = trace.push(phase, &state, None);
                        observer(&hold, None);
                    }
                    phase = Phase::Secondary;
                    curve = secondary;
                    trace.switched_at = Some(trace.len());
                }
                Phase::Secondary => {
                    trace.secondary_converged_at = Some(point.iteration);
                    break;
                }
            }
        }

        Ok(trace)
    }
}
