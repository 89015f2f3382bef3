//! Simulation execution engine.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use dmi_core::{
    BandwidthCurve, ControllerConfig, DmiError, SimulationTrace, Simulator,
    SimulatorConfig, StepDecision, TracePoint,
};

use crate::error::HarnessError;
use crate::structured_log::{EVENT_CONTROLLER_STEP, LogEmitter, LogLevel, Outcome};

/// Complete configuration of a simulation run, as loaded from `--config`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub controller: ControllerConfig,
    pub simulator: SimulatorConfig,
}

impl RunConfig {
    /// Defaults with `DMI_*` controller overrides from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            controller: ControllerConfig::from_env(),
            simulator: SimulatorConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    pub fn validate(&self) -> Result<(), DmiError> {
        self.controller.validate()?;
        self.simulator.validate()
    }
}

/// Runs the closed-loop simulator and narrates it to a structured log.
pub struct SimulationRunner {
    config: RunConfig,
}

impl SimulationRunner {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run against `primary` (and `secondary`, if present).
    ///
    /// Every recorded point becomes one log line. A log write failure does
    /// not abort the simulation; it is reported after the run completes.
    pub fn run(
        &self,
        primary: BandwidthCurve,
        secondary: Option<BandwidthCurve>,
        log: &mut LogEmitter,
    ) -> Result<SimulationTrace, HarnessError> {
        let started = Instant::now();
        let mut simulator = Simulator::new(primary, self.config.controller, self.config.simulator)?;
        if let Some(secondary) = secondary {
            simulator = simulator.with_secondary(secondary);
        }

        let start = log
            .entry(LogLevel::Info, "simulation_start")
            .with_details(serde_json::to_value(self.config)?);
        log.emit_entry(start)?;

        let mut log_error: Option<std::io::Error> = None;
        let mut narrator = Narrator::default();
        let result = simulator.run_with(|point, decision| {
            if log_error.is_some() {
                return;
            }
            if let Err(e) = narrator.observe(log, point, decision) {
                log_error = Some(e);
            }
        });
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(trace) => {
                if let Some(e) = log_error {
                    return Err(e.into());
                }
                let done = log
                    .entry(LogLevel::Info, "simulation_complete")
                    .with_outcome(Outcome::Pass)
                    .with_duration_ms(duration_ms)
                    .with_details(serde_json::json!({
                        "points": trace.len(),
                        "final_ratio": trace.final_ratio(),
                        "primary_converged_at": trace.primary_converged_at,
                        "switched_at": trace.switched_at,
                        "secondary_converged_at": trace.secondary_converged_at,
                    }));
                log.emit_entry(done)?;
                log.flush()?;
                Ok(trace)
            }
            Err(err) => {
                let outcome = match err {
                    DmiError::ConvergenceTimeout { .. } => Outcome::Timeout,
                    _ => Outcome::Error,
                };
                let failed = log
                    .entry(LogLevel::Error, "simulation_failed")
                    .with_outcome(outcome)
                    .with_duration_ms(duration_ms)
                    .with_details(serde_json::json!({ "error": err.to_string() }));
                // The simulation error is the one worth surfacing.
                let _ = log.emit_entry(failed);
                let _ = log.flush();
                Err(err.into())
            }
        }
    }
}

/// Turns the observer callback stream into log events.
#[derive(Default)]
struct Narrator {
    last: Option<TracePoint>,
}

impl Narrator {
    fn observe(
        &mut self,
        log: &mut LogEmitter,
        point: &TracePoint,
        decision: Option<&StepDecision>,
    ) -> std::io::Result<()> {
        let prev = self.last.replace(*point);

        if let Some(prev) = prev
            && prev.phase != point.phase
        {
            let switch = log
                .entry(LogLevel::Info, "phase_switch")
                .with_phase(point.phase)
                .with_details(serde_json::json!({ "from": prev.phase, "at": point.iteration }));
            log.emit_entry(switch)?;
        }

        match decision {
            Some(decision) => {
                let step = log
                    .entry(LogLevel::Debug, EVENT_CONTROLLER_STEP)
                    .with_point(point)
                    .with_decision(decision);
                log.emit_entry(step)?;

                if prev.is_some_and(|p| p.ratio == point.ratio) {
                    let converged = log
                        .entry(LogLevel::Info, "phase_converged")
                        .with_point(point);
                    log.emit_entry(converged)?;
                }
            }
            None if point.iteration == 0 => {}
            None => {
                let hold = log.entry(LogLevel::Debug, "hold").with_point(point);
                log.emit_entry(hold)?;
            }
        }
        Ok(())
    }
}
