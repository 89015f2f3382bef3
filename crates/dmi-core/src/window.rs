//! Windowed online control: one controller step per telemetry window.
//!
//! During each adjustment interval the monitor collects a window of samples.
//! The earliest half of the window is discarded while pages placed under the
//! previous ratio finish migrating; the configured percentile of the settled
//! remainder is the observed bandwidth for the next controller step.

use serde::{Deserialize, Serialize};

use crate::MAX_RATIO;
use crate::config::ControllerConfig;
use crate::controller::{RatioController, RatioState, StepDecision};
use crate::error::DmiError;
use crate::percentile::{BandwidthSample, select_percentile};

/// Percentile the online controller feeds forward.
pub const DEFAULT_WINDOW_PERCENTILE: i32 = 80;

/// Representative sample of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowReading {
    pub sample: BandwidthSample,
    /// Leading samples dropped as migration warm-up.
    pub discarded: usize,
    /// Samples the percentile was taken over.
    pub considered: usize,
}

/// Drop the warm-up half of `window` and select `percentile` of the rest.
pub fn read_window(window: &[BandwidthSample], percentile: i32) -> Result<WindowReading, DmiError> {
    let discarded = window.len() / 2;
    let settled = &window[discarded..];
    let sample = select_percentile(settled, percentile)?;
    Ok(WindowReading {
        sample,
        discarded,
        considered: settled.len(),
    })
}

/// One controller iteration driven by a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStep {
    pub reading: WindowReading,
    pub state: RatioState,
    pub decision: StepDecision,
}

/// Ratio controller fed by telemetry windows instead of a recorded curve.
#[derive(Debug, Clone, Copy)]
pub struct WindowedController {
    controller: RatioController,
    percentile: i32,
    state: RatioState,
}

impl WindowedController {
    pub fn new(
        config: ControllerConfig,
        percentile: i32,
        initial: RatioState,
    ) -> Result<Self, DmiError> {
        if !(0..=100).contains(&percentile) {
            return Err(DmiError::InvalidPercentile(percentile));
        }
        if initial.ratio > MAX_RATIO {
            return Err(DmiError::RatioOutOfRange {
                ratio: u32::from(initial.ratio),
                min: 0,
                max: MAX_RATIO,
            });
        }
        Ok(Self {
            controller: RatioController::new(config)?,
            percentile,
            state: initial,
        })
    }

    /// State after the last window.
    #[must_use]
    pub fn state(&self) -> &RatioState {
        &self.state
    }

    /// Consume one window and advance the controller. On error the state is
    /// left unchanged.
    pub fn observe(&mut self, window: &[BandwidthSample]) -> Result<WindowStep, DmiError> {
        let reading = read_window(window, self.percentile)?;
        let (state, decision) = self
            .controller
            .step_explained(&self.state, reading.sample.total)?;
        self.state = state;
        Ok(WindowStep {
            reading,
            state,
            decision,
        })
    }

    /// Replay recorded windows in order.
    pub fn replay<'a, I>(&mut self, windows: I) -> Result<Vec<WindowStep>, DmiError>
    where
        I: IntoIterator<Item = &'a [BandwidthSample]>,
    {
        windows.into_iter().map(|w| self.observe(w)).collect()
    }
}
