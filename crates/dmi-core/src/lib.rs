//! Dynamic Memory Interleaving (DMI) for tiered-memory systems.
//!
//! DMI searches for the interleave ratio (percent of an application's data
//! resident in local memory) that maximizes observed memory bandwidth. The
//! search is a bounded hill climb driven by periodic bandwidth telemetry.
//!
//! # Architecture
//!
//! - **Bandwidth curve** (`curve`): recorded bandwidth-vs-ratio table with
//!   range-checked linear interpolation
//! - **Percentile selector** (`percentile`): picks the representative sample
//!   out of a telemetry window
//! - **Ratio controller** (`controller`): the feedback control law
//! - **Simulator** (`simulator`): closed-loop driver with a workload phase switch
//! - **Windowed control** (`window`): online composition of percentile
//!   selection and the controller over telemetry windows
//! - **Configuration** (`config`): controller and simulator tunables
//! - **Errors** (`error`): the shared [`DmiError`] type

#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod curve;
pub mod error;
pub mod percentile;
pub mod simulator;
pub mod window;

pub use config::{ControllerConfig, SimulatorConfig, StepRounding};
pub use controller::{RatioController, RatioState, StepDecision, StepRule, adjust_ratio};
pub use curve::BandwidthCurve;
pub use error::DmiError;
pub use percentile::{BandwidthSample, DEFAULT_PERCENTILE, select_percentile};
pub use simulator::{Phase, SimulationTrace, Simulator, TracePoint};
pub use window::{
    DEFAULT_WINDOW_PERCENTILE, WindowReading, WindowStep, WindowedController, read_window,
};

/// Highest valid interleave ratio (everything in local memory).
pub const MAX_RATIO: u8 = 100;
