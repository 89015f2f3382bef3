//! CLI entrypoint for the DMI tooling harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use dmi_core::{
    BandwidthCurve, BandwidthSample, ControllerConfig, DEFAULT_PERCENTILE,
    DEFAULT_WINDOW_PERCENTILE, RatioState, SimulatorConfig, StepRounding, WindowedController,
    select_percentile,
};
use dmi_harness::curve_file::{DEFAULT_BANDWIDTH_COLUMN, load_curve_any};
use dmi_harness::structured_log::{ArtifactIndex, LogEmitter, LogLevel, validate_log_file};
use dmi_harness::telemetry::{self, LatencySummary};
use dmi_harness::trace_export::{self, TraceFormat};
use dmi_harness::{CurveFixture, RunConfig, SimulationRunner};

/// Offline tooling for the dynamic memory interleaving controller.
#[derive(Debug, Parser)]
#[command(name = "dmi-harness")]
#[command(about = "Simulate and inspect the DMI interleave-ratio controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoundingArg {
    Nearest,
    TowardZero,
}

impl From<RoundingArg> for StepRounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Nearest => Self::Nearest,
            RoundingArg::TowardZero => Self::TowardZero,
        }
    }
}

/// Layout of a bandwidth telemetry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TelemetryFormat {
    /// Blank-line separated local/remote/total records.
    Records,
    /// Per-node monitor stream.
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BuiltinCurve {
    Primary,
    Secondary,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the controller in closed loop against recorded bandwidth curves.
    Simulate {
        /// Primary-phase curve (CSV table or JSON fixture).
        #[arg(long, required_unless_present = "builtin")]
        primary: Option<PathBuf>,
        /// Curve the workload switches to after primary convergence.
        #[arg(long)]
        secondary: Option<PathBuf>,
        /// Use the built-in two-phase reference workload.
        #[arg(long, conflicts_with_all = ["primary", "secondary"])]
        builtin: bool,
        /// Bandwidth column of CSV curve files.
        #[arg(long, default_value = DEFAULT_BANDWIDTH_COLUMN)]
        bw_column: String,
        /// JSON run configuration (`{"controller": {...}, "simulator": {...}}`).
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        min_step: Option<i32>,
        #[arg(long)]
        max_step: Option<i32>,
        #[arg(long)]
        low_bw_threshold: Option<f64>,
        #[arg(long, value_enum)]
        rounding: Option<RoundingArg>,
        #[arg(long)]
        max_iterations: Option<usize>,
        #[arg(long)]
        hold_iterations: Option<usize>,
        /// Trace output path (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TraceFormat::Json)]
        format: TraceFormat,
        /// JSONL structured log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index path (requires `--output`).
        #[arg(long, requires = "output")]
        artifact_index: Option<PathBuf>,
        /// Run identifier used in log trace ids.
        #[arg(long, default_value = "dmi-sim")]
        run_id: String,
    },
    /// Pick the representative sample out of bandwidth telemetry.
    Percentile {
        /// Telemetry file.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = DEFAULT_PERCENTILE, allow_negative_numbers = true)]
        percentile: i32,
        #[arg(long, value_enum, default_value_t = TelemetryFormat::Records)]
        format: TelemetryFormat,
    },
    /// Replay recorded telemetry through the controller, one step per window.
    Replay {
        /// Telemetry file.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = TelemetryFormat::Records)]
        format: TelemetryFormat,
        /// Samples per adjustment window.
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        window: u64,
        #[arg(long, default_value_t = DEFAULT_WINDOW_PERCENTILE, allow_negative_numbers = true)]
        percentile: i32,
        #[arg(long, value_enum)]
        rounding: Option<RoundingArg>,
    },
    /// Summarize an access-latency stream.
    Latency {
        #[arg(long)]
        input: PathBuf,
    },
    /// Query bandwidth at given ratios of a curve.
    CurveQuery {
        /// Curve file (CSV table or JSON fixture).
        #[arg(long, required_unless_present = "builtin")]
        curve: Option<PathBuf>,
        /// Built-in reference curve.
        #[arg(long, value_enum, conflicts_with = "curve")]
        builtin: Option<BuiltinCurve>,
        #[arg(long, default_value = DEFAULT_BANDWIDTH_COLUMN)]
        bw_column: String,
        /// Ratios to query; prints the curve peak when omitted.
        #[arg(long = "ratio")]
        ratios: Vec<u8>,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        input: PathBuf,
    },
}

fn builtin_curve(which: BuiltinCurve) -> Result<BandwidthCurve, dmi_core::DmiError> {
    let fixture = match which {
        BuiltinCurve::Primary => CurveFixture::reference_primary(),
        BuiltinCurve::Secondary => CurveFixture::reference_secondary(),
    };
    fixture.to_curve()
}

fn load_samples(
    input: &Path,
    format: TelemetryFormat,
) -> Result<Vec<BandwidthSample>, Box<dyn std::error::Error>> {
    let samples = match format {
        TelemetryFormat::Node => telemetry::read_node_bandwidth(input)?.samples(),
        TelemetryFormat::Records => {
            let read = telemetry::read_bandwidth_records(input)?;
            for skipped in &read.skipped {
                eprintln!("Skipping record: {skipped}");
            }
            if read.truncated {
                eprintln!("Trailing partial record ignored");
            }
            read.samples
        }
    };
    eprintln!("Read {} samples from {}", samples.len(), input.display());
    Ok(samples)
}

fn write_output(path: Option<&Path>, body: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, body)
        }
        None => {
            println!("{body}");
            Ok(())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            primary,
            secondary,
            builtin,
            bw_column,
            config,
            min_step,
            max_step,
            low_bw_threshold,
            rounding,
            max_iterations,
            hold_iterations,
            output,
            format,
            log,
            artifact_index,
            run_id,
        } => {
            let mut run_config = match &config {
                Some(path) => RunConfig::from_file(path)?,
                None => RunConfig::from_env(),
            };
            let ctl = &mut run_config.controller;
            if let Some(v) = min_step {
                ctl.min_step = v;
            }
            if let Some(v) = max_step {
                ctl.max_step = v;
            }
            if let Some(v) = low_bw_threshold {
                ctl.low_bandwidth_threshold = v;
            }
            if let Some(v) = rounding {
                ctl.rounding = v.into();
            }
            let sim = &mut run_config.simulator;
            if let Some(v) = max_iterations {
                sim.max_iterations = v;
            }
            if let Some(v) = hold_iterations {
                sim.hold_iterations = v;
            }

            let (primary_curve, secondary_curve) = if builtin {
                (
                    builtin_curve(BuiltinCurve::Primary)?,
                    Some(builtin_curve(BuiltinCurve::Secondary)?),
                )
            } else {
                let path = primary.ok_or("--primary is required without --builtin")?;
                let secondary_curve = secondary
                    .as_deref()
                    .map(|p| load_curve_any(p, &bw_column))
                    .transpose()?;
                (load_curve_any(&path, &bw_column)?, secondary_curve)
            };

            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, &run_id, "simulator")?,
                None => LogEmitter::sink(&run_id, "simulator"),
            };

            eprintln!(
                "Simulating: primary {} points, secondary {}",
                primary_curve.len(),
                secondary_curve
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |c| format!("{} points", c.len())),
            );
            let trace = SimulationRunner::new(run_config).run(
                primary_curve,
                secondary_curve,
                &mut emitter,
            )?;
            eprintln!(
                "Converged: points={}, final_ratio={}, primary_at={:?}, switched_at={:?}, secondary_at={:?}",
                trace.len(),
                trace.final_ratio().unwrap_or_default(),
                trace.primary_converged_at,
                trace.switched_at,
                trace.secondary_converged_at,
            );

            match (&output, &artifact_index) {
                (Some(out), Some(index_path)) => {
                    let mut index = ArtifactIndex::new(run_id.as_str());
                    trace_export::export(&trace, format, out, &mut index)?;
                    let written = emitter
                        .entry(LogLevel::Info, "artifacts_written")
                        .with_artifacts(vec![out.display().to_string()]);
                    emitter.emit_entry(written)?;
                    emitter.flush()?;
                    if let Some(log_path) = &log {
                        index.add_file(log_path, "log_jsonl")?;
                    }
                    write_output(Some(index_path), &index.to_json()?)?;
                    eprintln!("Artifact index: {}", index_path.display());
                }
                _ => {
                    let body = trace_export::render(&trace, format)?;
                    write_output(output.as_deref(), &body)?;
                }
            }
            if let Some(out) = &output {
                eprintln!("Trace written to {}", out.display());
            }
        }
        Command::Percentile {
            input,
            percentile,
            format,
        } => {
            let samples = load_samples(&input, format)?;
            let selected = select_percentile(&samples, percentile)?;
            println!("{}", serde_json::to_string_pretty(&selected)?);
        }
        Command::Replay {
            input,
            format,
            window,
            percentile,
            rounding,
        } => {
            let samples = load_samples(&input, format)?;
            let window = usize::try_from(window)?;
            let mut config = ControllerConfig::from_env();
            if let Some(v) = rounding {
                config.rounding = v.into();
            }
            let start = SimulatorConfig::default();
            let mut controller = WindowedController::new(
                config,
                percentile,
                RatioState::new(start.initial_ratio, 0, start.initial_bandwidth),
            )?;
            let windows = samples.chunks_exact(window);
            if !windows.remainder().is_empty() {
                eprintln!(
                    "Ignoring {} samples after the last full window",
                    windows.remainder().len()
                );
            }
            let steps = controller.replay(windows)?;
            eprintln!(
                "Replayed {} windows, final ratio {}",
                steps.len(),
                controller.state().ratio
            );
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }
        Command::Latency { input } => {
            let samples = telemetry::read_latency(&input)?;
            let summary = LatencySummary::from_samples(&samples);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::CurveQuery {
            curve,
            builtin,
            bw_column,
            ratios,
        } => {
            let curve = match (&curve, builtin) {
                (_, Some(which)) => builtin_curve(which)?,
                (Some(path), None) => load_curve_any(path, &bw_column)?,
                (None, None) => return Err("--curve or --builtin is required".into()),
            };
            if ratios.is_empty() {
                let (ratio, bandwidth) = curve.peak();
                println!("peak,{ratio},{bandwidth}");
            }
            for ratio in ratios {
                println!("{ratio},{}", curve.get(ratio)?);
            }
        }
        Command::ValidateLog { input } => {
            let (lines, errors) = validate_log_file(&input)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!(
                "Validated {}: lines={}, errors={}",
                input.display(),
                lines,
                errors.len()
            );
            if !errors.is_empty() {
                return Err(format!("{} schema violations", errors.len()).into());
            }
        }
    }

    Ok(())
}
