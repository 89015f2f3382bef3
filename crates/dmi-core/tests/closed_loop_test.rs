//! Closed-loop behavior of the interleave controller against recorded
//! bandwidth-vs-ratio curves from a two-phase workload.
//!
//! Run: cargo test -p dmi-core --test closed_loop_test

use dmi_core::{
    BandwidthCurve, ControllerConfig, DmiError, Phase, SimulatorConfig, Simulator, StepRounding,
};

/// Bandwidth (MB/s scale) of the first workload phase; peak at ratio 70.
fn first_phase_curve() -> BandwidthCurve {
    BandwidthCurve::from_points([
        (0, 209.822),
        (10, 236.041),
        (20, 270.705),
        (30, 333.98),
        (40, 421.738),
        (50, 538.822),
        (60, 647.731),
        (65, 654.157),
        (67, 666.453),
        (70, 669.857),
        (75, 669.678),
        (77, 665.0),
        (80, 640.375),
        (90, 575.409),
        (100, 529.604),
    ])
    .expect("valid first phase curve")
}

/// Second workload phase; peak at ratio 88.
fn second_phase_curve() -> BandwidthCurve {
    BandwidthCurve::from_points([
        (0, 209.822),
        (55, 292.283),
        (65, 325.85),
        (75, 354.692),
        (77, 378.0),
        (80, 386.703),
        (83, 393.209),
        (85, 402.048),
        (88, 404.946),
        (90, 400.348),
        (92, 397.986),
        (95, 391.929),
        (100, 371.088),
    ])
    .expect("valid second phase curve")
}

fn two_phase(controller: ControllerConfig) -> Simulator {
    Simulator::new(first_phase_curve(), controller, SimulatorConfig::default())
        .expect("valid simulator")
        .with_secondary(second_phase_curve())
}

#[test]
fn reference_curves_peak_where_expected() {
    assert_eq!(first_phase_curve().peak().0, 70);
    assert_eq!(second_phase_curve().peak().0, 88);
    assert_eq!(first_phase_curve().get(65).unwrap(), 654.157);
}

#[test]
fn converges_near_primary_optimum() {
    let cfg = ControllerConfig::default();
    let trace = two_phase(cfg).run().expect("simulation converges");

    let converged = trace.primary_converged_at.expect("primary converged");
    assert!(converged <= 50, "took {converged} iterations");

    let ratio = trace.points[converged].ratio;
    assert!(
        ratio.abs_diff(70) <= cfg.min_step as u8,
        "converged at {ratio}, expected 70 +/- {}",
        cfg.min_step
    );
    assert_eq!(trace.points[converged - 1].ratio, ratio);
    assert!(
        trace.points[..=converged]
            .iter()
            .all(|p| p.phase == Phase::Primary)
    );
}

#[test]
fn reference_trace_with_nearest_rounding() {
    let trace = two_phase(ControllerConfig::default()).run().unwrap();
    assert_eq!(
        trace.ratios(),
        vec![100, 92, 85, 78, 71, 69, 69, 69, 69, 69, 77, 85, 91, 88, 88]
    );
    assert_eq!(
        trace.steps(),
        vec![0, -8, -7, -7, -7, -2, 0, 0, 0, 0, 8, 8, 6, -3, 0]
    );
    assert_eq!(trace.primary_converged_at, Some(6));
    assert_eq!(trace.switched_at, Some(10));
    assert_eq!(trace.secondary_converged_at, Some(14));
}

#[test]
fn reference_trace_with_truncation() {
    let cfg = ControllerConfig {
        rounding: StepRounding::TowardZero,
        ..ControllerConfig::default()
    };
    let trace = two_phase(cfg).run().unwrap();
    assert_eq!(
        trace.ratios(),
        vec![100, 92, 86, 80, 74, 70, 70, 70, 70, 70, 78, 86, 91, 89, 89]
    );
    assert_eq!(trace.final_ratio(), Some(89));
}

#[test]
fn holds_three_iterations_before_switching() {
    let trace = two_phase(ControllerConfig::default()).run().unwrap();
    let converged = trace.primary_converged_at.unwrap();
    let held_ratio = trace.points[converged].ratio;
    let held_bw = trace.points[converged].bandwidth;

    let hold = &trace.points[converged + 1..converged + 4];
    for p in hold {
        assert_eq!(p.ratio, held_ratio);
        assert_eq!(p.step, 0);
        assert_eq!(p.bandwidth, held_bw);
        assert_eq!(p.rule, None);
        assert_eq!(p.phase, Phase::Primary);
    }
    assert_eq!(trace.switched_at, Some(converged + 4));
    assert_eq!(trace.points[converged + 4].phase, Phase::Secondary);
}

#[test]
fn re_converges_near_secondary_optimum() {
    let cfg = ControllerConfig::default();
    let trace = two_phase(cfg).run().unwrap();
    let switched = trace.switched_at.unwrap();
    let reconverged = trace.secondary_converged_at.expect("secondary converged");
    assert!(reconverged - switched <= 50);
    assert_eq!(reconverged, trace.len() - 1);

    let ratio = trace.points[reconverged].ratio;
    assert!(ratio.abs_diff(88) <= cfg.min_step as u8, "ended at {ratio}");
    // The workload change first pushes the ratio up toward local memory.
    assert!(trace.points[switched].step > 0);
}

#[test]
fn ratio_never_oscillates_after_convergence() {
    let trace = two_phase(ControllerConfig::default()).run().unwrap();
    let converged = trace.primary_converged_at.unwrap();
    let switched = trace.switched_at.unwrap();
    let ratios = trace.ratios();
    assert!(ratios[converged..switched].windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn every_recorded_ratio_is_in_bounds() {
    let trace = two_phase(ControllerConfig::default()).run().unwrap();
    assert!(trace.points.iter().all(|p| p.ratio <= 100));
}

#[test]
fn iteration_cap_bounds_the_run() {
    let sim = Simulator::new(
        first_phase_curve(),
        ControllerConfig::default(),
        SimulatorConfig {
            max_iterations: 8,
            ..SimulatorConfig::default()
        },
    )
    .unwrap()
    .with_secondary(second_phase_curve());
    // Primary converges at 6; the third hold point would be the 9th point.
    assert_eq!(
        sim.run(),
        Err(DmiError::ConvergenceTimeout { iterations: 8 })
    );
}

#[test]
fn trace_serializes_for_downstream_plotting() {
    let trace = two_phase(ControllerConfig::default()).run().unwrap();
    let json = serde_json::to_value(&trace).unwrap();
    assert_eq!(json["points"][0]["phase"], "primary");
    assert_eq!(json["points"][1]["rule"], "ColdStart");
    assert!(json["points"][0].get("rule").is_none());
    assert_eq!(json["primary_converged_at"], 6);
}
