//! Curve fixture loading and the reference two-phase workload.

use serde::{Deserialize, Serialize};

use dmi_core::{BandwidthCurve, DmiError};

/// One recorded point of a bandwidth sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub ratio: u8,
    pub bandwidth: f64,
}

/// A named bandwidth-vs-ratio sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFixture {
    /// Schema version.
    pub version: String,
    /// Workload/phase name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub points: Vec<CurvePoint>,
}

impl CurveFixture {
    /// Load fixture from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate and convert into a queryable curve.
    pub fn to_curve(&self) -> Result<BandwidthCurve, DmiError> {
        BandwidthCurve::from_points(self.points.iter().map(|p| (p.ratio, p.bandwidth)))
    }

    fn from_pairs(name: &str, description: &str, pairs: &[(u8, f64)]) -> Self {
        Self {
            version: "v1".to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            points: pairs
                .iter()
                .map(|&(ratio, bandwidth)| CurvePoint { ratio, bandwidth })
                .collect(),
        }
    }

    /// First phase of the reference workload; bandwidth peaks at ratio 70.
    #[must_use]
    pub fn reference_primary() -> Self {
        Self::from_pairs(
            "reference-primary",
            "bandwidth-bound phase, peak near 70% local",
            &[
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
            ],
        )
    }

    /// Second phase of the reference workload; bandwidth peaks at ratio 88.
    #[must_use]
    pub fn reference_secondary() -> Self {
        Self::from_pairs(
            "reference-secondary",
            "lighter phase, peak near 88% local",
            &[
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
            ],
        )
    }
}
