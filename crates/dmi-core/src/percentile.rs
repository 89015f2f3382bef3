//! Percentile selection over a window of bandwidth telemetry.
//!
//! The selector returns a whole sample (not an interpolated value) so that
//! the local/remote split of the chosen tick is preserved. Ties on `total`
//! resolve to the earliest sample in arrival order.

use serde::{Deserialize, Serialize};

use crate::error::DmiError;

/// Percentile used by the telemetry tooling when none is requested.
pub const DEFAULT_PERCENTILE: i32 = 95;

/// One telemetry tick. `total` is authoritative; `local + remote` may differ
/// from it by measurement error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandwidthSample {
    pub local: f64,
    pub remote: f64,
    pub total: f64,
}

impl BandwidthSample {
    #[must_use]
    pub const fn new(local: f64, remote: f64, total: f64) -> Self {
        Self {
            local,
            remote,
            total,
        }
    }
}

/// Return the sample sitting at `percentile` of the ascending `total` ranking.
///
/// The rank index is `floor(len * percentile / 100) - 1`, clamped to the
/// valid index range.
pub fn select_percentile(
    samples: &[BandwidthSample],
    percentile: i32,
) -> Result<BandwidthSample, DmiError> {
    if !(0..=100).contains(&percentile) {
        return Err(DmiError::InvalidPercentile(percentile));
    }
    if samples.is_empty() {
        return Err(DmiError::EmptySampleSet);
    }

    let mut totals: Vec<f64> = samples.iter().map(|s| s.total).collect();
    totals.sort_by(f64::total_cmp);

    let len = totals.len();
    // percentile is within [0, 100], so the cast is lossless.
    let rank = (len * percentile as usize) / 100;
    let index = rank.saturating_sub(1).min(len - 1);
    let target = totals[index];

    samples
        .iter()
        .find(|s| s.total.total_cmp(&target).is_eq())
        .copied()
        .ok_or(DmiError::EmptySampleSet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(values: &[f64]) -> Vec<BandwidthSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &t)| BandwidthSample::new(i as f64, 0.0, t))
            .collect()
    }

    #[test]
    fn median_of_four() {
        let samples = totals(&[100.0, 200.0, 300.0, 400.0]);
        let picked = select_percentile(&samples, 50).unwrap();
        assert_eq!(picked.total, 200.0);
    }

    #[test]
    fn order_of_arrival_does_not_change_the_rank() {
        let samples = totals(&[400.0, 100.0, 300.0, 200.0]);
        let picked = select_percentile(&samples, 50).unwrap();
        assert_eq!(picked.total, 200.0);
        assert_eq!(picked.local, 3.0);
    }

    #[test]
    fn ties_resolve_to_earliest_sample() {
        let samples = vec![
            BandwidthSample::new(1.0, 9.0, 500.0),
            BandwidthSample::new(2.0, 8.0, 100.0),
            BandwidthSample::new(3.0, 7.0, 500.0),
            BandwidthSample::new(4.0, 6.0, 500.0),
        ];
        let picked = select_percentile(&samples, 100).unwrap();
        assert_eq!(picked, samples[0]);
    }

    #[test]
    fn zero_percentile_clamps_to_minimum() {
        let samples = totals(&[30.0, 10.0, 20.0]);
        assert_eq!(select_percentile(&samples, 0).unwrap().total, 10.0);
    }

    #[test]
    fn full_percentile_is_maximum() {
        let samples = totals(&[30.0, 10.0, 20.0]);
        assert_eq!(select_percentile(&samples, 100).unwrap().total, 30.0);
    }

    #[test]
    fn default_percentile_on_twenty_samples() {
        let values: Vec<f64> = (1..=20).map(|v| f64::from(v) * 10.0).collect();
        let samples = totals(&values);
        // floor(20 * 95 / 100) - 1 = 18
        assert_eq!(
            select_percentile(&samples, DEFAULT_PERCENTILE).unwrap().total,
            190.0
        );
    }

    #[test]
    fn single_sample_always_selected() {
        let samples = totals(&[42.0]);
        for p in [0, 1, 50, 99, 100] {
            assert_eq!(select_percentile(&samples, p).unwrap().total, 42.0);
        }
    }

    #[test]
    fn rejects_invalid_input() {
        let samples = totals(&[1.0]);
        assert_eq!(
            select_percentile(&samples, -1),
            Err(DmiError::InvalidPercentile(-1))
        );
        assert_eq!(
            select_percentile(&samples, 101),
            Err(DmiError::InvalidPercentile(101))
        );
        assert_eq!(select_percentile(&[], 50), Err(DmiError::EmptySampleSet));
    }

    #[test]
    fn percentile_checked_before_emptiness() {
        assert_eq!(
            select_percentile(&[], 150),
            Err(DmiError::InvalidPercentile(150))
        );
    }
}
