//! # Bandwidth Curve
//!
//! Steady-state bandwidth recorded at a set of interleave ratios. Queries
//! between two recorded ratios are answered by linear interpolation:
//!
//! ```text
//! frac = (ratio - lower) / (greater - lower)
//! bw   = bw(greater) * frac + bw(lower) * (1 - frac)
//! ```
//!
//! Queries outside `[min_ratio, max_ratio]` fail with
//! [`DmiError::RatioOutOfRange`]; the curve never extrapolates.

use std::collections::BTreeMap;

use crate::MAX_RATIO;
use crate::error::DmiError;

/// Sorted `ratio -> bandwidth` table. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthCurve {
    points: BTreeMap<u8, f64>,
}

impl BandwidthCurve {
    /// Build a curve from `(ratio, bandwidth)` pairs.
    ///
    /// Rejects an empty input, ratios above 100, duplicate ratios, and
    /// non-finite bandwidths.
    pub fn from_points<I>(points: I) -> Result<Self, DmiError>
    where
        I: IntoIterator<Item = (u8, f64)>,
    {
        let mut map = BTreeMap::new();
        for (ratio, bw) in points {
            if ratio > MAX_RATIO {
                return Err(DmiError::RatioOutOfRange {
                    ratio: u32::from(ratio),
                    min: 0,
                    max: MAX_RATIO,
                });
            }
            if !bw.is_finite() {
                return Err(DmiError::InvalidBandwidth { ratio, value: bw });
            }
            if map.insert(ratio, bw).is_some() {
                return Err(DmiError::DuplicateRatio(ratio));
            }
        }
        if map.is_empty() {
            return Err(DmiError::EmptyCurve);
        }
        Ok(Self { points: map })
    }

    /// Bandwidth at `ratio`: the stored value on an exact hit, otherwise the
    /// linear interpolation between the bracketing points.
    pub fn get(&self, ratio: u8) -> Result<f64, DmiError> {
        if let Some(bw) = self.points.get(&ratio) {
            return Ok(*bw);
        }
        let lower = self.points.range(..ratio).next_back();
        let greater = self.points.range(ratio..).next();
        match (lower, greater) {
            (Some((&lo, &lo_bw)), Some((&hi, &hi_bw))) => {
                let frac = f64::from(ratio - lo) / f64::from(hi - lo);
                Ok(hi_bw * frac + lo_bw * (1.0 - frac))
            }
            _ => Err(DmiError::RatioOutOfRange {
                ratio: u32::from(ratio),
                min: self.min_ratio(),
                max: self.max_ratio(),
            }),
        }
    }

    /// Smallest recorded ratio.
    #[must_use]
    pub fn min_ratio(&self) -> u8 {
        self.points.keys().next().copied().unwrap_or(0)
    }

    /// Largest recorded ratio.
    #[must_use]
    pub fn max_ratio(&self) -> u8 {
        self.points.keys().next_back().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: construction rejects empty curves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Recorded points in ascending ratio order.
    pub fn points(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.points.iter().map(|(&r, &bw)| (r, bw))
    }

    /// The recorded point with the highest bandwidth (lowest ratio on ties).
    #[must_use]
    pub fn peak(&self) -> (u8, f64) {
        self.points()
            .fold(None, |best: Option<(u8, f64)>, (r, bw)| match best {
                Some((_, best_bw)) if best_bw >= bw => best,
                _ => Some((r, bw)),
            })
            .unwrap_or((0, 0.0))
    }
}
