//! Pairwise propagation estimate between two slices.
//!
//! The earlier slice is cropped at `min_shift` and slid along the later slice. The shift with
//! the smallest sum of squared label differences gives the displacement, subject to quality
//! gates. A rejected pair is a normal outcome and is reported as `None`.

use std::fmt;

use log::debug;

use crate::config::MatchConfig;
use crate::core::types::{PrecipitationType, Slice, VelocityEstimate};

/// Why a pair of slices produced no estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// The earlier slice is not longer than the crop offset.
    TooShort,
    /// Best match still differs too much.
    Noisy { min: f64, limit: f64 },
    /// Best match does not stand out from the worst.
    Ambiguous { min: f64, max: f64 },
    /// Displacement is larger than the window can support.
    ShiftTooSmall { best_shift: usize },
    /// Nothing moved toward the point.
    NoMotion,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort => write!(f, "slice shorter than crop offset"),
            Rejection::Noisy { min, limit } => write!(f, "noisy: min {:.1} > {:.1}", min, limit),
            Rejection::Ambiguous { min, max } => {
                write!(f, "ambiguous: max {:.1} vs min {:.1}", max, min)
            }
            Rejection::ShiftTooSmall { best_shift } => {
                write!(f, "best shift {} below gate", best_shift)
            }
            Rejection::NoMotion => write!(f, "no displacement"),
        }
    }
}

/// Sum of squared level differences for each admissible shift.
///
/// Entry `s` compares `earlier[min_shift..]` with `later[s..]`. Pairs involving `Unknown`
/// are skipped.
pub fn ssd_curve(earlier: &Slice, later: &Slice, min_shift: usize) -> Vec<f64> {
    if min_shift >= earlier.len() {
        return Vec::new();
    }
    let window = &earlier.samples[min_shift..];

    (0..=min_shift)
        .take_while(|&s| s + window.len() <= later.len())
        .map(|s| {
            window
                .iter()
                .zip(&later.samples[s..s + window.len()])
                .filter(|(a, b)| {
                    **a != PrecipitationType::Unknown && **b != PrecipitationType::Unknown
                })
                .map(|(a, b)| {
                    let diff = a.severity() - b.severity();
                    diff * diff
                })
                .sum::<f64>()
        })
        .collect()
}

/// Match two slices, returning the displacement or the reason it was rejected.
pub fn evaluate_pair(
    earlier: &Slice,
    later: &Slice,
    config: &MatchConfig,
) -> Result<f64, Rejection> {
    let min_shift = config.min_shift;
    let curve = ssd_curve(earlier, later, min_shift);
    if curve.is_empty() {
        return Err(Rejection::TooShort);
    }
    let window_len = earlier.len() - min_shift;

    let mut best_shift = 0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (shift, &ssd) in curve.iter().enumerate() {
        if ssd < min {
            min = ssd;
            best_shift = shift;
        }
        max = max.max(ssd);
    }

    let limit = config.max_noise_ratio * window_len as f64;
    if min > limit {
        return Err(Rejection::Noisy { min, limit });
    }
    if max <= config.contrast_ratio * min + config.contrast_margin {
        return Err(Rejection::Ambiguous { min, max });
    }
    if (best_shift as f64) < min_shift as f64 / config.min_shift_divisor {
        return Err(Rejection::ShiftTooSmall { best_shift });
    }
    if best_shift >= min_shift {
        return Err(Rejection::NoMotion);
    }
    Ok((min_shift - best_shift) as f64)
}

/// Displacement of `later` relative to `earlier`, or `None` when no reliable estimate exists.
pub fn estimate_shift(earlier: &Slice, later: &Slice, config: &MatchConfig) -> Option<f64> {
    evaluate_pair(earlier, later, config).ok()
}

/// Evaluate every ordered pair `i < j` and keep the accepted ones.
pub fn estimate_all(slices: &[Slice], config: &MatchConfig) -> Vec<VelocityEstimate> {
    let mut estimates = Vec::new();
    for earlier in 0..slices.len() {
        for later in earlier + 1..slices.len() {
            match evaluate_pair(&slices[earlier], &slices[later], config) {
                Ok(displacement) => estimates.push(VelocityEstimate {
                    earlier,
                    later,
                    displacement,
                }),
                Err(reason) => debug!("pair ({}, {}) rejected: {}", earlier, later, reason),
            }
        }
    }
    estimates
}
