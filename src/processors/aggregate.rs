//! Consensus velocity and arrival window.
//!
//! Accepted pairwise estimates are averaged into one propagation rate. Every slice that took
//! part in an accepted pair is shifted forward by the distance the precipitation travels
//! until the forecast reference time and blended into a composite profile. The profile is
//! then walked outward from the point to find when severity first and last exceeds rain.

use std::collections::BTreeSet;

use log::debug;

use crate::config::AggregationConfig;
use crate::core::types::{PrecipitationType, Report, Slice, VelocityEstimate};

/// Result of aggregation for one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Consensus rate in pixels per frame (0 when undetermined)
    pub velocity: f64,
    /// Number of accepted pairwise estimates
    pub accepted: usize,
    /// Slice indices that took part in an accepted estimate
    pub good_frames: Vec<usize>,
    /// Calibrated level per profile position; `None` where the blend had too little weight
    pub profile: Vec<Option<f64>>,
    pub report: Report,
}

impl Aggregate {
    /// Nothing could be estimated for `point`.
    pub fn undetermined(point: &str) -> Self {
        Self {
            velocity: 0.0,
            accepted: 0,
            good_frames: Vec::new(),
            profile: Vec::new(),
            report: Report::undetermined(point),
        }
    }

    /// Category per profile position.
    pub fn profile_types(&self) -> Vec<PrecipitationType> {
        self.profile
            .iter()
            .map(|level| level.map_or(PrecipitationType::None, PrecipitationType::from_level))
            .collect()
    }
}

/// Blend parameters of one contributing slice.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    index: usize,
    shift: f64,
    delta: f64,
    weight: f64,
}

impl Contribution {
    fn new(index: usize, frames: usize, velocity: f64, config: &AggregationConfig) -> Self {
        let n = frames as f64;
        let shift = velocity * (n - index as f64 - 0.5);
        let delta = (config.blend_spread * shift).max(config.min_half_width);
        let weight = ((index + 1) as f64 / n).sqrt() / delta;
        Self {
            index,
            shift,
            delta,
            weight,
        }
    }
}

/// Blend the contributing slices into a calibrated level profile.
fn blend_profile(
    slices: &[Slice],
    contributions: &[Contribution],
    length: usize,
    config: &AggregationConfig,
) -> Vec<Option<f64>> {
    let mut acc = vec![0.0; length];
    let mut weights = vec![0.0; length];

    for c in contributions {
        let samples = &slices[c.index].samples;
        for q in 0..length {
            let center = q as f64 + c.shift;
            let lo = (center - c.delta).ceil().max(0.0) as i64;
            let hi = ((center + c.delta).floor() as i64).min(samples.len() as i64 - 1);
            for p in lo..=hi {
                let sample = samples[p as usize];
                if !sample.is_severity() {
                    continue;
                }
                acc[q] += c.weight * sample.severity();
                weights[q] += c.weight;
            }
        }
    }

    acc.iter()
        .zip(&weights)
        .map(|(&sum, &weight)| {
            if weight > config.min_weight {
                Some(sum / weight + config.calibration_offset)
            } else {
                None
            }
        })
        .collect()
}

/// Arrival window over the profile: (peak, start, end) in frames.
fn find_window(
    types: &[PrecipitationType],
    velocity: f64,
    merge_gap: f64,
) -> Option<(PrecipitationType, f64, f64)> {
    let mut window: Option<(PrecipitationType, f64, f64)> = None;
    for (q, &kind) in types.iter().enumerate() {
        if kind <= PrecipitationType::Rain {
            continue;
        }
        let t = q as f64 / velocity;
        window = match window {
            None => Some((kind, t, t)),
            Some((peak, start, end)) if t - end <= merge_gap => Some((peak.max(kind), start, t)),
            Some(_) => break,
        };
    }
    window
}

/// Combine slices and pairwise estimates into a report for `point`.
pub fn aggregate(
    point: &str,
    slices: &[Slice],
    estimates: &[VelocityEstimate],
    config: &AggregationConfig,
) -> Aggregate {
    let mut total = 0.0;
    let mut accepted = 0usize;
    let mut good = BTreeSet::new();
    for estimate in estimates.iter().filter(|e| e.gap() > 0 && e.later < slices.len()) {
        total += estimate.rate();
        accepted += 1;
        good.insert(estimate.earlier);
        good.insert(estimate.later);
    }
    let good_frames: Vec<usize> = good.into_iter().collect();

    if accepted < config.min_estimates.max(1) {
        debug!("{}: {} accepted estimates, not enough", point, accepted);
        return Aggregate {
            accepted,
            good_frames,
            ..Aggregate::undetermined(point)
        };
    }

    let velocity = total / accepted as f64;
    if !(velocity > 0.0) || !velocity.is_finite() {
        debug!("{}: consensus velocity {:.3} is not usable", point, velocity);
        return Aggregate {
            accepted,
            good_frames,
            ..Aggregate::undetermined(point)
        };
    }

    let contributions: Vec<Contribution> = good_frames
        .iter()
        .map(|&index| Contribution::new(index, slices.len(), velocity, config))
        .collect();
    let length = slices.iter().map(Slice::len).max().unwrap_or(0);
    let profile = blend_profile(slices, &contributions, length, config);

    let mut result = Aggregate {
        velocity,
        accepted,
        good_frames,
        profile,
        report: Report::undetermined(point),
    };

    if let Some((kind, start, end)) =
        find_window(&result.profile_types(), velocity, config.merge_gap)
    {
        result.report = Report {
            point: point.to_string(),
            kind,
            start: start * config.period,
            end: end * config.period,
        };
    }
    debug!(
        "{}: v = {:.2} px/frame from {} estimates, report {:?}",
        point, velocity, accepted, result.report
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PrecipitationType as P;

    const V: f64 = 4.0;

    /// Profile at forecast time: `blocks` of (start, end, kind), None elsewhere.
    fn profile(blocks: &[(usize, usize, P)]) -> Vec<P> {
        (0..100)
            .map(|q| {
                blocks
                    .iter()
                    .find(|(start, end, _)| (*start..*end).contains(&q))
                    .map_or(P::None, |(_, _, kind)| *kind)
            })
            .collect()
    }

    /// Slices as the point would have seen them: slice i lags by v * (n - i - 0.5) pixels.
    fn history(target: &[P], n: usize) -> Vec<Slice> {
        (0..n)
            .map(|i| {
                let lag = (V * (n as f64 - i as f64 - 0.5)) as usize;
                Slice::new(
                    (0..target.len())
                        .map(|p| if p >= lag { target[p - lag] } else { P::None })
                        .collect(),
                )
            })
            .collect()
    }

    fn consistent_estimates() -> Vec<VelocityEstimate> {
        vec![
            VelocityEstimate { earlier: 0, later: 1, displacement: V },
            VelocityEstimate { earlier: 1, later: 2, displacement: V },
            VelocityEstimate { earlier: 0, later: 2, displacement: 2.0 * V },
        ]
    }

    #[test]
    fn test_single_estimate_is_undetermined() {
        let slices = history(&profile(&[(20, 25, P::Storm)]), 3);
        let estimates = vec![VelocityEstimate { earlier: 0, later: 1, displacement: V }];
        let result = aggregate("p", &slices, &estimates, &AggregationConfig::default());
        assert_eq!(result.report, Report::undetermined("p"));
        assert_eq!(result.accepted, 1);
    }

    #[test]
    fn test_storm_step_window() {
        let config = AggregationConfig::default();
        let slices = history(&profile(&[(20, 25, P::Storm)]), 3);
        let result = aggregate("p", &slices, &consistent_estimates(), &config);

        assert_eq!(result.velocity, V);
        assert_eq!(result.good_frames, vec![0, 1, 2]);
        assert_eq!(result.report.kind, P::Storm);

        // The step spans t = 20/4 .. 25/4 frames.
        let step_start = 20.0 / V * config.period;
        let step_end = 25.0 / V * config.period;
        let tolerance = config.merge_gap * config.period;
        assert!((result.report.start - step_start).abs() <= tolerance);
        assert!((result.report.end - step_end).abs() <= tolerance);
        assert!(result.report.start <= result.report.end);
        assert!((result.report.start - 52.5).abs() < 1e-9);
        assert!((result.report.end - 57.5).abs() < 1e-9);
    }

    #[test]
    fn test_window_merges_small_gaps_and_stops_at_large() {
        let config = AggregationConfig::default();
        let target = profile(&[(20, 25, P::Storm), (29, 34, P::Storm), (70, 75, P::Hail)]);
        let slices = history(&target, 3);
        let result = aggregate("p", &slices, &consistent_estimates(), &config);

        assert_eq!(result.report.kind, P::Storm);
        assert!((result.report.start - 52.5).abs() < 1e-9);
        assert!((result.report.end - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_qualifying_sample() {
        let slices = history(&profile(&[(20, 25, P::Rain)]), 3);
        let result = aggregate("p", &slices, &consistent_estimates(), &AggregationConfig::default());
        assert!(!result.report.is_determined());
        assert_eq!(result.velocity, V);
        assert!(!result.profile.is_empty());
    }

    #[test]
    fn test_unknown_samples_never_count() {
        let slices = vec![Slice::new(vec![P::Unknown; 100]); 3];
        let result = aggregate("p", &slices, &consistent_estimates(), &AggregationConfig::default());
        assert!(result.profile.iter().all(Option::is_none));
        assert!(!result.report.is_determined());
    }

    #[test]
    fn test_non_positive_velocity_is_undetermined() {
        let slices = history(&profile(&[(20, 25, P::Storm)]), 3);
        let estimates = vec![
            VelocityEstimate { earlier: 0, later: 1, displacement: 0.0 },
            VelocityEstimate { earlier: 1, later: 2, displacement: 0.0 },
        ];
        let result = aggregate("p", &slices, &estimates, &AggregationConfig::default());
        assert_eq!(result.velocity, 0.0);
        assert!(!result.report.is_determined());
    }

    #[test]
    fn test_contribution_weights() {
        let config = AggregationConfig::default();
        let oldest = Contribution::new(0, 3, V, &config);
        let newest = Contribution::new(2, 3, V, &config);
        assert_eq!(oldest.shift, 10.0);
        assert_eq!(oldest.delta, 2.5);
        assert_eq!(newest.shift, 2.0);
        assert_eq!(newest.delta, 1.0);
        assert!(newest.weight > oldest.weight);
        assert!((newest.weight - 1.0).abs() < 1e-12);
    }
}
