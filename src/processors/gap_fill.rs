//! Repair of overlay and missing-data pixels.
//!
//! Two passes:
//! 1. Spatial: each pixel takes the value of the first non-overlay pixel found by scanning
//!    concentric offset rings around it.
//! 2. Temporal: pixels still `NoData` take the value at the same position in the nearest
//!    frame (by time distance) that has data.
//!
//! Anything left unresolved becomes `None`, so the output never contains `NoData`.

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::GapFillConfig;
use crate::core::types::{ArtifactMask, ClassifiedFrame, Grid, PrecipitationType};

/// Errors that can occur during gap filling.
#[derive(Error, Debug, PartialEq)]
pub enum GapFillError {
    #[error("frame {index} is {found:?}, mask is {expected:?} (width, height)")]
    DimensionMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Result type for gap filling.
pub type Result<T> = std::result::Result<T, GapFillError>;

/// Search offsets (row, col) ordered by ring.
///
/// Each axis walks `0, -1, 1, .., -r, r`; pairs are enumerated row-major and stably sorted
/// by `max(|drow|, |dcol|)`. Ties inside a ring keep enumeration order, so this is not a
/// Euclidean nearest-neighbor search.
pub fn ring_offsets(max_radius: usize) -> Vec<(i64, i64)> {
    let mut axis = Vec::with_capacity(2 * max_radius + 1);
    axis.push(0);
    for r in 1..=max_radius as i64 {
        axis.push(-r);
        axis.push(r);
    }

    let mut offsets: Vec<(i64, i64)> = axis
        .iter()
        .flat_map(|&drow| axis.iter().map(move |&dcol| (drow, dcol)))
        .collect();
    offsets.sort_by_key(|&(drow, dcol)| drow.abs().max(dcol.abs()));
    offsets
}

/// Spatial pass for one frame.
pub fn fill_spatial(
    frame: &ClassifiedFrame,
    mask: &ArtifactMask,
    offsets: &[(i64, i64)],
) -> ClassifiedFrame {
    Grid::from_fn(frame.width(), frame.height(), |row, col| {
        resolve_pixel(frame, mask, offsets, row, col)
    })
}

fn resolve_pixel(
    frame: &ClassifiedFrame,
    mask: &ArtifactMask,
    offsets: &[(i64, i64)],
    row: usize,
    col: usize,
) -> PrecipitationType {
    let mut saw_none = false;
    let mut saw_nodata = false;

    for &(drow, dcol) in offsets {
        let r = row as i64 + drow;
        let c = col as i64 + dcol;
        let (Some(&value), Some(&is_artifact)) = (frame.get_signed(r, c), mask.get_signed(r, c))
        else {
            continue;
        };
        if !is_artifact {
            return value;
        }
        match value {
            PrecipitationType::None => saw_none = true,
            PrecipitationType::NoData => saw_nodata = true,
            _ => {}
        }
    }

    if saw_none {
        PrecipitationType::None
    } else if saw_nodata {
        PrecipitationType::NoData
    } else {
        frame
            .get(row, col)
            .copied()
            .unwrap_or(PrecipitationType::None)
    }
}

/// Temporal pass: replace `NoData` with the nearest frame's value at the same pixel.
///
/// Reads only from `frames`, so the result is independent of processing order. The earlier
/// frame is preferred when two candidates are equally far away.
pub fn fill_temporal(frames: &[ClassifiedFrame], span: usize) -> Vec<ClassifiedFrame> {
    (0..frames.len())
        .into_par_iter()
        .map(|t| {
            let frame = &frames[t];
            Grid::from_fn(frame.width(), frame.height(), |row, col| {
                let value = frame
                    .get(row, col)
                    .copied()
                    .unwrap_or(PrecipitationType::NoData);
                if value != PrecipitationType::NoData {
                    return value;
                }
                nearest_in_time(frames, t, span, row, col).unwrap_or(PrecipitationType::NoData)
            })
        })
        .collect()
}

fn nearest_in_time(
    frames: &[ClassifiedFrame],
    t: usize,
    span: usize,
    row: usize,
    col: usize,
) -> Option<PrecipitationType> {
    for dt in 1..=span {
        let candidates = [t.checked_sub(dt), Some(t + dt)];
        for other in candidates.into_iter().flatten() {
            if let Some(&value) = frames.get(other).and_then(|f| f.get(row, col)) {
                if value != PrecipitationType::NoData {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Run both passes and force leftovers to `None`.
pub fn fill_gaps(
    frames: &[ClassifiedFrame],
    mask: &ArtifactMask,
    config: &GapFillConfig,
) -> Result<Vec<ClassifiedFrame>> {
    for (index, frame) in frames.iter().enumerate() {
        if !frame.same_shape(mask) {
            return Err(GapFillError::DimensionMismatch {
                index,
                expected: mask.dims(),
                found: frame.dims(),
            });
        }
    }

    let offsets = ring_offsets(config.max_radius);
    let spatial: Vec<ClassifiedFrame> = frames
        .par_iter()
        .map(|frame| fill_spatial(frame, mask, &offsets))
        .collect();

    let span = config.temporal_span.unwrap_or(frames.len());
    let temporal = fill_temporal(&spatial, span);

    let mut forced = 0usize;
    let repaired: Vec<ClassifiedFrame> = temporal
        .into_iter()
        .map(|frame| {
            frame.map(|&value| {
                if value == PrecipitationType::NoData {
                    forced += 1;
                    PrecipitationType::None
                } else {
                    value
                }
            })
        })
        .collect();
    debug!("gap fill: {} pixels had no data in any frame", forced);

    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PrecipitationType as P;

    fn no_artifacts(width: usize, height: usize) -> ArtifactMask {
        Grid::filled(width, height, false)
    }

    #[test]
    fn test_ring_offsets_order() {
        let offsets = ring_offsets(2);
        assert_eq!(offsets.len(), 25);
        assert_eq!(offsets[0], (0, 0));
        // Ring 1 in enumeration order.
        assert_eq!(&offsets[1..4], &[(0, -1), (0, 1), (-1, 0)]);
        let rings: Vec<i64> = offsets.iter().map(|(r, c)| r.abs().max(c.abs())).collect();
        assert!(rings.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(rings.iter().filter(|&&r| r == 1).count(), 8);
    }

    #[test]
    fn test_ring_offsets_large_radius() {
        let radius = 60;
        let offsets = ring_offsets(radius);
        let side = 2 * radius + 1;
        assert_eq!(offsets.len(), side * side);
        let unique: std::collections::HashSet<_> = offsets.iter().collect();
        assert_eq!(unique.len(), offsets.len());
        assert_eq!(offsets.last().map(|(r, c)| r.abs().max(c.abs())), Some(60));
    }

    #[test]
    fn test_artifact_surrounded_by_rain() {
        let mut frame = Grid::filled(5, 5, P::Rain);
        frame.set(2, 2, P::Unknown);
        let mut mask = no_artifacts(5, 5);
        mask.set(2, 2, true);

        let repaired = fill_gaps(&[frame], &mask, &GapFillConfig::default()).unwrap();
        assert_eq!(repaired[0].get(2, 2), Some(&P::Rain));
    }

    #[test]
    fn test_non_artifact_keeps_value() {
        let mut frame = Grid::filled(3, 3, P::None);
        frame.set(1, 1, P::Storm);
        let repaired = fill_gaps(&[frame], &no_artifacts(3, 3), &GapFillConfig::default()).unwrap();
        assert_eq!(repaired[0].get(1, 1), Some(&P::Storm));
        assert_eq!(repaired[0].get(0, 0), Some(&P::None));
    }

    #[test]
    fn test_first_hit_follows_enumeration_order() {
        // Both (1, 0) and (1, 2) are ring-1 neighbors of (1, 1); (1, 0) comes first.
        let mut frame = Grid::filled(3, 3, P::Unknown);
        frame.set(1, 0, P::Rain);
        frame.set(1, 2, P::Hail);
        let mut mask = Grid::filled(3, 3, true);
        mask.set(1, 0, false);
        mask.set(1, 2, false);

        let repaired = fill_spatial(&frame, &mask, &ring_offsets(1));
        assert_eq!(repaired.get(1, 1), Some(&P::Rain));
    }

    #[test]
    fn test_all_artifact_fallbacks() {
        let offsets = ring_offsets(1);

        // A rejected None neighbor wins.
        let mut frame = Grid::filled(3, 3, P::Storm);
        frame.set(0, 0, P::None);
        frame.set(0, 1, P::NoData);
        let mask = Grid::filled(3, 3, true);
        assert_eq!(fill_spatial(&frame, &mask, &offsets).get(1, 1), Some(&P::None));

        // Otherwise a rejected NoData neighbor.
        let mut frame = Grid::filled(3, 3, P::Storm);
        frame.set(0, 1, P::NoData);
        assert_eq!(fill_spatial(&frame, &mask, &offsets).get(1, 1), Some(&P::NoData));

        // Otherwise the original value.
        let frame = Grid::filled(3, 3, P::Storm);
        assert_eq!(fill_spatial(&frame, &mask, &offsets).get(1, 1), Some(&P::Storm));
    }

    #[test]
    fn test_temporal_fallback_prefers_nearest() {
        let frames = vec![
            Grid::filled(2, 2, P::Hail),
            Grid::filled(2, 2, P::Rain),
            Grid::filled(2, 2, P::NoData),
            Grid::filled(2, 2, P::NoData),
            Grid::filled(2, 2, P::Storm),
        ];
        let repaired = fill_gaps(&frames, &no_artifacts(2, 2), &GapFillConfig::default()).unwrap();
        // Frame 2: Rain (dt=1 before) beats Storm (dt=2 after).
        assert_eq!(repaired[2].get(0, 0), Some(&P::Rain));
        // Frame 3: Storm (dt=1 after) beats Rain (dt=2 before).
        assert_eq!(repaired[3].get(0, 0), Some(&P::Storm));
    }

    #[test]
    fn test_temporal_tie_prefers_earlier() {
        let frames = vec![
            Grid::filled(1, 1, P::Rain),
            Grid::filled(1, 1, P::NoData),
            Grid::filled(1, 1, P::Storm),
        ];
        let repaired = fill_temporal(&frames, 3);
        assert_eq!(repaired[1].get(0, 0), Some(&P::Rain));
    }

    #[test]
    fn test_temporal_span_limit() {
        let frames = vec![
            Grid::filled(1, 1, P::Rain),
            Grid::filled(1, 1, P::NoData),
            Grid::filled(1, 1, P::NoData),
        ];
        let config = GapFillConfig {
            max_radius: 0,
            temporal_span: Some(1),
        };
        let repaired = fill_gaps(&frames, &no_artifacts(1, 1), &config).unwrap();
        assert_eq!(repaired[1].get(0, 0), Some(&P::Rain));
        // Out of reach: forced to None.
        assert_eq!(repaired[2].get(0, 0), Some(&P::None));
    }

    #[test]
    fn test_no_nodata_survives() {
        let frames = vec![Grid::filled(4, 4, P::NoData), Grid::filled(4, 4, P::NoData)];
        let mut mask = no_artifacts(4, 4);
        mask.set(0, 0, true);
        let repaired = fill_gaps(&frames, &mask, &GapFillConfig::default()).unwrap();
        for frame in &repaired {
            assert!(frame.as_slice().iter().all(|&v| v != P::NoData));
        }
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let frames = vec![Grid::filled(2, 2, P::None)];
        let result = fill_gaps(&frames, &no_artifacts(3, 2), &GapFillConfig::default());
        assert!(matches!(
            result,
            Err(GapFillError::DimensionMismatch { index: 0, .. })
        ));
    }
}
