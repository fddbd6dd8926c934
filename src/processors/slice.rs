//! Directional slice extraction.
//!
//! A slice samples a repaired frame upstream of a point, against the flow direction. Each
//! sample is the highest severity over a small angular fan (`Unknown` when no ray reads a
//! severity), with a perpendicular shift that
//! grows toward the fan edges to follow curved flow.
//!
//! Extraction marks the pixels under the two fan edges as `Unknown` in the frame it is
//! given. Callers must pass a frame they own for this point alone.

use std::f64::consts::PI;

use log::trace;
use thiserror::Error;

use crate::config::SliceConfig;
use crate::core::types::{ClassifiedFrame, PointOfInterest, PrecipitationType, Slice};

/// Errors that can occur during slice extraction.
#[derive(Error, Debug, PartialEq)]
pub enum SliceError {
    /// The fan left the frame; the point is too close to the border for this geometry.
    #[error("slice for '{point}' samples outside the frame at row {row}, col {col}")]
    OutOfBounds { point: String, row: i64, col: i64 },

    #[error("direction vector for '{0}' has zero length")]
    ZeroDirection(String),
}

/// Result type for slice extraction.
pub type Result<T> = std::result::Result<T, SliceError>;

/// Angular fan around a direction.
#[derive(Debug, Clone)]
struct Fan {
    /// (angle, perpendicular shift) per ray, ordered from one edge to the other
    rays: Vec<(f64, f64)>,
}

impl Fan {
    fn new(theta: f64, config: &SliceConfig) -> Self {
        let half = config.half_angle_deg * PI / 180.0;
        let step = config.angle_step_deg * PI / 180.0;
        let steps = if step > 0.0 {
            (half / step + 1e-9).floor() as i64
        } else {
            0
        };

        let rays = (-steps..=steps)
            .map(|k| {
                let offset = k as f64 * step;
                let shift = if half > 0.0 {
                    config.max_shift_px * offset / half
                } else {
                    0.0
                };
                (theta + offset, shift)
            })
            .collect();
        Self { rays }
    }

    /// Pixel under ray `(angle, shift)` at distance `d` upstream of `(row0, col0)`.
    fn position(row0: f64, col0: f64, d: f64, angle: f64, shift: f64) -> (i64, i64) {
        let (sin, cos) = angle.sin_cos();
        let col = col0 - d * cos - shift * sin;
        let row = row0 - d * sin + shift * cos;
        (row.round() as i64, col.round() as i64)
    }
}

fn checked_index(
    frame: &ClassifiedFrame,
    point: &PointOfInterest,
    (row, col): (i64, i64),
) -> Result<(usize, usize)> {
    if row < 0 || col < 0 || row as usize >= frame.height() || col as usize >= frame.width() {
        return Err(SliceError::OutOfBounds {
            point: point.name.clone(),
            row,
            col,
        });
    }
    Ok((row as usize, col as usize))
}

/// Extract one slice and mark the fan edges as explored.
///
/// `direction` is (dx, dy) in image axes: x along columns, y along rows.
pub fn extract_slice(
    frame: &mut ClassifiedFrame,
    point: &PointOfInterest,
    direction: [f64; 2],
    config: &SliceConfig,
) -> Result<Slice> {
    let [dx, dy] = direction;
    if dx.hypot(dy) == 0.0 || !dx.is_finite() || !dy.is_finite() {
        return Err(SliceError::ZeroDirection(point.name.clone()));
    }

    let fan = Fan::new(dy.atan2(dx), config);
    let row0 = point.row as f64;
    let col0 = point.col as f64;

    let mut samples = Vec::with_capacity(config.length);
    let mut edges = Vec::with_capacity(2 * config.length);

    for d in 0..config.length {
        let d = d as f64;

        let mut best: Option<PrecipitationType> = None;
        for (i, &(angle, shift)) in fan.rays.iter().enumerate() {
            let (row, col) = checked_index(frame, point, Fan::position(row0, col0, d, angle, shift))?;
            if let Some(&value) = frame.get(row, col).filter(|v| v.is_severity()) {
                best = Some(best.map_or(value, |b| b.max(value)));
            }
            if i == 0 || i + 1 == fan.rays.len() {
                edges.push((row, col));
            }
        }
        samples.push(best.unwrap_or(PrecipitationType::Unknown));
    }

    // Marks only affect later extractions from this frame.
    let mut marked = Vec::new();
    for (row, col) in edges {
        if frame.get(row, col) != Some(&PrecipitationType::Unknown) {
            frame.set(row, col, PrecipitationType::Unknown);
            marked.push((row, col));
        }
    }

    trace!(
        "slice '{}': {} samples, {} pixels marked",
        point.name,
        samples.len(),
        marked.len()
    );
    Ok(Slice { samples, marked })
}

/// One slice per frame, in frame order.
pub fn extract_slices(
    frames: &mut [ClassifiedFrame],
    point: &PointOfInterest,
    direction: [f64; 2],
    config: &SliceConfig,
) -> Result<Vec<Slice>> {
    frames
        .iter_mut()
        .map(|frame| extract_slice(frame, point, direction, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Grid, PrecipitationType as P};

    const SIZE: usize = 300;

    fn point() -> PointOfInterest {
        PointOfInterest::new("center", 150, 150)
    }

    fn ray_config() -> SliceConfig {
        SliceConfig {
            half_angle_deg: 0.0,
            ..SliceConfig::default()
        }
    }

    /// Storm in a vertical band of columns, None elsewhere.
    fn banded_frame(cols: std::ops::Range<usize>) -> ClassifiedFrame {
        Grid::from_fn(SIZE, SIZE, |_, col| {
            if cols.contains(&col) {
                P::Storm
            } else {
                P::None
            }
        })
    }

    fn unknown_pixels(frame: &ClassifiedFrame) -> usize {
        frame.as_slice().iter().filter(|&&v| v == P::Unknown).count()
    }

    #[test]
    fn test_slice_length_and_labels() {
        let mut frame = banded_frame(100..110);
        let slice = extract_slice(&mut frame, &point(), [1.0, 0.3], &SliceConfig::default()).unwrap();
        assert_eq!(slice.len(), 100);
        assert!(slice
            .samples
            .iter()
            .all(|s| s.is_severity() || *s == P::Unknown));
    }

    #[test]
    fn test_single_ray_samples_upstream() {
        // Flow toward +x: upstream is toward smaller columns.
        let mut frame = banded_frame(100..110);
        let slice = extract_slice(&mut frame, &point(), [1.0, 0.0], &ray_config()).unwrap();
        for d in 0..100 {
            let expected = if (41..=50).contains(&d) { P::Storm } else { P::None };
            assert_eq!(slice.samples[d], expected, "sample {}", d);
        }
        assert_eq!(slice.marked.len(), 100);
        assert_eq!(slice.marked[0], (150, 150));
    }

    #[test]
    fn test_direction_is_normalized_by_angle() {
        let mut a = banded_frame(100..110);
        let mut b = banded_frame(100..110);
        let s1 = extract_slice(&mut a, &point(), [1.0, 0.0], &ray_config()).unwrap();
        let s2 = extract_slice(&mut b, &point(), [5.0, 0.0], &ray_config()).unwrap();
        assert_eq!(s1.samples, s2.samples);
    }

    #[test]
    fn test_fan_catches_offset_band() {
        // Storm patch below the central ray; only the fan edge reaches it.
        let mut frame = Grid::from_fn(SIZE, SIZE, |row, col| {
            if (157..=160).contains(&row) && (100..120).contains(&col) {
                P::Storm
            } else {
                P::None
            }
        });
        let mut plain = frame.clone();

        let slice = extract_slice(&mut frame, &point(), [1.0, 0.0], &SliceConfig::default()).unwrap();
        assert!(slice.samples[30..60].iter().any(|&s| s == P::Storm));

        let ray = extract_slice(&mut plain, &point(), [1.0, 0.0], &ray_config()).unwrap();
        assert!(ray.samples.iter().all(|&s| s == P::None));
    }

    #[test]
    fn test_fresh_frame_has_no_unknown_samples() {
        let mut config = SliceConfig::default();
        config.length = 150;
        for direction in [[1.0, 0.0], [1.0, 0.3], [0.7, 0.7], [-0.2, 1.0]] {
            let mut frame: ClassifiedFrame = Grid::filled(400, 400, P::Storm);
            let centre = PointOfInterest::new("centre", 200, 200);
            let slice = extract_slice(&mut frame, &centre, direction, &config).unwrap();
            assert_eq!(slice.unknown_count(), 0, "direction {:?}", direction);
            assert!(slice.samples.iter().all(|&s| s == P::Storm));
            assert!(!slice.marked.is_empty());
        }
    }

    #[test]
    fn test_marked_pixel_does_not_hide_severity() {
        // Only the central ray has been explored; the other rays still read the band.
        let mut frame = banded_frame(100..110);
        for col in 0..SIZE {
            frame.set(150, col, P::Unknown);
        }
        let slice = extract_slice(&mut frame, &point(), [1.0, 0.0], &SliceConfig::default()).unwrap();
        assert_eq!(slice.unknown_count(), 0);
        assert!(slice.samples[40..52].iter().any(|&s| s == P::Storm));
    }

    #[test]
    fn test_marking_never_decreases() {
        let mut frame = banded_frame(100..110);
        let config = SliceConfig::default();

        extract_slice(&mut frame, &point(), [1.0, 0.0], &config).unwrap();
        let after_first = unknown_pixels(&frame);
        assert!(after_first > 0);

        let again = extract_slice(&mut frame, &point(), [1.0, 0.0], &config).unwrap();
        assert_eq!(unknown_pixels(&frame), after_first);
        assert!(again.marked.is_empty());

        extract_slice(&mut frame, &point(), [1.0, 0.2], &config).unwrap();
        assert!(unknown_pixels(&frame) >= after_first);
    }

    #[test]
    fn test_explored_geometry_reads_unknown() {
        let mut frame = banded_frame(100..110);
        extract_slice(&mut frame, &point(), [1.0, 0.0], &ray_config()).unwrap();
        let again = extract_slice(&mut frame, &point(), [1.0, 0.0], &ray_config()).unwrap();
        assert_eq!(again.unknown_count(), 100);
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let mut frame = banded_frame(100..110);
        let near_edge = PointOfInterest::new("edge", 150, 40);
        let result = extract_slice(&mut frame, &near_edge, [1.0, 0.0], &SliceConfig::default());
        assert!(matches!(result, Err(SliceError::OutOfBounds { .. })));
    }

    #[test]
    fn test_zero_direction_is_error() {
        let mut frame = banded_frame(100..110);
        let result = extract_slice(&mut frame, &point(), [0.0, 0.0], &SliceConfig::default());
        assert_eq!(result, Err(SliceError::ZeroDirection("center".to_string())));
    }

    #[test]
    fn test_extract_slices_per_frame() {
        let mut frames = vec![banded_frame(100..110), banded_frame(90..100)];
        let slices = extract_slices(&mut frames, &point(), [1.0, 0.0], &ray_config()).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].samples[45], P::Storm);
        assert_eq!(slices[1].samples[55], P::Storm);
    }
}
