//! Static overlay detection.
//!
//! City labels, borders and the legend are drawn into every composite at the same place.
//! A pixel whose color is identical in every frame of a sequence is treated as overlay.

use log::{debug, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ArtifactConfig, ClassifierConfig};
use crate::core::types::{ArtifactMask, Grid, PrecipitationType, RawFrame};
use crate::processors::classifier::classify_color;

/// Errors that can occur while building the artifact mask.
#[derive(Error, Debug, PartialEq)]
pub enum ArtifactError {
    #[error("no frames supplied")]
    NoFrames,

    #[error("frame {index} is {found:?}, expected {expected:?} (width, height)")]
    DimensionMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Result type for artifact detection.
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Build the static-artifact mask for a raw sequence.
///
/// A single frame yields an all-false mask since nothing can be compared.
pub fn detect_static_artifacts(
    frames: &[RawFrame],
    config: &ArtifactConfig,
    classifier: &ClassifierConfig,
) -> Result<ArtifactMask> {
    let first = frames.first().ok_or(ArtifactError::NoFrames)?;
    for (index, frame) in frames.iter().enumerate().skip(1) {
        if !frame.same_shape(first) {
            return Err(ArtifactError::DimensionMismatch {
                index,
                expected: first.dims(),
                found: frame.dims(),
            });
        }
    }

    let (width, height) = first.dims();
    if frames.len() < 2 {
        warn!("artifact detection needs 2+ frames; treating every pixel as data");
        return Ok(Grid::filled(width, height, false));
    }

    let rows: Vec<Vec<bool>> = (0..height)
        .into_par_iter()
        .map(|row| {
            (0..width)
                .map(|col| is_static_pixel(frames, row, col, config, classifier))
                .collect()
        })
        .collect();

    let data: Vec<bool> = rows.into_iter().flatten().collect();
    let flagged = data.iter().filter(|&&f| f).count();
    debug!(
        "artifact mask: {} of {} pixels static across {} frames",
        flagged,
        data.len(),
        frames.len()
    );

    Ok(Grid::from_vec(width, height, data).unwrap_or_else(|| Grid::filled(width, height, false)))
}

fn is_static_pixel(
    frames: &[RawFrame],
    row: usize,
    col: usize,
    config: &ArtifactConfig,
    classifier: &ClassifierConfig,
) -> bool {
    let Some(&color) = frames[0].get(row, col) else {
        return false;
    };
    if config.exempt_clear_sky && classify_color(color, classifier) == PrecipitationType::None {
        return false;
    }
    frames[1..]
        .iter()
        .all(|frame| frame.get(row, col) == Some(&color))
}
