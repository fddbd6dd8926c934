//! Visualization tools for slice profiles.
//!
//! This module renders the per-frame slices of one point together with the composite
//! profile the window is read from, using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::types::PrecipitationType;
use crate::processors::pipeline::PointAnalysis;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Nothing to plot for '{0}'")]
    EmptyProfile(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1280;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 480;

/// Line colors for slices, oldest first.
const SLICE_COLORS: &[(u8, u8, u8)] = &[
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Severity of a sample for plotting; `Unknown` is drawn at the bottom.
fn plot_level(kind: PrecipitationType) -> f64 {
    if kind.is_severity() {
        kind.severity()
    } else {
        0.0
    }
}

/// Plot every slice of a point and its composite profile, then save as PNG.
///
/// Slices are thin colored lines (older slices lighter); the composite profile is a thick
/// black line and only drawn where it carries enough weight.
pub fn plot_profile(output_path: &Path, analysis: &PointAnalysis) -> Result<()> {
    let length = analysis
        .slices
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(0)
        .max(analysis.aggregate.profile.len());
    if length == 0 {
        return Err(VisualizationError::EmptyProfile(analysis.point.name.clone()));
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let y_max = PrecipitationType::Hail.severity() + 1.0;

    let root =
        BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(0f64..length as f64, 0f64..y_max)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_labels(7)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let count = analysis.slices.len().max(1);
    for (i, slice) in analysis.slices.iter().enumerate() {
        let c = SLICE_COLORS[i % SLICE_COLORS.len()];
        let alpha = 0.3 + 0.7 * (i + 1) as f64 / count as f64;
        let color = RGBAColor(c.0, c.1, c.2, alpha);
        chart
            .draw_series(LineSeries::new(
                slice
                    .samples
                    .iter()
                    .enumerate()
                    .map(|(d, &kind)| (d as f64, plot_level(kind))),
                color.stroke_width(1),
            ))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    // Composite: one segment per contiguous run of valid positions.
    let mut runs: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (q, level) in analysis.aggregate.profile.iter().enumerate() {
        match level {
            Some(level) => current.push((q as f64, level.clamp(0.0, y_max))),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    for run in runs {
        chart
            .draw_series(LineSeries::new(run, BLACK.stroke_width(3)))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    // Positions at or above this line open the window.
    let threshold = PrecipitationType::Storm.severity();
    chart
        .draw_series(LineSeries::new(
            vec![(0.0, threshold), (length as f64, threshold)],
            RED.mix(0.4).stroke_width(1),
        ))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}
