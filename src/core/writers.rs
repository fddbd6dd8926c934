//! Writers for reports and diagnostic images.
//!
//! This module provides functions for writing:
//! - per-point report records (`name ordinal start end`, space separated)
//! - classified frames rendered with a fixed palette
//! - artifact masks as black/white PNG

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use thiserror::Error;

use crate::core::types::{ArtifactMask, ClassifiedFrame, PrecipitationType, Report};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Image encoding error.
    #[error("failed to encode image '{path}': {source}")]
    ImageError {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// Frame has no pixels.
    #[error("cannot write an empty {0} image")]
    EmptyImage(&'static str),
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Display color per category.
pub fn palette_color(kind: PrecipitationType) -> [u8; 3] {
    match kind {
        PrecipitationType::NoData => [0, 0, 0],
        PrecipitationType::None => [128, 128, 128],
        PrecipitationType::Cloud => [170, 200, 255],
        PrecipitationType::Rain => [0, 0, 255],
        PrecipitationType::Storm => [255, 0, 0],
        PrecipitationType::Hail => [0, 255, 0],
        PrecipitationType::Unknown => [255, 255, 255],
    }
}

/// Write report records to any writer, one line per report.
///
/// `label` names the destination in error messages.
pub fn write_reports_to<W: Write>(writer: W, reports: &[Report], label: &str) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(writer);

    for report in reports {
        csv_writer
            .write_record(&[
                report.point.clone(),
                report.kind.ordinal().to_string(),
                format!("{:.2}", report.start),
                format!("{:.2}", report.end),
            ])
            .map_err(|e| WriteError::CsvError {
                path: label.to_string(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: label.to_string(),
        source: e,
    })?;

    Ok(())
}

/// Write report records to a file, creating parent directories as needed.
pub fn write_reports(path: &Path, reports: &[Report]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    write_reports_to(BufWriter::new(file), reports, &path.display().to_string())
}

fn image_error(path: &Path) -> impl Fn(image::ImageError) -> WriteError + '_ {
    move |e| WriteError::ImageError {
        path: path.display().to_string(),
        source: e,
    }
}

/// Render a classified frame with [`palette_color`].
pub fn colorize(frame: &ClassifiedFrame) -> RgbImage {
    RgbImage::from_fn(frame.width() as u32, frame.height() as u32, |x, y| {
        let kind = frame
            .get(y as usize, x as usize)
            .copied()
            .unwrap_or(PrecipitationType::NoData);
        Rgb(palette_color(kind))
    })
}

/// Write a classified frame as a palette image (format from the file extension).
pub fn write_colorized_png(path: &Path, frame: &ClassifiedFrame) -> Result<()> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(WriteError::EmptyImage("classified"));
    }
    ensure_parent_dirs(path)?;
    colorize(frame).save(path).map_err(image_error(path))
}

/// Write an artifact mask: overlay pixels white, data pixels black.
pub fn write_mask_png(path: &Path, mask: &ArtifactMask) -> Result<()> {
    if mask.width() == 0 || mask.height() == 0 {
        return Err(WriteError::EmptyImage("mask"));
    }
    let (width, height) = (mask.width() as u32, mask.height() as u32);
    let image: GrayImage = ImageBuffer::from_fn(width, height, |x, y| {
        let flagged = mask.get(y as usize, x as usize).copied().unwrap_or(false);
        Luma([if flagged { 255u8 } else { 0 }])
    });
    ensure_parent_dirs(path)?;
    image.save(path).map_err(image_error(path))
}
