//! Loaders for radar composite frames and direction tables.
//!
//! This module provides:
//! - printf-style frame pattern expansion (`radar_%02d.png`)
//! - still image decoding into RGBA grids (PNG, JPEG, GIF)
//! - animated GIF decoding into a frame sequence
//! - the `name,dx,dy` direction CSV consumed by the motion table

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use log::{debug, info};
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::config::FrameConfig;
use crate::core::types::{Grid, RawFrame};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to decode image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Frame pattern '{0}' has no %d placeholder")]
    InvalidPattern(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("No frames in '{0}'")]
    NoFrames(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Substitute `index` into the first `%d` / `%Nd` / `%0Nd` placeholder of `pattern`.
///
/// A `0` flag pads with zeros, a bare width pads with spaces, as printf does.
pub fn expand_pattern(pattern: &str, index: u32) -> Result<String> {
    let placeholder = Regex::new(r"%(0)?(\d*)d")?;
    let caps = placeholder
        .captures(pattern)
        .ok_or_else(|| LoaderError::InvalidPattern(pattern.to_string()))?;

    let width: usize = match caps.get(2).map(|m| m.as_str()) {
        Some(w) if !w.is_empty() => w
            .parse()
            .map_err(|_| LoaderError::InvalidPattern(pattern.to_string()))?,
        _ => 0,
    };
    let number = if caps.get(1).is_some() {
        format!("{:0width$}", index, width = width)
    } else {
        format!("{:>width$}", index, width = width)
    };

    let span = caps.get(0).map_or(0..0, |m| m.range());
    let mut expanded = String::with_capacity(pattern.len() + number.len());
    expanded.push_str(&pattern[..span.start]);
    expanded.push_str(&number);
    expanded.push_str(&pattern[span.end..]);
    Ok(expanded)
}

/// Paths for frame indices `first..=last`, in index order.
pub fn frame_paths(pattern: &str, first: u32, last: u32) -> Result<Vec<PathBuf>> {
    (first..=last)
        .map(|i| expand_pattern(pattern, i).map(PathBuf::from))
        .collect()
}

fn rgba_to_grid(image: RgbaImage) -> RawFrame {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let pixels: Vec<[u8; 4]> = image.pixels().map(|p| p.0).collect();
    Grid::from_vec(width, height, pixels).unwrap_or_else(|| Grid::filled(0, 0, [0; 4]))
}

/// Decode one still image into an RGBA grid.
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<RawFrame> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| LoaderError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(rgba_to_grid(image.to_rgba8()))
}

/// Decode every frame of an animated GIF, fully composited.
pub fn load_gif_frames<P: AsRef<Path>>(path: P) -> Result<Vec<RawFrame>> {
    let path = path.as_ref();
    let to_error = |e: image::ImageError| LoaderError::Image {
        path: path.to_path_buf(),
        source: e,
    };

    let reader = BufReader::new(File::open(path)?);
    let decoder = GifDecoder::new(reader).map_err(to_error)?;
    let frames = decoder.into_frames().collect_frames().map_err(to_error)?;
    if frames.is_empty() {
        return Err(LoaderError::NoFrames(path.display().to_string()));
    }

    debug!("Decoded {} frames from {}", frames.len(), path.display());
    Ok(frames
        .into_iter()
        .map(|frame| rgba_to_grid(frame.into_buffer()))
        .collect())
}

/// Load the raw sequence described by `config`, oldest first.
///
/// An animated GIF takes precedence over the filename pattern.
pub fn load_frames(config: &FrameConfig) -> Result<Vec<RawFrame>> {
    if let Some(gif) = &config.gif {
        let frames = load_gif_frames(gif)?;
        info!("Loaded {} frames from {}", frames.len(), gif.display());
        return Ok(frames);
    }

    let paths = frame_paths(&config.pattern, config.first, config.last)?;
    if paths.is_empty() {
        return Err(LoaderError::NoFrames(config.pattern.clone()));
    }
    let frames = paths
        .par_iter()
        .map(load_frame)
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} frames matching {}", frames.len(), config.pattern);
    Ok(frames)
}

#[derive(Debug, Deserialize)]
struct DirectionRecord {
    name: String,
    dx: f64,
    dy: f64,
}

/// Load a `name,dx,dy` direction table (with header row).
pub fn load_directions_csv<P: AsRef<Path>>(path: P) -> Result<HashMap<String, [f64; 2]>> {
    let file = File::open(path.as_ref())?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut directions = HashMap::new();
    for record in reader.deserialize() {
        let record: DirectionRecord = record?;
        if record.name.is_empty() {
            return Err(LoaderError::ParseError(
                "direction record with empty name".to_string(),
            ));
        }
        directions.insert(record.name, [record.dx, record.dy]);
    }
    debug!(
        "Loaded {} directions from {}",
        directions.len(),
        path.as_ref().display()
    );
    Ok(directions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_expand_pattern() -> Result<()> {
        assert_eq!(expand_pattern("radar_%02d.png", 3)?, "radar_03.png");
        assert_eq!(expand_pattern("radar_%02d.png", 123)?, "radar_123.png");
        assert_eq!(expand_pattern("images/%d.png", 7)?, "images/7.png");
        assert_eq!(expand_pattern("f%3d.gif", 5)?, "f  5.gif");
        Ok(())
    }

    #[test]
    fn test_expand_pattern_without_placeholder() {
        assert!(matches!(
            expand_pattern("radar.png", 1),
            Err(LoaderError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_frame_paths_order() -> Result<()> {
        let paths = frame_paths("frame_%d.png", 8, 11)?;
        let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(
            names,
            vec!["frame_8.png", "frame_9.png", "frame_10.png", "frame_11.png"]
        );
        Ok(())
    }

    #[test]
    fn test_load_png_frames() -> Result<()> {
        let dir = tempdir()?;
        for i in 0..2u8 {
            let mut image = RgbaImage::from_pixel(4, 3, Rgba([200, 200, 200, 255]));
            image.put_pixel(1, 2, Rgba([10 * i, 20, 220, 255]));
            image
                .save(dir.path().join(format!("frame_{}.png", i)))
                .unwrap();
        }

        let config = FrameConfig {
            pattern: dir.path().join("frame_%d.png").display().to_string(),
            first: 0,
            last: 1,
            ..FrameConfig::default()
        };
        let frames = load_frames(&config)?;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].dims(), (4, 3));
        // Pixel (x=1, y=2) is row 2, col 1.
        assert_eq!(frames[1].get(2, 1), Some(&[10, 20, 220, 255]));
        assert_eq!(frames[0].get(0, 0), Some(&[200, 200, 200, 255]));
        Ok(())
    }

    #[test]
    fn test_missing_frame_is_error() {
        let dir = tempdir().unwrap();
        let config = FrameConfig {
            pattern: dir.path().join("missing_%d.png").display().to_string(),
            first: 0,
            last: 0,
            ..FrameConfig::default()
        };
        assert!(matches!(
            load_frames(&config),
            Err(LoaderError::Image { .. })
        ));
    }

    #[test]
    fn test_load_gif_frames() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sequence.gif");
        {
            let file = File::create(&path)?;
            let mut encoder = GifEncoder::new(file);
            let frames = (0..3u8).map(|i| {
                let image = RgbaImage::from_pixel(5, 5, Rgba([i * 80, 0, 0, 255]));
                Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(100, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }

        let frames = load_gif_frames(&path)?;
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.dims() == (5, 5)));
        Ok(())
    }

    #[test]
    fn test_load_directions_csv() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "name,dx,dy")?;
        writeln!(file, "nnov, 1.0, -0.5")?;
        writeln!(file, "test,0.0,2.0")?;
        file.flush()?;

        let directions = load_directions_csv(file.path())?;
        assert_eq!(directions.len(), 2);
        assert_eq!(directions["nnov"], [1.0, -0.5]);
        assert_eq!(directions["test"], [0.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_load_directions_csv_bad_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name,dx,dy").unwrap();
        writeln!(file, "nnov,east,1").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_directions_csv(file.path()),
            Err(LoaderError::Csv(_))
        ));
    }
}
