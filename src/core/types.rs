//! Core data types shared by every pipeline stage.
//!
//! - `Grid<T>`: row-major 2-D buffer used for raw frames, classified frames and masks
//! - `PrecipitationType`: ordered precipitation labels with two sentinels
//! - `Slice`, `VelocityEstimate`, `Report`: per-point analysis products

use std::fmt;

use serde::{Deserialize, Serialize};

/// One pixel color as RGBA. Alpha is carried but never used for classification.
pub type Rgba = [u8; 4];

/// Row-major 2-D grid with fixed dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Creates a grid filled with `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Wraps an existing row-major buffer. Returns `None` if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns (width, height).
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// True if both grids have identical dimensions.
    #[inline]
    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.height && col < self.width {
            self.data.get(row * self.width + col)
        } else {
            None
        }
    }

    /// Bounds-checked access with signed coordinates.
    #[inline]
    pub fn get_signed(&self, row: i64, col: i64) -> Option<&T> {
        if row < 0 || col < 0 {
            return None;
        }
        self.get(row as usize, col as usize)
    }

    /// Overwrites one cell. Returns false if the coordinate is outside the grid.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) -> bool {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = value;
            true
        } else {
            false
        }
    }

    /// Row-major view of the underlying cells.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Applies `f` to every cell, producing a new grid of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

/// A decoded radar composite.
pub type RawFrame = Grid<Rgba>;

/// A frame of precipitation labels.
pub type ClassifiedFrame = Grid<PrecipitationType>;

/// True where a pixel never changes across the raw sequence.
pub type ArtifactMask = Grid<bool>;

/// Precipitation category of one pixel.
///
/// Variants are declared in severity order. `NoData` and `Unknown` are sentinels; severity
/// comparisons are only meaningful between `None` and `Hail`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum PrecipitationType {
    NoData = 0,
    #[default]
    None = 1,
    Cloud = 2,
    Rain = 3,
    Storm = 4,
    Hail = 5,
    Unknown = 6,
}

impl PrecipitationType {
    /// All variants in declaration order.
    pub const ALL: [PrecipitationType; 7] = [
        PrecipitationType::NoData,
        PrecipitationType::None,
        PrecipitationType::Cloud,
        PrecipitationType::Rain,
        PrecipitationType::Storm,
        PrecipitationType::Hail,
        PrecipitationType::Unknown,
    ];

    /// Discriminant printed in reports.
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Numeric level used for matching and blending.
    #[inline]
    pub fn severity(self) -> f64 {
        self as u8 as f64
    }

    /// True for the physical categories `None..=Hail`.
    #[inline]
    pub fn is_severity(self) -> bool {
        !matches!(self, PrecipitationType::NoData | PrecipitationType::Unknown)
    }

    /// Converts a blended level back to a category, flooring and clamping to `None..=Hail`.
    pub fn from_level(level: f64) -> Self {
        if !level.is_finite() {
            return PrecipitationType::None;
        }
        let floored = level.floor();
        if floored <= PrecipitationType::None.severity() {
            PrecipitationType::None
        } else if floored >= PrecipitationType::Hail.severity() {
            PrecipitationType::Hail
        } else {
            PrecipitationType::ALL[floored as usize]
        }
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            PrecipitationType::NoData => "nodata",
            PrecipitationType::None => "none",
            PrecipitationType::Cloud => "cloud",
            PrecipitationType::Rain => "rain",
            PrecipitationType::Storm => "storm",
            PrecipitationType::Hail => "hail",
            PrecipitationType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PrecipitationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named location in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub row: usize,
    pub col: usize,
}

impl PointOfInterest {
    pub fn new(name: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            name: name.into(),
            row,
            col,
        }
    }
}

/// Severity samples taken upstream of a point along the flow direction.
///
/// Index 0 is the point itself; increasing indices move against the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub samples: Vec<PrecipitationType>,
    /// Frame pixels (row, col) overwritten with `Unknown` while this slice was taken.
    pub marked: Vec<(usize, usize)>,
}

impl Slice {
    pub fn new(samples: Vec<PrecipitationType>) -> Self {
        Self {
            samples,
            marked: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples that carry no usable severity.
    pub fn unknown_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|&&s| s == PrecipitationType::Unknown)
            .count()
    }
}

/// Accepted displacement between two slices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityEstimate {
    /// Index of the earlier slice.
    pub earlier: usize,
    /// Index of the later slice.
    pub later: usize,
    /// Pixels travelled over the whole gap between the two slices.
    pub displacement: f64,
}

impl VelocityEstimate {
    /// Frame gap between the two slices.
    #[inline]
    pub fn gap(&self) -> usize {
        self.later.saturating_sub(self.earlier)
    }

    /// Pixels per frame.
    pub fn rate(&self) -> f64 {
        match self.gap() {
            0 => 0.0,
            gap => self.displacement / gap as f64,
        }
    }
}

/// Final per-point forecast.
///
/// An all-zero report (`kind == None`, `start == end == 0`) means "no determination",
/// not "no precipitation".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub point: String,
    pub kind: PrecipitationType,
    pub start: f64,
    pub end: f64,
}

impl Report {
    /// The degenerate report emitted when there is not enough signal.
    pub fn undetermined(point: impl Into<String>) -> Self {
        Self {
            point: point.into(),
            kind: PrecipitationType::None,
            start: 0.0,
            end: 0.0,
        }
    }

    /// True unless this is the degenerate report.
    pub fn is_determined(&self) -> bool {
        !(self.kind == PrecipitationType::None && self.start == 0.0 && self.end == 0.0)
    }

    /// Window length in the report's time unit.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
