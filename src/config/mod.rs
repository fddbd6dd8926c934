//! Configuration types for the nowcast pipeline.
//!
//! Every calibration constant used by the processors lives here as a named field with a
//! serde default, so a YAML file only needs to list the values it overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::PointOfInterest;

/// Cross-field configuration problems detected before processing begins.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("at least 2 frames are required, got {0}")]
    TooFewFrames(usize),

    #[error("at least 2 slice frames are required, got {0}")]
    TooFewSliceFrames(usize),

    #[error("min_shift ({min_shift}) must be smaller than slice length ({length})")]
    ShiftExceedsSlice { min_shift: usize, length: usize },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("point #{0} has an empty name")]
    UnnamedPoint(usize),
}

/// Where the raw frames come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Filename pattern with a printf-style `%d` / `%02d` placeholder
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// First frame index substituted into the pattern
    #[serde(default)]
    pub first: u32,

    /// Last frame index (inclusive)
    #[serde(default = "default_last_frame")]
    pub last: u32,

    /// Animated GIF holding the whole sequence; takes precedence over `pattern`
    #[serde(default)]
    pub gif: Option<PathBuf>,

    /// Number of most recent repaired frames sliced per point
    #[serde(default = "default_slice_frames")]
    pub slice_frames: usize,
}

fn default_pattern() -> String {
    "images/frame_%d.png".to_string()
}

fn default_last_frame() -> u32 {
    18
}

fn default_slice_frames() -> usize {
    5
}

impl FrameConfig {
    /// Number of frames the pattern expands to.
    pub fn count(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            (self.last - self.first) as usize + 1
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            first: 0,
            last: default_last_frame(),
            gif: None,
            slice_frames: default_slice_frames(),
        }
    }
}

/// Channel-ratio thresholds of the color legend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Green dominance over red and blue for the green hail band
    #[serde(default = "default_hail_green_ratio")]
    pub hail_green_ratio: f64,

    /// Red and blue dominance over green for the violet hail band
    #[serde(default = "default_hail_violet_ratio")]
    pub hail_violet_ratio: f64,

    /// Minimum red/blue balance inside the violet band
    #[serde(default = "default_hail_violet_balance")]
    pub hail_violet_balance: f64,

    /// Red over green for storm reds
    #[serde(default = "default_storm_red_green")]
    pub storm_red_green: f64,

    /// Red over blue for storm reds
    #[serde(default = "default_storm_red_blue")]
    pub storm_red_blue: f64,

    /// Blue over red and green for rain
    #[serde(default = "default_rain_blue_ratio")]
    pub rain_blue_ratio: f64,

    /// Blue channel must stay below this for rain
    #[serde(default = "default_rain_max_blue")]
    pub rain_max_blue: f64,

    /// Blue over red and green for cloud tint
    #[serde(default = "default_cloud_blue_ratio")]
    pub cloud_blue_ratio: f64,

    /// Each channel must exceed this fraction of the mean for gray background
    #[serde(default = "default_none_gray_ratio")]
    pub none_gray_ratio: f64,

    /// All channels below this value mark a missing-data region
    #[serde(default = "default_nodata_max_channel")]
    pub nodata_max_channel: f64,
}

fn default_hail_green_ratio() -> f64 {
    2.0
}

fn default_hail_violet_ratio() -> f64 {
    3.0
}

fn default_hail_violet_balance() -> f64 {
    0.5
}

fn default_storm_red_green() -> f64 {
    1.3
}

fn default_storm_red_blue() -> f64 {
    2.0
}

fn default_rain_blue_ratio() -> f64 {
    3.0
}

fn default_rain_max_blue() -> f64 {
    250.0
}

fn default_cloud_blue_ratio() -> f64 {
    1.2
}

fn default_none_gray_ratio() -> f64 {
    0.8
}

fn default_nodata_max_channel() -> f64 {
    16.0
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hail_green_ratio: default_hail_green_ratio(),
            hail_violet_ratio: default_hail_violet_ratio(),
            hail_violet_balance: default_hail_violet_balance(),
            storm_red_green: default_storm_red_green(),
            storm_red_blue: default_storm_red_blue(),
            rain_blue_ratio: default_rain_blue_ratio(),
            rain_max_blue: default_rain_max_blue(),
            cloud_blue_ratio: default_cloud_blue_ratio(),
            none_gray_ratio: default_none_gray_ratio(),
            nodata_max_channel: default_nodata_max_channel(),
        }
    }
}

/// Static overlay detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Never flag pixels whose first-frame color is plain background
    #[serde(default)]
    pub exempt_clear_sky: bool,
}

/// Spatial and temporal repair of overlay and missing-data pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapFillConfig {
    /// Largest ring radius searched around a pixel
    #[serde(default = "default_max_radius")]
    pub max_radius: usize,

    /// Largest frame distance searched by the temporal pass (defaults to the sequence length)
    #[serde(default)]
    pub temporal_span: Option<usize>,
}

fn default_max_radius() -> usize {
    5
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            max_radius: default_max_radius(),
            temporal_span: None,
        }
    }
}

/// Geometry of the directional slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Number of samples per slice
    #[serde(default = "default_slice_length")]
    pub length: usize,

    /// Half-width of the angular fan in degrees
    #[serde(default = "default_half_angle_deg")]
    pub half_angle_deg: f64,

    /// Angular step of the fan in degrees
    #[serde(default = "default_angle_step_deg")]
    pub angle_step_deg: f64,

    /// Perpendicular shift at the fan edges in pixels
    #[serde(default = "default_max_shift_px")]
    pub max_shift_px: f64,
}

fn default_slice_length() -> usize {
    100
}

fn default_half_angle_deg() -> f64 {
    15.0
}

fn default_angle_step_deg() -> f64 {
    2.5
}

fn default_max_shift_px() -> f64 {
    3.0
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            length: default_slice_length(),
            half_angle_deg: default_half_angle_deg(),
            angle_step_deg: default_angle_step_deg(),
            max_shift_px: default_max_shift_px(),
        }
    }
}

/// Quality gates of pairwise slice matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Offset at which the earlier slice is cropped; also the largest testable shift
    #[serde(default = "default_min_shift")]
    pub min_shift: usize,

    /// Reject when the best SSD exceeds this fraction of the window length
    #[serde(default = "default_max_noise_ratio")]
    pub max_noise_ratio: f64,

    /// Ambiguity gate: reject when max SSD <= contrast_ratio * min + contrast_margin
    #[serde(default = "default_contrast_ratio")]
    pub contrast_ratio: f64,

    #[serde(default = "default_contrast_margin")]
    pub contrast_margin: f64,

    /// Reject when the best shift is below min_shift / min_shift_divisor
    #[serde(default = "default_min_shift_divisor")]
    pub min_shift_divisor: f64,
}

fn default_min_shift() -> usize {
    30
}

fn default_max_noise_ratio() -> f64 {
    0.75
}

fn default_contrast_ratio() -> f64 {
    1.9
}

fn default_contrast_margin() -> f64 {
    10.0
}

fn default_min_shift_divisor() -> f64 {
    3.0
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_shift: default_min_shift(),
            max_noise_ratio: default_max_noise_ratio(),
            contrast_ratio: default_contrast_ratio(),
            contrast_margin: default_contrast_margin(),
            min_shift_divisor: default_min_shift_divisor(),
        }
    }
}

/// Consensus velocity and arrival window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Minimum accepted pairwise estimates
    #[serde(default = "default_min_estimates")]
    pub min_estimates: usize,

    /// Blending half-width per pixel of extrapolated shift
    #[serde(default = "default_blend_spread")]
    pub blend_spread: f64,

    /// Lower bound of the blending half-width
    #[serde(default = "default_min_half_width")]
    pub min_half_width: f64,

    /// Accumulated weight a profile position needs to be trusted
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,

    /// Added to the blended level before it is floored to a category
    #[serde(default = "default_calibration_offset")]
    pub calibration_offset: f64,

    /// Largest gap (frames) merged into one window
    #[serde(default = "default_merge_gap")]
    pub merge_gap: f64,

    /// Real time per frame (minutes)
    #[serde(default = "default_period")]
    pub period: f64,
}

fn default_min_estimates() -> usize {
    2
}

fn default_blend_spread() -> f64 {
    0.25
}

fn default_min_half_width() -> f64 {
    1.0
}

fn default_min_weight() -> f64 {
    1.0
}

fn default_calibration_offset() -> f64 {
    0.4
}

fn default_merge_gap() -> f64 {
    2.0
}

fn default_period() -> f64 {
    10.0
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_estimates: default_min_estimates(),
            blend_spread: default_blend_spread(),
            min_half_width: default_min_half_width(),
            min_weight: default_min_weight(),
            calibration_offset: default_calibration_offset(),
            merge_gap: default_merge_gap(),
            period: default_period(),
        }
    }
}

/// A configured point of interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,
    pub row: usize,
    pub col: usize,

    /// Flow direction (dx, dy) used when no direction table entry exists
    #[serde(default)]
    pub direction: Option<[f64; 2]>,
}

impl PointConfig {
    pub fn to_point(&self) -> PointOfInterest {
        PointOfInterest::new(self.name.clone(), self.row, self.col)
    }
}

fn default_points() -> Vec<PointConfig> {
    vec![
        PointConfig {
            name: "nnov".to_string(),
            row: 448,
            col: 612,
            direction: None,
        },
        PointConfig {
            name: "test".to_string(),
            row: 317,
            col: 414,
            direction: None,
        },
    ]
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub frames: FrameConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub gap_fill: GapFillConfig,

    #[serde(default)]
    pub slice: SliceConfig,

    #[serde(default)]
    pub matching: MatchConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default = "default_points")]
    pub points: Vec<PointConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames: FrameConfig::default(),
            classifier: ClassifierConfig::default(),
            artifacts: ArtifactConfig::default(),
            gap_fill: GapFillConfig::default(),
            slice: SliceConfig::default(),
            matching: MatchConfig::default(),
            aggregation: AggregationConfig::default(),
            points: default_points(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured points as pipeline inputs.
    pub fn points_of_interest(&self) -> Vec<PointOfInterest> {
        self.points.iter().map(PointConfig::to_point).collect()
    }

    /// Check constraints between fields. `frame_count` is the number of frames that will be
    /// processed.
    pub fn validate(&self, frame_count: usize) -> Result<(), ConfigError> {
        if frame_count < 2 {
            return Err(ConfigError::TooFewFrames(frame_count));
        }
        self.validate_parameters()
    }

    /// The checks of [`validate`](Self::validate) that do not depend on the input sequence.
    pub fn validate_parameters(&self) -> Result<(), ConfigError> {
        if self.frames.slice_frames < 2 {
            return Err(ConfigError::TooFewSliceFrames(self.frames.slice_frames));
        }
        if self.matching.min_shift >= self.slice.length {
            return Err(ConfigError::ShiftExceedsSlice {
                min_shift: self.matching.min_shift,
                length: self.slice.length,
            });
        }
        if self.slice.angle_step_deg <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "slice.angle_step_deg",
                reason: "must be positive".to_string(),
            });
        }
        if self.slice.half_angle_deg < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "slice.half_angle_deg",
                reason: "must not be negative".to_string(),
            });
        }
        if self.matching.min_shift_divisor <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.min_shift_divisor",
                reason: "must be positive".to_string(),
            });
        }
        if self.matching.max_noise_ratio <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.max_noise_ratio",
                reason: "must be positive".to_string(),
            });
        }
        if self.aggregation.merge_gap <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "aggregation.merge_gap",
                reason: "must be positive".to_string(),
            });
        }
        if self.aggregation.period <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "aggregation.period",
                reason: "must be positive".to_string(),
            });
        }
        if self.aggregation.min_half_width <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "aggregation.min_half_width",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(idx) = self.points.iter().position(|p| p.name.trim().is_empty()) {
            return Err(ConfigError::UnnamedPoint(idx));
        }
        Ok(())
    }
}
