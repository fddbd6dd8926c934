//! Color legend classifier.
//!
//! Maps a composite pixel color to a `PrecipitationType` through an ordered decision table.
//! Predicates overlap, so the first matching rule wins.

use rayon::prelude::*;

use crate::config::ClassifierConfig;
use crate::core::types::{ClassifiedFrame, PrecipitationType, RawFrame, Rgba};

type Predicate = fn(&Channels, &ClassifierConfig) -> bool;

/// Color channels as floating point values. Alpha is dropped.
#[derive(Debug, Clone, Copy)]
struct Channels {
    r: f64,
    g: f64,
    b: f64,
}

impl From<Rgba> for Channels {
    fn from(color: Rgba) -> Self {
        Self {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
        }
    }
}

/// Decision table in priority order.
const RULES: [(PrecipitationType, Predicate); 6] = [
    (PrecipitationType::Hail, is_hail),
    (PrecipitationType::Storm, is_storm),
    (PrecipitationType::Rain, is_rain),
    (PrecipitationType::Cloud, is_cloud),
    (PrecipitationType::None, is_clear),
    (PrecipitationType::NoData, is_missing),
];

fn is_hail(c: &Channels, cfg: &ClassifierConfig) -> bool {
    let greens = c.g > cfg.hail_green_ratio * c.r && c.g > cfg.hail_green_ratio * c.b;
    let violets = c.r > cfg.hail_violet_ratio * c.g
        && c.b > cfg.hail_violet_ratio * c.g
        && c.r > cfg.hail_violet_balance * c.b
        && c.b > cfg.hail_violet_balance * c.r;
    greens || violets
}

fn is_storm(c: &Channels, cfg: &ClassifierConfig) -> bool {
    c.r > cfg.storm_red_green * c.g && c.r > cfg.storm_red_blue * c.b
}

fn is_rain(c: &Channels, cfg: &ClassifierConfig) -> bool {
    c.b > cfg.rain_blue_ratio * c.r && c.b > cfg.rain_blue_ratio * c.g && c.b < cfg.rain_max_blue
}

fn is_cloud(c: &Channels, cfg: &ClassifierConfig) -> bool {
    c.b > cfg.cloud_blue_ratio * c.r && c.b > cfg.cloud_blue_ratio * c.g
}

fn is_clear(c: &Channels, cfg: &ClassifierConfig) -> bool {
    let mean = (c.r + c.g + c.b) / 3.0;
    let floor = cfg.none_gray_ratio * mean;
    c.r > floor && c.g > floor && c.b > floor
}

fn is_missing(c: &Channels, cfg: &ClassifierConfig) -> bool {
    c.r.max(c.g).max(c.b) < cfg.nodata_max_channel
}

/// Classify one color. Total: colors no rule accepts map to `Unknown`.
pub fn classify_color(color: Rgba, config: &ClassifierConfig) -> PrecipitationType {
    let channels = Channels::from(color);
    RULES
        .iter()
        .find(|(_, predicate)| predicate(&channels, config))
        .map(|(label, _)| *label)
        .unwrap_or(PrecipitationType::Unknown)
}

/// Every rule that accepts `color`, in priority order.
pub fn matching_rules(color: Rgba, config: &ClassifierConfig) -> Vec<PrecipitationType> {
    let channels = Channels::from(color);
    RULES
        .iter()
        .filter(|(_, predicate)| predicate(&channels, config))
        .map(|(label, _)| *label)
        .collect()
}

/// Classify every pixel of a frame.
pub fn classify_frame(frame: &RawFrame, config: &ClassifierConfig) -> ClassifiedFrame {
    frame.map(|&color| classify_color(color, config))
}

/// Classify a whole sequence, one frame per rayon task.
pub fn classify_frames(frames: &[RawFrame], config: &ClassifierConfig) -> Vec<ClassifiedFrame> {
    frames
        .par_iter()
        .map(|frame| classify_frame(frame, config))
        .collect()
}
