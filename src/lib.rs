//! Short-range precipitation nowcasting from radar composite images.
//!
//! This crate provides tools for:
//! - Classifying composite pixels into precipitation categories by color
//! - Detecting static overlays (labels, borders) and repairing the gaps they leave
//! - Sampling directional slices upstream of points of interest
//! - Estimating propagation speed from slice pairs
//! - Forecasting when severe precipitation reaches each point
//!
//! # Example
//!
//! ```no_run
//! use radar_nowcast::core::loaders::load_frames;
//! use radar_nowcast::processors::{Pipeline, TableMotionField};
//! use radar_nowcast::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! let raw = load_frames(&config.frames).unwrap();
//! let motion = TableMotionField::from_points(&config.points);
//! let points = config.points_of_interest();
//!
//! let pipeline = Pipeline::new(config).unwrap();
//! let (_, analyses) = pipeline.run(&raw, &points, &motion).unwrap();
//! for analysis in &analyses {
//!     println!("{:?}", analysis.report());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    AggregationConfig, ClassifierConfig, GapFillConfig, MatchConfig, PipelineConfig,
    SliceConfig,
};
pub use core::types::{PointOfInterest, PrecipitationType, Report};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
