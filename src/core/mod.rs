//! Core data types and I/O operations.

pub mod loaders;
pub mod types;
pub mod writers;

pub use loaders::{load_directions_csv, load_frames, LoaderError};
pub use types::{
    ArtifactMask, ClassifiedFrame, Grid, PointOfInterest, PrecipitationType, RawFrame, Report,
    Rgba, Slice, VelocityEstimate,
};
pub use writers::{write_colorized_png, write_mask_png, write_reports, WriteError};
