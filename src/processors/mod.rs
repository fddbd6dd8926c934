//! Nowcast processing stages.

pub mod aggregate;
pub mod artifacts;
pub mod classifier;
pub mod gap_fill;
pub mod motion;
pub mod pipeline;
pub mod slice;
pub mod velocity;

// Re-export key types for convenience
pub use aggregate::{aggregate, Aggregate};
pub use artifacts::{detect_static_artifacts, ArtifactError};
pub use classifier::{classify_color, classify_frame, classify_frames};
pub use gap_fill::{fill_gaps, ring_offsets, GapFillError};
pub use motion::{MotionField, TableMotionField, UniformMotionField};
pub use pipeline::{Pipeline, PointAnalysis, RepairedSequence};
pub use slice::{extract_slice, extract_slices, SliceError};
pub use velocity::{estimate_all, estimate_shift, Rejection};
