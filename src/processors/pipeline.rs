//! End-to-end nowcast for a set of points.
//!
//! The sequence-level stages (classification, overlay detection, gap filling) run once. Each
//! point then works on its own copy of the most recent repaired frames, because slice
//! extraction writes exploration marks into the frames it reads.

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::core::types::{
    ArtifactMask, ClassifiedFrame, PointOfInterest, RawFrame, Report, Slice, VelocityEstimate,
};
use crate::processors::aggregate::{aggregate, Aggregate};
use crate::processors::artifacts::detect_static_artifacts;
use crate::processors::classifier::classify_frames;
use crate::processors::gap_fill::fill_gaps;
use crate::processors::motion::MotionField;
use crate::processors::slice::extract_slices;
use crate::processors::velocity::estimate_all;

/// Shared, read-only result of the sequence-level stages.
#[derive(Debug, Clone)]
pub struct RepairedSequence {
    /// Per-frame labels before repair
    pub classified: Vec<ClassifiedFrame>,
    pub mask: ArtifactMask,
    /// Per-frame labels after repair; never contains `NoData`
    pub repaired: Vec<ClassifiedFrame>,
}

impl RepairedSequence {
    pub fn len(&self) -> usize {
        self.repaired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repaired.is_empty()
    }

    /// The last `count` repaired frames (fewer if the sequence is shorter).
    pub fn recent(&self, count: usize) -> &[ClassifiedFrame] {
        let start = self.repaired.len().saturating_sub(count);
        &self.repaired[start..]
    }
}

/// Everything computed for one point.
#[derive(Debug, Clone)]
pub struct PointAnalysis {
    pub point: PointOfInterest,
    pub direction: Option<[f64; 2]>,
    pub slices: Vec<Slice>,
    pub estimates: Vec<VelocityEstimate>,
    pub aggregate: Aggregate,
    /// Why the point could not be analyzed, if it could not
    pub failure: Option<String>,
}

impl PointAnalysis {
    fn failed(point: &PointOfInterest, reason: String) -> Self {
        Self {
            point: point.clone(),
            direction: None,
            slices: Vec::new(),
            estimates: Vec::new(),
            aggregate: Aggregate::undetermined(&point.name),
            failure: Some(reason),
        }
    }

    pub fn report(&self) -> &Report {
        &self.aggregate.report
    }
}

/// Nowcast pipeline bound to one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config
            .validate_parameters()
            .context("Invalid pipeline configuration")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify, detect overlays and repair the raw sequence.
    pub fn repair(&self, raw: &[RawFrame]) -> Result<RepairedSequence> {
        self.config
            .validate(raw.len())
            .context("Input sequence does not fit the configuration")?;

        let classified = classify_frames(raw, &self.config.classifier);
        let mask = detect_static_artifacts(raw, &self.config.artifacts, &self.config.classifier)
            .context("Failed to detect static artifacts")?;
        let repaired =
            fill_gaps(&classified, &mask, &self.config.gap_fill).context("Failed to fill gaps")?;

        let flagged = mask.as_slice().iter().filter(|&&f| f).count();
        info!(
            "Repaired {} frames ({} overlay pixels)",
            repaired.len(),
            flagged
        );

        Ok(RepairedSequence {
            classified,
            mask,
            repaired,
        })
    }

    /// Slice, match and aggregate for one point with a known flow direction.
    pub fn analyze_point(
        &self,
        sequence: &RepairedSequence,
        point: &PointOfInterest,
        direction: [f64; 2],
    ) -> Result<PointAnalysis> {
        let mut frames = sequence.recent(self.config.frames.slice_frames).to_vec();
        let slices = extract_slices(&mut frames, point, direction, &self.config.slice)
            .with_context(|| format!("Failed to extract slices for '{}'", point.name))?;
        let estimates = estimate_all(&slices, &self.config.matching);
        let aggregate = aggregate(&point.name, &slices, &estimates, &self.config.aggregation);

        Ok(PointAnalysis {
            point: point.clone(),
            direction: Some(direction),
            slices,
            estimates,
            aggregate,
            failure: None,
        })
    }

    /// Analyze every point in parallel; results keep the order of `points`.
    ///
    /// A point without a usable direction gets an undetermined report and a warning. A
    /// slice that leaves the frame means the point does not fit the frame geometry and
    /// fails the whole run.
    pub fn analyze_all(
        &self,
        sequence: &RepairedSequence,
        points: &[PointOfInterest],
        motion: &dyn MotionField,
    ) -> Result<Vec<PointAnalysis>> {
        points
            .par_iter()
            .map(|point| match motion.direction_at(point) {
                Some(direction) => self.analyze_point(sequence, point, direction),
                None => {
                    let reason = format!("No flow direction for '{}'", point.name);
                    warn!("{}", reason);
                    Ok(PointAnalysis::failed(point, reason))
                }
            })
            .collect()
    }

    /// Repair and analyze in one call.
    pub fn run(
        &self,
        raw: &[RawFrame],
        points: &[PointOfInterest],
        motion: &dyn MotionField,
    ) -> Result<(RepairedSequence, Vec<PointAnalysis>)> {
        let sequence = self.repair(raw)?;
        let analyses = self.analyze_all(&sequence, points, motion)?;
        Ok((sequence, analyses))
    }
}
