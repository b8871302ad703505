//! Detection primitives and the detector seam

pub mod cascade;
pub mod learned;

pub use cascade::CascadeDetector;
pub use learned::LearnedDetector;

use crate::error::PipelineError;
use opencv::core::{Mat, Rect};

/// One detected object on one frame. Produced fresh per detector per frame;
/// never persisted across frames.
#[derive(Debug, Clone)]
pub struct Detection {
    pub rect: Rect,
    pub label: Option<String>,
    pub confidence: Option<f32>,
}

/// Detections produced by one detector on one frame. Order is
/// detector-defined and carries no meaning beyond iteration.
pub type DetectionSet = Vec<Detection>;

/// The single capability both detector variants expose. The driver never
/// branches on the concrete kind, so further detectors slot in without
/// touching the loop.
pub trait Detector {
    fn name(&self) -> &str;

    fn detect(&mut self, frame: &Mat) -> Result<DetectionSet, PipelineError>;
}
