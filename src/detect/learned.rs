//! Learned detector backed by the ONNX model

use super::{Detection, DetectionSet, Detector};
use crate::error::PipelineError;
use crate::models::YoloModel;
use opencv::core::{Mat, Rect};
use tracing::debug;

/// Neural detector wrapping the model session. Holds no per-frame state;
/// every call sees only the frame it is given.
pub struct LearnedDetector {
    model: YoloModel,
}

impl LearnedDetector {
    pub fn new(model: YoloModel) -> Self {
        Self { model }
    }
}

impl Detector for LearnedDetector {
    fn name(&self) -> &str {
        "learned"
    }

    fn detect(&mut self, frame: &Mat) -> Result<DetectionSet, PipelineError> {
        let detections = self.model.detect(frame)?;

        for d in &detections {
            debug!(
                "learned match: {} ({:.2}) at (x: {:.0}, y: {:.0}, w: {:.0}, h: {:.0})",
                d.class_name, d.confidence, d.bbox.0, d.bbox.1, d.bbox.2, d.bbox.3
            );
        }

        Ok(detections
            .into_iter()
            .map(|d| Detection {
                rect: Rect::new(
                    d.bbox.0 as i32,
                    d.bbox.1 as i32,
                    d.bbox.2 as i32,
                    d.bbox.3 as i32,
                ),
                label: Some(d.class_name),
                confidence: Some(d.confidence),
            })
            .collect())
    }
}
