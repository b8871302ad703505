//! Haar cascade vehicle detector

use super::{Detection, DetectionSet, Detector};
use crate::error::PipelineError;
use opencv::{
    core::{Mat, Rect, Size, Vector},
    imgproc, objdetect,
    prelude::*,
};
use std::path::Path;
use tracing::debug;

/// Label attached to every cascade detection; the classifier itself carries
/// no class information.
pub const CASCADE_LABEL: &str = "vehicle";

/// Classical sliding-window classifier over a grayscale view of the frame.
pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
}

impl CascadeDetector {
    /// Load a cascade definition. A missing or unloadable XML file is a
    /// startup error; detection never runs without a classifier.
    pub fn new(
        cascade_path: &Path,
        scale_factor: f64,
        min_neighbors: i32,
    ) -> Result<Self, PipelineError> {
        if !cascade_path.is_file() {
            return Err(PipelineError::Cascade(format!(
                "cascade definition missing: {}",
                cascade_path.display()
            )));
        }

        let path_str = cascade_path.to_str().ok_or_else(|| {
            PipelineError::Cascade(format!(
                "cascade path is not valid UTF-8: {}",
                cascade_path.display()
            ))
        })?;

        let classifier = objdetect::CascadeClassifier::new(path_str).map_err(|e| {
            PipelineError::Cascade(format!(
                "failed to load {}: {}",
                cascade_path.display(),
                e
            ))
        })?;

        // The constructor swallows load failures, so a corrupt definition
        // surfaces only as an empty classifier.
        if classifier.empty()? {
            return Err(PipelineError::Cascade(format!(
                "cascade definition is empty or corrupt: {}",
                cascade_path.display()
            )));
        }

        Ok(Self {
            classifier,
            scale_factor,
            min_neighbors,
        })
    }
}

impl Detector for CascadeDetector {
    fn name(&self) -> &str {
        "cascade"
    }

    fn detect(&mut self, frame: &Mat) -> Result<DetectionSet, PipelineError> {
        // Color carries no signal for the cascade.
        let mut gray = Mat::default();
        imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut rects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut rects,
            self.scale_factor,
            self.min_neighbors,
            0,
            Size::default(),
            Size::default(),
        )?;

        debug!("cascade matched {} region(s)", rects.len());
        for rect in rects.iter() {
            debug!(
                "cascade match at (x: {}, y: {}, w: {}, h: {})",
                rect.x, rect.y, rect.width, rect.height
            );
        }

        Ok(rects
            .iter()
            .map(|rect| Detection {
                rect,
                label: Some(CASCADE_LABEL.to_string()),
                confidence: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_cascade_is_fatal_at_construction() {
        let path = PathBuf::from("/nonexistent/haarcascade_car.xml");
        match CascadeDetector::new(&path, 1.1, 1) {
            Err(PipelineError::Cascade(msg)) => assert!(msg.contains("missing")),
            other => panic!("Expected Cascade error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_corrupt_cascade_is_fatal_at_construction() {
        // A file that exists but holds no stages must never produce a
        // detector; the failure has to surface before the frame loop starts.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_cascade.xml");
        std::fs::write(&path, b"<not-a-cascade/>").unwrap();

        match CascadeDetector::new(&path, 1.1, 1) {
            Err(PipelineError::Cascade(_)) => {}
            other => panic!("Expected Cascade error, got {:?}", other.err()),
        }
    }
}
