//! Configuration for the detection pipeline

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Destination selected once at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SinkConfig {
    /// Interactive window. `wait_ms` bounds the per-frame interrupt poll and
    /// doubles as the frame-pacing delay.
    Display { wait_ms: i32 },
    /// Re-encode annotated frames into a container at `path`.
    Encode { path: PathBuf, fourcc: String },
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input video path or URI
    pub input: PathBuf,
    /// Haar cascade definition file
    pub cascade_path: PathBuf,
    /// Cascade search-window scaling step (> 1.0)
    pub scale_factor: f64,
    /// Cascade merge-vs-discard threshold (>= 0); low values favor recall
    pub min_neighbors: i32,
    /// Minimum score for learned detections; none enforced when unset
    pub score_threshold: Option<f32>,
    /// Stop after this many frames regardless of stream length
    pub max_frames: Option<u64>,
    /// Where annotated frames go
    pub sink: SinkConfig,
    /// Directory holding the detection model
    pub model_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let model_dir = dirs::home_dir()
            .map(|mut p| {
                p.push(".roadeye");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            input: PathBuf::from("video.mp4"),
            cascade_path: PathBuf::from("haarcascade_car.xml"),
            scale_factor: 1.1,
            min_neighbors: 1,
            score_threshold: None,
            max_frames: None,
            sink: SinkConfig::Display { wait_ms: 33 },
            model_dir,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.scale_factor <= 1.0 {
            return Err(PipelineError::Config(
                "scale factor must be greater than 1.0".to_string(),
            ));
        }

        if self.min_neighbors < 0 {
            return Err(PipelineError::Config(
                "min neighbors must not be negative".to_string(),
            ));
        }

        if let Some(score) = self.score_threshold {
            if !(0.0..=1.0).contains(&score) {
                return Err(PipelineError::Config(
                    "score threshold must be within [0, 1]".to_string(),
                ));
            }
        }

        if self.max_frames == Some(0) {
            return Err(PipelineError::Config(
                "frame ceiling must be at least 1".to_string(),
            ));
        }

        match &self.sink {
            SinkConfig::Display { wait_ms } => {
                if *wait_ms <= 0 {
                    return Err(PipelineError::Config(
                        "display wait interval must be positive".to_string(),
                    ));
                }
            }
            SinkConfig::Encode { fourcc, .. } => {
                if fourcc.chars().count() != 4 {
                    return Err(PipelineError::Config(format!(
                        "fourcc must be exactly 4 characters: {fourcc}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.scale_factor, 1.1);
        assert_eq!(config.min_neighbors, 1);
        assert!(config.score_threshold.is_none());
        assert!(config.max_frames.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_scale_factor() {
        let mut config = PipelineConfig::default();
        config.scale_factor = 1.0;
        assert!(config.validate().is_err());

        config.scale_factor = 0.9;
        assert!(config.validate().is_err());

        config.scale_factor = 1.05;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_min_neighbors() {
        let mut config = PipelineConfig::default();
        config.min_neighbors = -1;
        assert!(config.validate().is_err());

        config.min_neighbors = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_score_threshold() {
        let mut config = PipelineConfig::default();
        config.score_threshold = Some(1.5);
        assert!(config.validate().is_err());

        config.score_threshold = Some(-0.1);
        assert!(config.validate().is_err());

        config.score_threshold = Some(0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_ceiling() {
        let mut config = PipelineConfig::default();
        config.max_frames = Some(0);
        assert!(config.validate().is_err());

        config.max_frames = Some(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_sink() {
        let mut config = PipelineConfig::default();
        config.sink = SinkConfig::Display { wait_ms: 0 };
        assert!(config.validate().is_err());

        config.sink = SinkConfig::Encode {
            path: PathBuf::from("out.webm"),
            fourcc: "vp8".to_string(),
        };
        assert!(config.validate().is_err());

        config.sink = SinkConfig::Encode {
            path: PathBuf::from("out.webm"),
            fourcc: "vp80".to_string(),
        };
        assert!(config.validate().is_ok());
    }
}
