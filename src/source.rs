//! Frame acquisition from stored or live video

use crate::error::PipelineError;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, CAP_ANY},
};
use std::path::Path;
use tracing::{debug, info};

/// Stream metadata the encode sink needs to mirror the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    /// Reported frame count; containers without an index report none.
    pub frame_count: Option<u64>,
}

/// Sequential access to decoded frames, preserving native order.
pub trait FrameSource {
    /// Pull the next frame; `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Mat>, PipelineError>;

    fn info(&self) -> StreamInfo;

    /// Release underlying resources. Safe to call once on any exit path.
    fn close(&mut self) -> Result<(), PipelineError>;
}

/// Video file (or URI) source backed by OpenCV's VideoCapture.
pub struct VideoFileSource {
    capture: VideoCapture,
    info: StreamInfo,
    closed: bool,
}

impl VideoFileSource {
    /// Open a video for sequential reading. Missing paths, unopenable
    /// streams, and streams with nonsensical metadata fail with
    /// distinguishable errors.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            PipelineError::SourceNotReadable(format!(
                "path is not valid UTF-8: {}",
                path.display()
            ))
        })?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY).map_err(|e| {
            PipelineError::SourceNotReadable(format!("{}: {}", path.display(), e))
        })?;

        if !capture.is_opened().map_err(|e| {
            PipelineError::SourceNotReadable(format!("{}: {}", path.display(), e))
        })? {
            return Err(PipelineError::SourceNotReadable(
                path.display().to_string(),
            ));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        if fps <= 0.0 || width <= 0 || height <= 0 {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{}: reported {}x{} @ {:.1} fps",
                path.display(),
                width,
                height,
                fps
            )));
        }

        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        let frame_count = (frame_count > 0.0).then_some(frame_count as u64);

        info!(
            "opened {}: {}x{} @ {:.1} fps, {} frame(s)",
            path.display(),
            width,
            height,
            fps,
            frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
        );

        Ok(Self {
            capture,
            info: StreamInfo {
                fps,
                width,
                height,
                frame_count,
            },
            closed: false,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Mat>, PipelineError> {
        let mut frame = Mat::default();
        let got = self.capture.read(&mut frame)?;
        if !got || frame.empty() {
            debug!("end of stream");
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn info(&self) -> StreamInfo {
        self.info
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        if !self.closed {
            self.capture.release()?;
            self.closed = true;
            debug!("video source released");
        }
        Ok(())
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_missing_path_is_not_found() {
        let path = PathBuf::from("/nonexistent/no-such-video.mp4");
        match VideoFileSource::open(&path) {
            Err(PipelineError::SourceNotFound(msg)) => {
                assert!(msg.contains("no-such-video.mp4"));
            }
            other => panic!("Expected SourceNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_open_garbage_file_is_not_readable_or_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-video.mp4");
        std::fs::write(&path, b"definitely not a container").unwrap();
        // Depending on backend this surfaces at open or at metadata probing;
        // either way it must not look like a missing file.
        match VideoFileSource::open(&path) {
            Err(PipelineError::SourceNotReadable(_))
            | Err(PipelineError::UnsupportedFormat(_))
            | Err(PipelineError::OpenCv(_)) => {}
            Err(other) => panic!("unexpected error kind: {other}"),
            Ok(_) => panic!("garbage file opened as video"),
        }
    }
}
