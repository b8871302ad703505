//! Frame destinations: interactive display or re-encoding

use crate::error::PipelineError;
use crate::source::StreamInfo;
use opencv::{
    core::{Mat, Size},
    highgui,
    prelude::*,
    videoio::VideoWriter,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KEY_ESCAPE: i32 = 27;
const KEY_QUIT: i32 = 113; // 'q'

/// What the sink wants the driver to do after a frame lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Continue,
    /// Stop requested: ceiling reached or the operator asked to quit. The
    /// frame that triggered this was still delivered.
    Stop,
}

/// Terminal stage of the pipeline. Accepting a frame consumes it; the driver
/// never touches a frame after handing it over.
pub trait FrameSink {
    fn accept(&mut self, frame: Mat) -> Result<SinkStatus, PipelineError>;

    /// Flush and release. Safe to call once on any exit path, including
    /// abort.
    fn close(&mut self) -> Result<(), PipelineError>;
}

fn ceiling_reached(accepted: u64, ceiling: Option<u64>) -> bool {
    ceiling.is_some_and(|n| accepted >= n)
}

/// Shows annotated frames in a window, polling for an interrupt key between
/// frames.
pub struct DisplaySink {
    window: String,
    wait_ms: i32,
    ceiling: Option<u64>,
    accepted: u64,
    closed: bool,
}

impl DisplaySink {
    pub fn open(window: &str, wait_ms: i32, ceiling: Option<u64>) -> Result<Self, PipelineError> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| PipelineError::Sink(format!("failed to create window: {e}")))?;
        Ok(Self {
            window: window.to_string(),
            wait_ms,
            ceiling,
            accepted: 0,
            closed: false,
        })
    }
}

impl FrameSink for DisplaySink {
    fn accept(&mut self, frame: Mat) -> Result<SinkStatus, PipelineError> {
        highgui::imshow(&self.window, &frame)
            .map_err(|e| PipelineError::Sink(format!("failed to show frame: {e}")))?;
        self.accepted += 1;

        // The wait doubles as frame pacing.
        let key = highgui::wait_key(self.wait_ms)
            .map_err(|e| PipelineError::Sink(format!("key poll failed: {e}")))?;
        if key == KEY_ESCAPE || key == KEY_QUIT {
            info!("interrupt key pressed, stopping");
            return Ok(SinkStatus::Stop);
        }

        if ceiling_reached(self.accepted, self.ceiling) {
            info!("frame ceiling of {} reached", self.accepted);
            return Ok(SinkStatus::Stop);
        }
        Ok(SinkStatus::Continue)
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        if !self.closed {
            highgui::destroy_window(&self.window)
                .map_err(|e| PipelineError::Sink(format!("failed to destroy window: {e}")))?;
            self.closed = true;
            debug!("display window destroyed");
        }
        Ok(())
    }
}

/// Writes annotated frames into a new container matching the source's
/// geometry and rate.
pub struct EncodeSink {
    writer: VideoWriter,
    path: PathBuf,
    frame_size: Size,
    ceiling: Option<u64>,
    accepted: u64,
    closed: bool,
}

impl EncodeSink {
    pub fn open(
        path: &Path,
        fourcc: &str,
        info: &StreamInfo,
        ceiling: Option<u64>,
    ) -> Result<Self, PipelineError> {
        let chars: Vec<char> = fourcc.chars().collect();
        if chars.len() != 4 {
            return Err(PipelineError::Sink(format!(
                "fourcc must be exactly 4 characters: {fourcc}"
            )));
        }
        let fourcc_code = VideoWriter::fourcc(chars[0], chars[1], chars[2], chars[3])
            .map_err(|e| PipelineError::Sink(format!("bad fourcc {fourcc}: {e}")))?;

        let path_str = path.to_str().ok_or_else(|| {
            PipelineError::Sink(format!("output path is not valid UTF-8: {}", path.display()))
        })?;

        let frame_size = Size::new(info.width, info.height);
        let writer = VideoWriter::new(path_str, fourcc_code, info.fps, frame_size, true)
            .map_err(|e| PipelineError::Sink(format!("failed to open writer: {e}")))?;
        if !writer
            .is_opened()
            .map_err(|e| PipelineError::Sink(format!("{e}")))?
        {
            return Err(PipelineError::Sink(format!(
                "encoder rejected {} ({} {}x{} @ {:.1} fps)",
                path.display(),
                fourcc,
                info.width,
                info.height,
                info.fps
            )));
        }

        info!(
            "encoding to {} ({} {}x{} @ {:.1} fps)",
            path.display(),
            fourcc,
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            frame_size,
            ceiling,
            accepted: 0,
            closed: false,
        })
    }
}

impl FrameSink for EncodeSink {
    fn accept(&mut self, frame: Mat) -> Result<SinkStatus, PipelineError> {
        let size = frame
            .size()
            .map_err(|e| PipelineError::Sink(format!("{e}")))?;
        if size != self.frame_size {
            return Err(PipelineError::Sink(format!(
                "frame size {}x{} does not match writer {}x{}",
                size.width, size.height, self.frame_size.width, self.frame_size.height
            )));
        }

        self.writer
            .write(&frame)
            .map_err(|e| PipelineError::Sink(format!("failed to write frame: {e}")))?;
        self.accepted += 1;

        if ceiling_reached(self.accepted, self.ceiling) {
            info!("frame ceiling of {} reached", self.accepted);
            return Ok(SinkStatus::Stop);
        }
        Ok(SinkStatus::Continue)
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        if !self.closed {
            self.writer
                .release()
                .map_err(|e| PipelineError::Sink(format!("failed to finalize writer: {e}")))?;
            self.closed = true;
            info!("wrote {} frame(s) to {}", self.accepted, self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_unset_never_reached() {
        assert!(!ceiling_reached(0, None));
        assert!(!ceiling_reached(u64::MAX, None));
    }

    #[test]
    fn test_ceiling_reached_at_exact_count() {
        assert!(!ceiling_reached(9, Some(10)));
        assert!(ceiling_reached(10, Some(10)));
        assert!(ceiling_reached(11, Some(10)));
    }
}
