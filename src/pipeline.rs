//! The frame loop and its lifecycle

use crate::annotate::Annotator;
use crate::detect::Detector;
use crate::error::PipelineError;
use crate::sink::{FrameSink, SinkStatus};
use crate::source::FrameSource;
use opencv::core::Mat;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one run. Stages only ever advance; a driver is not reusable
/// after `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Running,
    /// Normal shutdown: end of stream, ceiling, or interrupt.
    Draining,
    /// A stage failed mid-run; resources still get released.
    Aborted,
    Closed,
}

/// Running totals accumulated across the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_processed: u64,
    pub objects_detected: u64,
}

/// Final report of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub objects_detected: u64,
    pub elapsed: Duration,
    /// False when the run aborted partway; counts then cover only the frames
    /// fully processed before the failure.
    pub complete: bool,
}

/// Drives frames from a source through every detector and annotator into the
/// sink, in stream order, one frame at a time.
pub struct PipelineDriver<S: FrameSource> {
    source: S,
    detectors: Vec<(Box<dyn Detector>, Annotator)>,
    sink: Box<dyn FrameSink>,
    stage: PipelineStage,
    stats: RunStats,
}

impl<S: FrameSource> PipelineDriver<S> {
    pub fn new(
        source: S,
        detectors: Vec<(Box<dyn Detector>, Annotator)>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            source,
            detectors,
            sink,
            stage: PipelineStage::Idle,
            stats: RunStats::default(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Run to completion. Any stage error aborts the run; resources are
    /// released on every exit path.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        self.stage = PipelineStage::Running;
        let started = Instant::now();

        match self.run_loop() {
            Ok(()) => {
                self.stage = PipelineStage::Draining;
                self.release();
                self.stage = PipelineStage::Closed;

                let summary = RunSummary {
                    frames_processed: self.stats.frames_processed,
                    objects_detected: self.stats.objects_detected,
                    elapsed: started.elapsed(),
                    complete: true,
                };
                info!(
                    "run finished: {} frame(s), {} object(s), {:.2?} elapsed",
                    summary.frames_processed, summary.objects_detected, summary.elapsed
                );
                Ok(summary)
            }
            Err(e) => {
                self.stage = PipelineStage::Aborted;
                self.release();
                self.stage = PipelineStage::Closed;

                warn!(
                    "run aborted after {} frame(s), {} object(s) (partial, incomplete run): {}",
                    self.stats.frames_processed, self.stats.objects_detected, e
                );
                Err(e)
            }
        }
    }

    fn run_loop(&mut self) -> Result<(), PipelineError> {
        loop {
            let Some(frame) = self.source.next_frame()? else {
                debug!("source drained");
                return Ok(());
            };
            if self.process_frame(frame)? == SinkStatus::Stop {
                return Ok(());
            }
        }
    }

    /// One frame through every detector, then every annotator, then the
    /// sink. Detection runs on the clean frame before any drawing so no
    /// detector sees another's boxes.
    fn process_frame(&mut self, mut frame: Mat) -> Result<SinkStatus, PipelineError> {
        let mut detection_sets = Vec::with_capacity(self.detectors.len());
        for (detector, _) in &mut self.detectors {
            let detections = detector.detect(&frame)?;
            debug!(
                "frame {}: {} found {} object(s)",
                self.stats.frames_processed + 1,
                detector.name(),
                detections.len()
            );
            detection_sets.push(detections);
        }

        for ((_, annotator), detections) in self.detectors.iter().zip(&detection_sets) {
            annotator.draw(&mut frame, detections)?;
        }

        let objects: u64 = detection_sets.iter().map(|set| set.len() as u64).sum();
        let status = self.sink.accept(frame)?;
        self.stats.frames_processed += 1;
        self.stats.objects_detected += objects;

        Ok(status)
    }

    /// Best-effort release of both endpoints. Failures here are logged, not
    /// returned, so they never mask the error that caused an abort.
    fn release(&mut self) {
        if let Err(e) = self.source.close() {
            warn!("failed to close source: {}", e);
        }
        if let Err(e) = self.sink.close() {
            warn!("failed to close sink: {}", e);
        }
    }
}
