//! roadeye: dual-detector vehicle detection over video streams
//!
//! Pulls decoded frames from a video, runs two independent detection passes
//! per frame (a Haar cascade and an ONNX object-detection model), draws both
//! result sets onto the frame, and hands it to a sink that either displays
//! it live or appends it to an encoded output file. Frame and object totals
//! are accounted per run and reported at the end.

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use config::{PipelineConfig, SinkConfig};
pub use error::PipelineError;
pub use pipeline::{PipelineDriver, RunSummary};
