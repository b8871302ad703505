//! Vehicle detection pipeline CLI

use anyhow::Context;
use clap::Parser;
use roadeye::{
    annotate::Annotator,
    detect::{CascadeDetector, Detector, LearnedDetector},
    models::{ModelManager, YoloModel},
    sink::{DisplaySink, EncodeSink, FrameSink},
    source::{FrameSource, VideoFileSource},
    PipelineConfig, PipelineDriver, SinkConfig,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roadeye", about = "Detect and annotate vehicles in video", version)]
struct Args {
    /// Input video file
    input: PathBuf,

    /// Write annotated video here instead of displaying a window
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fourcc for the output container
    #[arg(long, default_value = "mp4v")]
    fourcc: String,

    /// Haar cascade definition file
    #[arg(long, default_value = "haarcascade_car.xml")]
    cascade: PathBuf,

    /// Cascade search-window scaling step
    #[arg(long, default_value_t = 1.1)]
    scale_factor: f64,

    /// Cascade neighbor threshold; lower favors recall
    #[arg(long, default_value_t = 1)]
    min_neighbors: i32,

    /// Minimum score for learned detections; unset keeps everything
    #[arg(long)]
    confidence: Option<f32>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Per-frame display delay and interrupt poll, in milliseconds
    #[arg(long, default_value_t = 33)]
    wait_ms: i32,

    /// Model cache directory (defaults to ~/.roadeye/models)
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let defaults = PipelineConfig::default();
    let config = PipelineConfig {
        input: args.input,
        cascade_path: args.cascade,
        scale_factor: args.scale_factor,
        min_neighbors: args.min_neighbors,
        score_threshold: args.confidence,
        max_frames: args.max_frames,
        sink: match args.output {
            Some(path) => SinkConfig::Encode {
                path,
                fourcc: args.fourcc,
            },
            None => SinkConfig::Display {
                wait_ms: args.wait_ms,
            },
        },
        model_dir: args.model_dir.unwrap_or(defaults.model_dir),
    };
    config.validate().context("invalid configuration")?;

    let manager = ModelManager::new(&config.model_dir);
    let model_path = manager
        .detector_model()
        .await
        .context("failed to resolve detection model")?;

    let cascade = CascadeDetector::new(&config.cascade_path, config.scale_factor, config.min_neighbors)
        .context("failed to load cascade")?;
    let model = YoloModel::new(&model_path, config.score_threshold)
        .context("failed to load detection model")?;
    let learned = LearnedDetector::new(model);

    let source = VideoFileSource::open(&config.input).context("failed to open input")?;
    let stream = source.info();
    info!(
        "processing {} ({}x{} @ {:.1} fps)",
        config.input.display(),
        stream.width,
        stream.height,
        stream.fps
    );

    let sink: Box<dyn FrameSink> = match &config.sink {
        SinkConfig::Display { wait_ms } => {
            Box::new(DisplaySink::open("roadeye", *wait_ms, config.max_frames)?)
        }
        SinkConfig::Encode { path, fourcc } => {
            Box::new(EncodeSink::open(path, fourcc, &stream, config.max_frames)?)
        }
    };

    let detectors: Vec<(Box<dyn Detector>, Annotator)> = vec![
        (Box::new(cascade), Annotator::cascade_style()),
        (Box::new(learned), Annotator::learned_style()),
    ];

    let mut driver = PipelineDriver::new(source, detectors, sink);
    let summary = driver.run().context("pipeline run failed")?;

    println!("Frames processed: {}", summary.frames_processed);
    println!("Objects detected: {}", summary.objects_detected);
    println!("Elapsed: {:.2?}", summary.elapsed);

    Ok(())
}
