//! Binary for pre-fetching the detection model

use roadeye::models::ModelManager;
use roadeye::{PipelineConfig, PipelineError};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let model_dir = match args.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => PipelineConfig::default().model_dir,
    };

    println!("Fetching detection model into {}...", model_dir.display());
    let manager = ModelManager::new(model_dir);
    let path = manager.detector_model().await?;
    println!("Detection model ready at {}", path.display());

    Ok(())
}
