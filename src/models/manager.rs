//! Model storage with auto-download

use crate::error::PipelineError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Note: this is a public release artifact. Swap in a verified mirror for
/// air-gapped deployments.
const DETECTOR_MODEL_URL: &str =
    "https://github.com/ultralytics/yolov5/releases/download/v7.0/yolov5s.onnx";
const DETECTOR_MODEL_FILE: &str = "yolov5s.onnx";
const DETECTOR_MODEL_CHECKSUM: &str = ""; // checksum pinning can be added later

const MAX_MODEL_SIZE: usize = 2_000_000_000; // 2GB
const MIN_MODEL_SIZE: usize = 1024;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Downloads and caches detection models under a local directory.
pub struct ModelManager {
    model_dir: PathBuf,
}

impl ModelManager {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Ensure the model directory exists.
    pub fn ensure_model_dir(&self) -> Result<&Path, PipelineError> {
        if !self.model_dir.exists() {
            fs::create_dir_all(&self.model_dir)?;
            info!("created model directory {}", self.model_dir.display());
        }
        Ok(&self.model_dir)
    }

    /// Resolve the detection model locally, downloading it on first use.
    pub async fn detector_model(&self) -> Result<PathBuf, PipelineError> {
        self.ensure_model(
            DETECTOR_MODEL_FILE,
            DETECTOR_MODEL_URL,
            DETECTOR_MODEL_CHECKSUM,
        )
        .await
    }

    /// Download a model if not already cached.
    pub async fn ensure_model(
        &self,
        model_name: &str,
        url: &str,
        checksum: &str,
    ) -> Result<PathBuf, PipelineError> {
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(PipelineError::Model("invalid model name".to_string()));
        }
        // File names only; no path traversal through the cache directory.
        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(PipelineError::Model(
                "model name contains invalid characters".to_string(),
            ));
        }

        if url.is_empty() || url.len() > 2048 {
            return Err(PipelineError::Model("invalid model URL".to_string()));
        }
        if !url.starts_with("https://") {
            return Err(PipelineError::Model(
                "only HTTPS URLs are allowed for model downloads".to_string(),
            ));
        }

        self.ensure_model_dir()?;

        let model_path = self.model_dir.join(model_name);
        if !model_path.starts_with(&self.model_dir) {
            return Err(PipelineError::Model("path traversal detected".to_string()));
        }

        if model_path.exists() {
            info!("model {} already cached at {}", model_name, model_path.display());
            return Ok(model_path);
        }

        info!("downloading model {} from {}", model_name, url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Model(format!(
                "model download failed: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_MODEL_SIZE as u64 {
                return Err(PipelineError::Model(format!(
                    "model too large: {} bytes (max {})",
                    content_length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_MODEL_SIZE {
            return Err(PipelineError::Model(format!(
                "downloaded model too large: {} bytes (max {})",
                bytes.len(),
                MAX_MODEL_SIZE
            )));
        }
        if bytes.len() < MIN_MODEL_SIZE {
            return Err(PipelineError::Model(
                "downloaded file too small, likely corrupted".to_string(),
            ));
        }

        if !checksum.is_empty() {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let computed = hex::encode(hasher.finalize());
            if computed != checksum {
                return Err(PipelineError::Model(format!(
                    "checksum mismatch for {model_name}: expected {checksum}, got {computed}"
                )));
            }
            info!("verified checksum for model {}", model_name);
        } else {
            info!(
                "downloaded {} bytes for model {} (checksum verification skipped)",
                bytes.len(),
                model_name
            );
        }

        // Temp file plus rename keeps a killed download from leaving a
        // half-written model behind.
        let temp_path = model_path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, &model_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PipelineError::Io(e)
        })?;

        info!("model {} saved to {}", model_name, model_path.display());
        Ok(model_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_model_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(temp_dir.path().join("models"));

        assert!(manager.ensure_model_dir().is_ok());
        assert!(manager.ensure_model_dir().is_ok());
        assert!(temp_dir.path().join("models").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(temp_dir.path());

        let url = "https://example.com/model.onnx";
        assert!(manager.ensure_model("", url, "").await.is_err());
        assert!(manager.ensure_model("../evil", url, "").await.is_err());
        assert!(manager.ensure_model("model/name", url, "").await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(temp_dir.path());

        assert!(manager.ensure_model("model.onnx", "", "").await.is_err());
        assert!(manager
            .ensure_model("model.onnx", "http://example.com/model.onnx", "")
            .await
            .is_err());
        assert!(manager
            .ensure_model("model.onnx", "ftp://example.com/model.onnx", "")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_returns_cached_copy() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(temp_dir.path());
        let cached = temp_dir.path().join("model.onnx");
        std::fs::write(&cached, b"cached").unwrap();

        // No network touch when the file already exists, even with a bad URL
        // host.
        let path = manager
            .ensure_model("model.onnx", "https://invalid.invalid/model.onnx", "")
            .await
            .unwrap();
        assert_eq!(path, cached);
    }
}
