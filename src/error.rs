//! Error types for roadeye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input not found: {0}")]
    SourceNotFound(String),

    #[error("input could not be opened: {0}")]
    SourceNotReadable(String),

    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("cascade classifier error: {0}")]
    Cascade(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<opencv::Error> for PipelineError {
    fn from(err: opencv::Error) -> Self {
        PipelineError::OpenCv(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::SourceNotFound("video.mp4".to_string());
        assert!(err.to_string().contains("input not found"));
        assert!(err.to_string().contains("video.mp4"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io_err.into();
        match err {
            PipelineError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_source_errors_are_distinguishable() {
        let not_found = PipelineError::SourceNotFound("a".to_string());
        let not_readable = PipelineError::SourceNotReadable("a".to_string());
        let unsupported = PipelineError::UnsupportedFormat("a".to_string());
        assert_ne!(not_found.to_string(), not_readable.to_string());
        assert_ne!(not_readable.to_string(), unsupported.to_string());
    }
}
