use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures of the resource loader.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found.")]
    NotFound,

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures at the inference dispatch boundary.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model raised (or panicked); carries its message verbatim.
    #[error("{0}")]
    Failure(String),

    #[error("Inference timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Terminal failure states of one detection request.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("File not found.")]
    NotFound,

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Inference(String),

    #[error(transparent)]
    Timeout(InferenceError),
}

impl From<LoadError> for DetectionError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound => DetectionError::NotFound,
            LoadError::Decode(e) => DetectionError::Decode(e.to_string()),
            LoadError::Io(e) => DetectionError::Storage(e.to_string()),
        }
    }
}

impl From<InferenceError> for DetectionError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Failure(message) => DetectionError::Inference(message),
            timeout @ InferenceError::Timeout(_) => DetectionError::Timeout(timeout),
        }
    }
}
