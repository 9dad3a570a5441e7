pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod processing;
pub mod service;

// Re-export commonly used types for convenience
pub use backend::{Detector, ExecutionProvider, ImagePredictions, RawDetection};
pub use dispatcher::{InferenceDispatcher, default_workers};
pub use error::{DetectionError, InferenceError, LoadError};
pub use loader::{FsImageStore, ImageHandle, ImageLoader, ImageStore, ReleaseHook};
pub use normalize::{LabelFormat, Normalizer};
pub use service::{DetectionService, Stage};
