use crate::{
    backend::Detector,
    dispatcher::InferenceDispatcher,
    error::DetectionError,
    loader::{FsImageStore, ImageLoader, ImageStore},
    normalize::Normalizer,
};
use schema::DetectionResult;
use std::time::Instant;

/// Per-request pipeline stages. `NotFound`, `Failed` and `TimedOut` are
/// terminal failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Loading,
    Inferring,
    Normalizing,
    Completed,
    NotFound,
    Failed,
    TimedOut,
}

impl Stage {
    fn of_error(err: &DetectionError) -> Self {
        match err {
            DetectionError::NotFound => Stage::NotFound,
            DetectionError::Timeout(_) => Stage::TimedOut,
            _ => Stage::Failed,
        }
    }
}

/// Turns an image locator into detection results: load, infer on the worker
/// pool, normalize.
///
/// Holds no per-request state; one instance serves all requests.
pub struct DetectionService<D: Detector, S: ImageStore = FsImageStore> {
    loader: ImageLoader<S>,
    dispatcher: InferenceDispatcher<D>,
    normalizer: Normalizer,
}

impl<D: Detector, S: ImageStore> DetectionService<D, S> {
    pub fn new(
        loader: ImageLoader<S>,
        dispatcher: InferenceDispatcher<D>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            loader,
            dispatcher,
            normalizer,
        }
    }

    pub fn dispatcher(&self) -> &InferenceDispatcher<D> {
        &self.dispatcher
    }

    #[tracing::instrument(name = "detect", skip(self))]
    pub async fn detect(&self, path: &str) -> Result<Vec<DetectionResult>, DetectionError> {
        let start = Instant::now();
        transition(Stage::Received);

        transition(Stage::Loading);
        let handle = match self.loader.load(path).await {
            Ok(handle) => handle,
            Err(e) => return Err(fail(e.into())),
        };

        transition(Stage::Inferring);
        let inferred = self.dispatcher.infer(&handle).await;
        // Released on every exit from Inferring
        drop(handle);
        let raw = inferred.map_err(|e| fail(e.into()))?;

        transition(Stage::Normalizing);
        let results = self.normalizer.normalize(&raw);

        transition(Stage::Completed);
        tracing::info!(
            detections = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detection completed"
        );

        Ok(results)
    }
}

#[inline]
fn transition(stage: Stage) {
    tracing::debug!(stage = ?stage, "Stage transition");
}

fn fail(err: DetectionError) -> DetectionError {
    let stage = Stage::of_error(&err);
    match stage {
        Stage::NotFound => tracing::info!(stage = ?stage, "Image not found"),
        _ => tracing::warn!(stage = ?stage, error = %err, "Detection failed"),
    }
    err
}
