use crate::config::{Config, RequestVariant};
use inference::{
    DetectionService, Detector, FsImageStore, ImageLoader, InferenceDispatcher, LabelFormat,
    Normalizer,
};
use std::sync::Arc;

pub struct AppState<D: Detector> {
    pub service: Arc<DetectionService<D>>,
    pub variant: RequestVariant,
}

impl<D: Detector> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            variant: self.variant,
        }
    }
}

impl<D: Detector> AppState<D> {
    /// Wire the detection pipeline around an already loaded model.
    pub fn build(config: &Config, detector: Arc<D>) -> Self {
        let class_names = config
            .class_names()
            .or_else(|| detector.class_names().map(<[String]>::to_vec))
            .unwrap_or_default();

        if config.label_format == LabelFormat::Name && class_names.is_empty() {
            tracing::warn!("Named labels requested but no class names are known, emitting ids");
        }

        let timeout = config.inference_timeout();
        let loader = ImageLoader::new(FsImageStore::new(config.image_root.clone()));
        let dispatcher =
            InferenceDispatcher::new(detector, config.workers()).with_timeout(timeout);

        tracing::info!(
            workers = dispatcher.workers(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            label_format = ?config.label_format,
            classes = class_names.len(),
            "Building detection pipeline"
        );

        let normalizer = Normalizer::new(config.label_format, class_names);

        Self {
            service: Arc::new(DetectionService::new(loader, dispatcher, normalizer)),
            variant: config.request_variant,
        }
    }
}
