use super::{Detector, ExecutionProvider, ImagePredictions};
use crate::processing::{post::PostProcessor, pre::PreProcessor};
use image::DynamicImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::sync::Mutex;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";
const NAMES_METADATA_KEY: &str = "names";

/// Runtime parameters of a YOLO detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub intra_threads: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            intra_threads: 4,
        }
    }
}

/// Ultralytics YOLO detection model exported to ONNX.
///
/// `Session::run` needs exclusive access, so concurrent `predict` calls
/// serialize on the session lock while pre/post processing stays parallel.
pub struct OrtDetector {
    session: Mutex<Session>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    class_names: Option<Vec<String>>,
}

impl OrtDetector {
    pub fn load_model(
        path: &str,
        provider: ExecutionProvider,
        params: YoloParams,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(params.intra_threads)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        let class_names = session
            .metadata()
            .ok()
            .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY).ok().flatten())
            .and_then(|raw| parse_names_metadata(&raw));

        tracing::info!(
            path,
            classes = class_names.as_ref().map(Vec::len),
            "Model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            preprocessor: PreProcessor::new((params.input_size, params.input_size)),
            postprocessor: PostProcessor::new(
                params.confidence_threshold,
                params.iou_threshold,
                params.max_detections,
            ),
            class_names,
        })
    }

    fn predict_one(&self, image: &DynamicImage) -> anyhow::Result<ImagePredictions> {
        let (input, letterbox) = self.preprocessor.preprocess(image)?;

        let head = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
            let outputs = session.run(ort::inputs![
                INPUT_NAME => TensorRef::from_array_view(input.view())?
            ])?;
            outputs[OUTPUT_NAME].try_extract_array::<f32>()?.into_owned()
        };

        self.postprocessor.parse_detections(&head.view(), &letterbox)
    }
}

impl Detector for OrtDetector {
    fn predict(&self, images: &[DynamicImage]) -> anyhow::Result<Vec<ImagePredictions>> {
        images.iter().map(|image| self.predict_one(image)).collect()
    }

    fn class_names(&self) -> Option<&[String]> {
        self.class_names.as_deref()
    }
}

/// Parse the `names` metadata written by the ultralytics exporter, a Python
/// dict literal such as `{0: 'fire', 1: 'smoke'}`.
fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut entries: Vec<(usize, String)> = Vec::new();
    for entry in body.split(',').filter(|e| !e.trim().is_empty()) {
        let (index, name) = entry.split_once(':')?;
        let index = index.trim().parse().ok()?;
        let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
        entries.push((index, name.to_string()));
    }

    entries.sort_by_key(|(index, _)| *index);
    if entries.iter().enumerate().any(|(i, (index, _))| i != *index) {
        return None;
    }

    Some(entries.into_iter().map(|(_, name)| name).collect())
}
