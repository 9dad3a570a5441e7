use image::DynamicImage;
use serde::Deserialize;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Hardware the model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

/// A loaded detection model.
///
/// `predict` is blocking (CPU/GPU bound) and may be called concurrently from
/// several worker threads, hence `Sync`.
pub trait Detector: Send + Sync + 'static {
    /// Run detection on a batch of images, returning one group per image in
    /// input order.
    fn predict(&self, images: &[DynamicImage]) -> anyhow::Result<Vec<ImagePredictions>>;

    /// Class names indexed by class id, when the model carries them.
    fn class_names(&self) -> Option<&[String]> {
        None
    }
}

/// Raw output of the model for one image: parallel sequences of boxes
/// (`[left, top, right, bottom]` in absolute pixels), class ids and scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagePredictions {
    pub boxes: Vec<[f32; 4]>,
    pub classes: Vec<u32>,
    pub scores: Vec<f32>,
}

impl ImagePredictions {
    pub fn push(&mut self, bbox: [f32; 4], class_id: u32, score: f32) {
        self.boxes.push(bbox);
        self.classes.push(class_id);
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.boxes.len().min(self.classes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zip the parallel sequences into per-object detections. Pairs past the
    /// shorter of `boxes`/`classes` are dropped; a missing score is `None`.
    pub fn into_detections(self) -> impl Iterator<Item = RawDetection> {
        let mut scores = self.scores.into_iter();
        self.boxes
            .into_iter()
            .zip(self.classes)
            .map(move |([left, top, right, bottom], class_id)| RawDetection {
                left,
                top,
                right,
                bottom,
                class_id,
                confidence: scores.next(),
            })
    }
}

/// One detected object as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub class_id: u32,
    pub confidence: Option<f32>,
}
