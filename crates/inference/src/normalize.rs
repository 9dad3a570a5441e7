use crate::backend::RawDetection;
use schema::{DetectionResult, Label};
use serde::Deserialize;
use std::sync::Arc;

/// How class ids are rendered in `Label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    #[default]
    Index,
    Name,
}

/// Maps raw model detections onto the wire-stable result list.
///
/// Coordinates are truncated toward zero; order, count and confidence are
/// left exactly as the model reported them.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    label_format: LabelFormat,
    class_names: Arc<[String]>,
}

impl Normalizer {
    pub fn new(label_format: LabelFormat, class_names: impl Into<Arc<[String]>>) -> Self {
        Self {
            label_format,
            class_names: class_names.into(),
        }
    }

    pub fn normalize(&self, raw: &[RawDetection]) -> Vec<DetectionResult> {
        raw.iter()
            .map(|det| DetectionResult {
                label: self.label(det.class_id),
                left: truncate(det.left),
                top: truncate(det.top),
                right: truncate(det.right),
                bottom: truncate(det.bottom),
            })
            .collect()
    }

    fn label(&self, class_id: u32) -> Label {
        match self.label_format {
            LabelFormat::Index => Label::Index(class_id as i64),
            LabelFormat::Name => match self.class_names.get(class_id as usize) {
                Some(name) => Label::Name(name.clone()),
                None => Label::Name(class_id.to_string()),
            },
        }
    }
}

/// `as` truncates toward zero and saturates; NaN maps to 0.
#[inline]
fn truncate(v: f32) -> i64 {
    v as i64
}
