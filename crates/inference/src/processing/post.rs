use crate::backend::ImagePredictions;
use crate::processing::pre::Letterbox;

/// Thresholds applied to the raw YOLO head before results leave the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

struct Candidate {
    bbox: [f32; 4],
    class_id: u32,
    score: f32,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Decode a YOLO detection head of shape `[1, 4 + num_classes, num_anchors]`
    /// (boxes as cxcywh in model input pixels) into boxes on the original
    /// image, sorted by confidence descending after class-wise NMS.
    #[tracing::instrument(skip_all)]
    pub fn parse_detections(
        &self,
        output: &ndarray::ArrayViewD<f32>,
        letterbox: &Letterbox,
    ) -> anyhow::Result<ImagePredictions> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            anyhow::bail!(
                "Unexpected model output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            );
        }

        let num_channels = shape[1];
        let num_anchors = shape[2];

        let mut candidates = Vec::new();
        for i in 0..num_anchors {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_class = 0usize;
            for c in 4..num_channels {
                let score = output[[0, c, i]];
                if score > best_score {
                    best_score = score;
                    best_class = c - 4;
                }
            }

            if best_score < self.confidence_threshold {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                output[[0, 0, i]],
                output[[0, 1, i]],
                output[[0, 2, i]],
                output[[0, 3, i]],
            );

            candidates.push(Candidate {
                bbox: unletterbox([x1, y1, x2, y2], letterbox),
                class_id: best_class as u32,
                score: best_score,
            });
        }

        tracing::trace!(
            anchors = num_anchors,
            candidates = candidates.len(),
            "Decoded detection head"
        );

        // Stable: equal scores keep anchor order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }
            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > self.iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
            }
        }

        let mut predictions = ImagePredictions::default();
        for k in kept {
            predictions.push(k.bbox, k.class_id, k.score);
        }
        Ok(predictions)
    }
}

/// Map a box from letterboxed model input space back onto the source image,
/// clamped to its bounds.
fn unletterbox(bbox: [f32; 4], letterbox: &Letterbox) -> [f32; 4] {
    let w = letterbox.orig_width as f32;
    let h = letterbox.orig_height as f32;
    [
        ((bbox[0] - letterbox.offset_x) / letterbox.scale).clamp(0.0, w),
        ((bbox[1] - letterbox.offset_y) / letterbox.scale).clamp(0.0, h),
        ((bbox[2] - letterbox.offset_x) / letterbox.scale).clamp(0.0, w),
        ((bbox[3] - letterbox.offset_y) / letterbox.scale).clamp(0.0, h),
    ]
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

#[inline]
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}
