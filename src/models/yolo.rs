//! ONNX object-detection model

use crate::error::PipelineError;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

const INPUT_SIZE: i32 = 640;
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// One raw model output after postprocessing: pixel-space box, label, score.
#[derive(Debug, Clone)]
pub struct ModelDetection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    /// x, y, width, height in frame pixels
    pub bbox: (f32, f32, f32, f32),
}

/// YOLO-family detection model behind an ONNX Runtime session.
pub struct YoloModel {
    session: Session,
    score_threshold: Option<f32>,
}

impl YoloModel {
    /// Load a model from disk. This is the slow one-time initialization; a
    /// failure here aborts the pipeline before any frame is processed.
    pub fn new(model_path: &Path, score_threshold: Option<f32>) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Ort(format!("failed to create session builder: {e}")))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| {
                PipelineError::Ort(format!("failed to register execution providers: {e}"))
            })?
            .commit_from_file(model_path)
            .map_err(|e| {
                PipelineError::Ort(format!("failed to load {}: {e}", model_path.display()))
            })?;

        info!("detection model loaded from {}", model_path.display());

        Ok(Self {
            session,
            score_threshold,
        })
    }

    /// Detect objects on a full-color BGR frame.
    pub fn detect(&mut self, frame: &Mat) -> Result<Vec<ModelDetection>, PipelineError> {
        let frame_width = frame.cols() as f32;
        let frame_height = frame.rows() as f32;

        let input = preprocess(frame)?;
        let outputs = self
            .session
            .run(ort::inputs!["images" => input])
            .map_err(|e| PipelineError::Ort(format!("inference failed: {e}")))?;

        let value = outputs
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| PipelineError::Ort("model produced no outputs".to_string()))?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Ort(format!("failed to extract output tensor: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        debug!("model output shape: {:?}", dims);

        let detections = postprocess(
            &dims,
            data,
            frame_width,
            frame_height,
            self.score_threshold,
        )?;
        let detections = nms(detections, NMS_IOU_THRESHOLD);

        debug!("model kept {} detection(s) after NMS", detections.len());
        Ok(detections)
    }
}

/// Resize to the model's square input, convert BGR to RGB, and normalize
/// into a [1, 3, H, W] float tensor.
fn preprocess(frame: &Mat) -> Result<ort::value::DynValue, PipelineError> {
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(INPUT_SIZE, INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut rgb = Mat::default();
    imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let pixels = rgb.data_bytes()?;
    let hw = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut tensor_data = vec![0f32; 3 * hw];
    for idx in 0..hw {
        tensor_data[idx] = pixels[idx * 3] as f32 / 255.0;
        tensor_data[hw + idx] = pixels[idx * 3 + 1] as f32 / 255.0;
        tensor_data[2 * hw + idx] = pixels[idx * 3 + 2] as f32 / 255.0;
    }

    let shape = [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];
    Ok(Tensor::from_array((shape, tensor_data.into_boxed_slice()))
        .map_err(|e| PipelineError::Ort(format!("failed to create input tensor: {e}")))?
        .into_dyn())
}

/// Decode `[1, rows, 5 + classes]` output rows of
/// `[cx, cy, w, h, objectness, class scores...]` in input-pixel coordinates
/// into frame-pixel detections. The score threshold is applied only when
/// configured.
fn postprocess(
    dims: &[usize],
    data: &[f32],
    frame_width: f32,
    frame_height: f32,
    score_threshold: Option<f32>,
) -> Result<Vec<ModelDetection>, PipelineError> {
    if dims.len() != 3 || dims[2] <= 5 {
        return Err(PipelineError::Ort(format!(
            "unexpected output shape: {dims:?}"
        )));
    }
    let rows = dims[1];
    let stride = dims[2];
    let num_classes = (stride - 5).min(COCO_CLASSES.len());
    if data.len() < rows * stride {
        return Err(PipelineError::Ort(format!(
            "output tensor shorter than its shape: {} < {}",
            data.len(),
            rows * stride
        )));
    }

    let floor = score_threshold.unwrap_or(0.0);
    let scale_x = frame_width / INPUT_SIZE as f32;
    let scale_y = frame_height / INPUT_SIZE as f32;

    let mut detections = Vec::new();
    for row in 0..rows {
        let base = row * stride;
        let objectness = data[base + 4];
        if !objectness.is_finite() || objectness <= floor {
            continue;
        }

        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for class_idx in 0..num_classes {
            let score = data[base + 5 + class_idx];
            if score > best_score {
                best_score = score;
                best_class = class_idx;
            }
        }

        let confidence = objectness * best_score;
        if !confidence.is_finite() || confidence <= floor {
            continue;
        }

        let cx = data[base] * scale_x;
        let cy = data[base + 1] * scale_y;
        let w = data[base + 2] * scale_x;
        let h = data[base + 3] * scale_y;
        if !cx.is_finite() || !cy.is_finite() || w <= 0.0 || h <= 0.0 {
            continue;
        }

        detections.push(ModelDetection {
            class_id: best_class,
            class_name: COCO_CLASSES[best_class].to_string(),
            confidence,
            bbox: (cx - w / 2.0, cy - h / 2.0, w, h),
        });
    }

    Ok(detections)
}

/// Greedy non-maximum suppression: sort by confidence descending, suppress
/// overlapping boxes.
fn nms(mut detections: Vec<ModelDetection>, iou_threshold: f32) -> Vec<ModelDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.retain(|d| d.confidence.is_finite());
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<ModelDetection> = Vec::new();
    for candidate in detections {
        if keep
            .iter()
            .all(|kept| iou(&candidate.bbox, &kept.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection over union of two `(x, y, w, h)` boxes.
fn iou(a: &(f32, f32, f32, f32), b: &(f32, f32, f32, f32)) -> f32 {
    let (ax, ay, aw, ah) = *a;
    let (bx, by, bw, bh) = *b;
    if aw <= 0.0 || ah <= 0.0 || bw <= 0.0 || bh <= 0.0 {
        return 0.0;
    }

    let inter_x_min = ax.max(bx);
    let inter_y_min = ay.max(by);
    let inter_x_max = (ax + aw).min(bx + bw);
    let inter_y_max = (ay + ah).min(by + bh);
    if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
        return 0.0;
    }

    let inter = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
    let union = aw * ah + bw * bh - inter;
    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> ModelDetection {
        ModelDetection {
            class_id: 2,
            class_name: "car".to_string(),
            confidence,
            bbox: (x, y, w, h),
        }
    }

    #[test]
    fn test_iou_disjoint() {
        assert_eq!(iou(&(0.0, 0.0, 10.0, 10.0), &(20.0, 20.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_iou_identical() {
        let b = (5.0, 5.0, 10.0, 10.0);
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // Two 10x10 boxes offset by 5: intersection 25, union 175.
        let value = iou(&(0.0, 0.0, 10.0, 10.0), &(5.0, 5.0, 10.0, 10.0));
        assert!((value - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        assert_eq!(iou(&(0.0, 0.0, 0.0, 10.0), &(0.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let kept = nms(
            vec![
                det(0.0, 0.0, 10.0, 10.0, 0.9),
                det(1.0, 1.0, 10.0, 10.0, 0.8),
                det(50.0, 50.0, 10.0, 10.0, 0.7),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_keeps_order_by_confidence() {
        let kept = nms(
            vec![
                det(50.0, 50.0, 10.0, 10.0, 0.2),
                det(0.0, 0.0, 10.0, 10.0, 0.9),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert!(kept[0].confidence > kept[1].confidence);
    }

    #[test]
    fn test_postprocess_decodes_rows() {
        // One row grid: [cx, cy, w, h, obj, 80 class scores], car (idx 2) hot.
        let stride = 85;
        let mut data = vec![0.0f32; 2 * stride];
        data[0] = 320.0;
        data[1] = 320.0;
        data[2] = 64.0;
        data[3] = 64.0;
        data[4] = 0.9;
        data[5 + 2] = 0.8;
        // Second row has zero objectness and must be dropped.
        let dims = [1, 2, stride];

        let detections = postprocess(&dims, &data, 1280.0, 720.0, Some(0.25)).unwrap();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.class_name, "car");
        assert!((d.confidence - 0.72).abs() < 1e-6);
        // Center (320, 320) on a 640 input maps to frame center.
        assert!((d.bbox.0 - (640.0 - 64.0)).abs() < 1e-3);
        assert!((d.bbox.1 - (360.0 - 36.0)).abs() < 1e-3);
    }

    #[test]
    fn test_postprocess_no_threshold_keeps_low_scores() {
        let stride = 85;
        let mut data = vec![0.0f32; stride];
        data[0] = 100.0;
        data[1] = 100.0;
        data[2] = 10.0;
        data[3] = 10.0;
        data[4] = 0.05;
        data[5] = 0.5;
        let dims = [1, 1, stride];

        assert_eq!(
            postprocess(&dims, &data, 640.0, 640.0, Some(0.25))
                .unwrap()
                .len(),
            0
        );
        assert_eq!(
            postprocess(&dims, &data, 640.0, 640.0, None).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_postprocess_rejects_bad_shape() {
        assert!(postprocess(&[1, 10], &[0.0; 850], 640.0, 640.0, None).is_err());
        assert!(postprocess(&[1, 10, 85], &[0.0; 10], 640.0, 640.0, None).is_err());
    }
}
