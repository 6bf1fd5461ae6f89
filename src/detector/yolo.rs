//! YOLOv8-style output decoding: candidate extraction, NMS and box rescaling.
//!
//! Kept free of any runtime dependency so the local backend's post-processing
//! is compiled and tested without the `onnx-detector` feature.

use serde::{Deserialize, Serialize};

use crate::detection::BoundingBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoloParams {
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// One decoded candidate, box in model-input pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Decode a `[1, 4+nc, N]` (or transposed `[1, N, 4+nc]`) output tensor.
///
/// Rows are `cx, cy, w, h` followed by one score per class. The attribute
/// axis is taken to be the shorter of the two trailing dimensions.
pub fn decode_output(
    data: &[f32],
    shape: &[usize],
    conf_threshold: f32,
) -> Result<Vec<RawBox>, String> {
    let (d1, d2) = match shape {
        [1, a, b] => (*a, *b),
        other => return Err(format!("unexpected output shape {other:?}")),
    };
    let channel_major = d1 <= d2;
    let (attrs, candidates) = if channel_major { (d1, d2) } else { (d2, d1) };

    if attrs <= 4 {
        return Err(format!("output has no class scores: shape {shape:?}"));
    }
    if data.len() != attrs * candidates {
        return Err(format!(
            "output length {} does not match shape {shape:?}",
            data.len()
        ));
    }

    let at = |attr: usize, i: usize| {
        if channel_major {
            data[attr * candidates + i]
        } else {
            data[i * attrs + attr]
        }
    };

    let mut boxes = Vec::new();
    for i in 0..candidates {
        let (class_id, confidence) = (4..attrs)
            .map(|a| (a - 4, at(a, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if confidence < conf_threshold {
            continue;
        }
        boxes.push(RawBox {
            class_id,
            confidence,
            bbox: BoundingBox::from_center(at(0, i), at(1, i), at(2, i), at(3, i)),
        });
    }
    Ok(boxes)
}

/// Class-aware greedy non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32, max_detections: usize) -> Vec<RawBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Map a box from the square model input back to the source image.
pub fn rescale(bbox: BoundingBox, input_size: u32, width: u32, height: u32) -> BoundingBox {
    let sx = width as f32 / input_size as f32;
    let sy = height as f32 / input_size as f32;
    BoundingBox {
        x1: (bbox.x1 * sx).clamp(0.0, width as f32),
        y1: (bbox.y1 * sy).clamp(0.0, height as f32),
        x2: (bbox.x2 * sx).clamp(0.0, width as f32),
        y2: (bbox.y2 * sy).clamp(0.0, height as f32),
    }
}

/// Class names from a `.names` file body: one per line, blanks skipped.
pub fn parse_class_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
