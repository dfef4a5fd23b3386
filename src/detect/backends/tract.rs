#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, RawBox, RawInference};
use crate::detect::classes::coco_class_names;
use crate::error::FatalInference;

const BOX_CHANNELS: usize = 4;

/// YOLOv8 detection model executed with tract.
///
/// Loads a local ONNX export with a `[1, 3, S, S]` input and a
/// `[1, 4 + classes, anchors]` output. Frames are stretched to the model input and
/// boxes are scaled back to frame pixels. CPU only.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, iou_threshold: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            iou_threshold,
            class_names: coco_class_names(),
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(image, side, side, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, side as usize, side as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
        confidence_threshold: f32,
    ) -> Result<Vec<RawBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| FatalInference("model produced no outputs".to_string()))?;
        let preds = output
            .to_array_view::<f32>()
            .map_err(|err| FatalInference(format!("model output tensor was not f32: {}", err)))?;
        let shape = preds.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= BOX_CHANNELS {
            return Err(FatalInference(format!(
                "unexpected model output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            ))
            .into());
        }
        let (channels, anchors) = (shape[1], shape[2]);

        let scale_x = frame_width as f32 / self.input_size as f32;
        let scale_y = frame_height as f32 / self.input_size as f32;
        let (max_x, max_y) = (frame_width as f32, frame_height as f32);

        let mut boxes = Vec::new();
        for anchor in 0..anchors {
            let mut class_id = 0;
            let mut confidence = f32::NEG_INFINITY;
            for channel in BOX_CHANNELS..channels {
                let score = preds[[0, channel, anchor]];
                if score > confidence {
                    confidence = score;
                    class_id = channel - BOX_CHANNELS;
                }
            }
            if confidence < confidence_threshold {
                continue;
            }
            let cx = preds[[0, 0, anchor]] * scale_x;
            let cy = preds[[0, 1, anchor]] * scale_y;
            let w = preds[[0, 2, anchor]] * scale_x;
            let h = preds[[0, 3, anchor]] * scale_y;
            boxes.push(RawBox {
                x1: (cx - w / 2.0).clamp(0.0, max_x),
                y1: (cy - h / 2.0).clamp(0.0, max_y),
                x2: (cx + w / 2.0).clamp(0.0, max_x),
                y2: (cy + h / 2.0).clamp(0.0, max_y),
                class_id,
                confidence,
            });
        }
        Ok(non_max_suppression(boxes, self.iou_threshold))
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, image: &RgbImage, confidence_threshold: f32) -> Result<RawInference> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let boxes = self.decode(outputs, image.width(), image.height(), confidence_threshold)?;
        Ok(RawInference {
            boxes,
            class_names: self.class_names.clone(),
        })
    }
}

/// Greedy NMS across all classes, highest confidence first.
pub(crate) fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = w * h;
    let area = |r: &RawBox| (r.x2 - r.x1).max(0.0) * (r.y2 - r.y1).max(0.0);
    let union = area(a) + area(b) - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}
