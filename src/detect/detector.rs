use anyhow::Result;

use super::backend::{Device, InferenceBackend, RawBox, RawInference};
use super::result::{BoundingBox, Detection};
use crate::frame::FrameBuffer;
use crate::labels::LabelTranslator;

/// Turns raw model output into [`Detection`] records.
///
/// The detector owns its backend exclusively. It passes the confidence threshold
/// to the backend on every call and does not filter again; results that break the
/// backend contract (below threshold, non-finite, or empty boxes) are dropped with
/// a warning.
pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    translator: LabelTranslator,
    confidence_threshold: f32,
    dropped: u64,
}

impl Detector {
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        translator: LabelTranslator,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            backend,
            translator,
            confidence_threshold,
            dropped: 0,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Number of out-of-contract raw results dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Pick the device for this run and hand it to the backend.
    pub fn select_device(&mut self, use_gpu: bool) -> Result<Device> {
        let device = Device::select(use_gpu, self.backend.gpu_available());
        self.backend.prepare(device)?;
        Ok(device)
    }

    pub fn detect(&mut self, frame: &FrameBuffer) -> Result<Vec<Detection>> {
        let raw = self
            .backend
            .infer(frame.image(), self.confidence_threshold)?;
        let mut detections = Vec::with_capacity(raw.boxes.len());
        for raw_box in &raw.boxes {
            match self.normalize(&raw, raw_box, frame.width(), frame.height()) {
                Some(detection) => detections.push(detection),
                None => {
                    self.dropped += 1;
                    log::warn!(
                        "Detector: dropping out-of-contract result from {}: {:?}",
                        self.backend.name(),
                        raw_box
                    );
                }
            }
        }
        Ok(detections)
    }

    /// Corners are clamped to the `width` x `height` frame they were computed on.
    fn normalize(
        &self,
        raw: &RawInference,
        raw_box: &RawBox,
        width: u32,
        height: u32,
    ) -> Option<Detection> {
        let coords = [raw_box.x1, raw_box.y1, raw_box.x2, raw_box.y2];
        if !raw_box.confidence.is_finite() || coords.iter().any(|v| !v.is_finite()) {
            return None;
        }
        if raw_box.confidence < self.confidence_threshold {
            return None;
        }
        let (max_x, max_y) = (width as f32, height as f32);
        let x1 = raw_box.x1.clamp(0.0, max_x);
        let y1 = raw_box.y1.clamp(0.0, max_y);
        let x2 = raw_box.x2.clamp(0.0, max_x);
        let y2 = raw_box.y2.clamp(0.0, max_y);
        // Truncation toward zero, matching integer conversion of float pixels.
        let bbox = BoundingBox {
            x: x1 as i32,
            y: y1 as i32,
            w: (x2 - x1) as i32,
            h: (y2 - y1) as i32,
        };
        if bbox.w <= 0 || bbox.h <= 0 {
            return None;
        }
        let original_label = raw.class_name(raw_box.class_id);
        Some(Detection {
            label: self.translator.translate(&original_label),
            original_label,
            confidence: raw_box.confidence,
            bbox,
        })
    }
}
