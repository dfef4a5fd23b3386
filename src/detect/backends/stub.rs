use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::{InferenceBackend, RawBox, RawInference};
use crate::detect::classes::{coco_class_id, coco_class_names};

/// Stub backend for testing and model-free runs.
///
/// Reports one object covering the central half of every frame. The result is
/// suppressed when its confidence is below the requested threshold.
pub struct StubBackend {
    class_id: usize,
    confidence: f32,
    class_names: Vec<String>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            class_id: 0,
            confidence: 0.9,
            class_names: coco_class_names(),
        }
    }

    /// Report `class` (a COCO name) instead of "person".
    pub fn with_class(mut self, class: &str) -> Result<Self> {
        self.class_id =
            coco_class_id(class).ok_or_else(|| anyhow!("unknown COCO class '{}'", class))?;
        Ok(self)
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, image: &RgbImage, confidence_threshold: f32) -> Result<RawInference> {
        let (width, height) = (image.width() as f32, image.height() as f32);
        let mut boxes = Vec::new();
        if self.confidence >= confidence_threshold {
            boxes.push(RawBox {
                x1: width * 0.25,
                y1: height * 0.25,
                x2: width * 0.75,
                y2: height * 0.75,
                class_id: self.class_id,
                confidence: self.confidence,
            });
        }
        Ok(RawInference {
            boxes,
            class_names: self.class_names.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_central_box() -> Result<()> {
        let mut backend = StubBackend::new().with_class("dog")?;
        let raw = backend.infer(&RgbImage::new(320, 240), 0.5)?;
        assert_eq!(raw.boxes.len(), 1);
        let raw_box = raw.boxes[0];
        assert_eq!((raw_box.x1, raw_box.y1), (80.0, 60.0));
        assert_eq!((raw_box.x2, raw_box.y2), (240.0, 180.0));
        assert_eq!(raw.class_name(raw_box.class_id), "dog");
        Ok(())
    }

    #[test]
    fn stub_honours_threshold() -> Result<()> {
        let mut backend = StubBackend::new().with_confidence(0.4);
        assert!(backend.infer(&RgbImage::new(8, 8), 0.5)?.boxes.is_empty());
        assert_eq!(backend.infer(&RgbImage::new(8, 8), 0.4)?.boxes.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_class_is_rejected() {
        assert!(StubBackend::new().with_class("unicorn").is_err());
    }
}
