use std::fmt;

use anyhow::Result;
use image::RgbImage;

/// Compute device an inference backend runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    /// Decide the device once per run.
    ///
    /// A GPU is used only when it was requested and the backend reports one.
    pub fn select(use_gpu: bool, gpu_available: bool) -> Self {
        match (use_gpu, gpu_available) {
            (true, true) => {
                log::info!("Using GPU for inference");
                Device::Gpu
            }
            (true, false) => {
                log::warn!("GPU requested but not available, using CPU");
                Device::Cpu
            }
            (false, _) => {
                log::info!("Using CPU for inference");
                Device::Cpu
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu => f.write_str("gpu"),
        }
    }
}

/// One raw detection as produced by a model, in corner form and frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub confidence: f32,
}

/// Output of one inference call.
#[derive(Clone, Debug, Default)]
pub struct RawInference {
    pub boxes: Vec<RawBox>,
    /// Class-id to canonical class-name table of the model.
    pub class_names: Vec<String>,
}

impl RawInference {
    pub fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Opaque object-detection capability.
///
/// Backends own confidence filtering: every returned box must have
/// `confidence >= confidence_threshold`. A backend that can no longer run at all
/// should return a [`crate::error::FatalInference`] so the run stops instead of
/// skipping frames.
pub trait InferenceBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Whether the backend can execute on a GPU in this process.
    fn gpu_available(&self) -> bool {
        false
    }

    /// Called once at pipeline start with the selected device.
    fn prepare(&mut self, _device: Device) -> Result<()> {
        Ok(())
    }

    /// Run detection on one RGB frame. Blocking.
    fn infer(&mut self, image: &RgbImage, confidence_threshold: f32) -> Result<RawInference>;
}
