pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;
use crate::detect::backend::InferenceBackend;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Build the inference backend named by the model settings.
///
/// `tract` is the default. The stub only runs when named explicitly, since its
/// detections are synthetic.
pub fn from_settings(settings: &ModelSettings) -> Result<Box<dyn InferenceBackend>> {
    match settings.backend.as_str() {
        "stub" => {
            log::warn!("stub inference backend selected: detections are synthetic, not model output");
            Ok(Box::new(StubBackend::new()))
        }
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = settings.path.as_ref().ok_or_else(|| {
                anyhow!("model path required: set [model] path, LIVEDETECT_MODEL or --model")
            })?;
            Ok(Box::new(TractBackend::new(
                path,
                settings.input_size,
                settings.iou_threshold,
            )?))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => Err(anyhow!(
            "the tract backend requires the backend-tract feature; \
             rebuild with it or set backend = \"stub\" for synthetic detections"
        )),
        other => Err(anyhow!("unknown inference backend '{}'", other)),
    }
}
