//! Object detection.
//!
//! `Detector` wraps an [`InferenceBackend`] and normalizes its raw corner-form
//! boxes into [`Detection`] records with translated labels.

mod backend;
pub mod backends;
mod classes;
mod detector;
mod result;

pub use backend::{Device, InferenceBackend, RawBox, RawInference};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use classes::{coco_class_id, coco_class_names, COCO_CLASSES};
pub use detector::Detector;
pub use result::{BoundingBox, Detection};
