//! livedetect
//!
//! Real-time object detection over a camera or video file, with boxes and labels
//! drawn onto each processed frame.
//!
//! # Pipeline
//!
//! `FrameSource -> skip policy -> resize -> Detector -> OverlayRenderer -> DisplaySink`
//!
//! `PipelineController` owns the loop. It runs on one thread and holds one frame at
//! a time. Detection coordinates are always in the pixel space of the frame that
//! was detected on, which is the reduced frame when a resize factor below 1.0 is set.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (camera, file, `stub://` synthetic sources)
//! - `detect`: inference backends and the `Detector` that normalizes their output
//! - `labels`: display vocabularies for class names
//! - `overlay`: box and caption rendering
//! - `display`: display sinks (headless, OpenCV window)
//! - `pipeline`: the controller, frame sampling and throughput counters
//! - `config`: `PipelineConfig` clamping and the layered `AppConfig`
//! - `prompt`: the interactive session setup

pub mod cancel;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod overlay;
pub mod pipeline;
pub mod prompt;
pub mod ui;

pub use cancel::CancelToken;
pub use config::{AppConfig, DisplayMode, PipelineConfig};
pub use detect::{BoundingBox, Detection, Detector, Device, InferenceBackend, StubBackend};
pub use display::{DisplaySink, HeadlessDisplay};
pub use error::{FatalInference, PipelineError};
pub use frame::FrameBuffer;
pub use ingest::{FrameSource, NextFrame, SourceInfo, SourceKind, SourceSpec};
pub use labels::{LabelTranslator, Vocabulary};
pub use overlay::OverlayRenderer;
pub use pipeline::{PipelineController, PipelineState, RunReport, Termination, ThroughputStats};
