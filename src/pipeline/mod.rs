//! Real-time frame-processing pipeline.
//!
//! `PipelineController` owns the loop: pull a frame, apply the skip policy, resize,
//! detect, render, display, and check for cancellation. It is single-threaded and
//! holds at most one frame at a time.
//!
//! States: `Idle -> Running -> (Stopped | EndOfStream | Error) -> Idle`. The source
//! and the display sink are released exactly once on every exit path, including a
//! failed open.

mod sampler;
mod stats;

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::detect::{Detector, Device};
use crate::display::DisplaySink;
use crate::error::{FatalInference, PipelineError, Result};
use crate::frame::scaled_dimensions;
use crate::ingest::{FrameSource, NextFrame};
use crate::overlay::OverlayRenderer;

pub use sampler::FrameSampler;
pub use stats::{ThroughputStats, RATE_INTERVAL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Cancelled by the user or an external token.
    Stopped,
    /// A file source ran out of frames.
    EndOfStream,
    Error,
}

/// Summary of a completed run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub termination: Termination,
    pub device: Device,
    pub frames_read: u64,
    /// Frames that went through detection and rendering.
    pub frames_processed: u64,
    pub detections_rendered: u64,
    /// Frames whose inference failed and were skipped.
    pub inference_failures: u64,
    /// Last processing rate drawn on a frame.
    pub last_rate: Option<f64>,
    pub elapsed: Duration,
}

pub struct PipelineController {
    config: PipelineConfig,
    detector: Detector,
    renderer: OverlayRenderer,
    state: PipelineState,
    last_termination: Option<Termination>,
}

impl PipelineController {
    pub fn new(config: PipelineConfig, detector: Detector, renderer: OverlayRenderer) -> Self {
        Self {
            config,
            detector,
            renderer,
            state: PipelineState::Idle,
            last_termination: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// How the most recent run ended, if any run has completed.
    pub fn last_termination(&self) -> Option<Termination> {
        self.last_termination
    }

    /// Run until end of stream, cancellation, or a fatal error.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn DisplaySink,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        self.state = PipelineState::Running;
        let outcome = self.run_loop(source, sink, cancel);

        source.release();
        sink.close();
        self.state = PipelineState::Idle;

        let termination = match &outcome {
            Ok(report) => report.termination,
            Err(err) => {
                log::error!("Pipeline stopped: {}", err);
                Termination::Error
            }
        };
        self.last_termination = Some(termination);
        outcome
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn DisplaySink,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let device = self
            .detector
            .select_device(self.config.use_gpu())
            .map_err(|err| PipelineError::Inference(format!("{:#}", err)))?;

        let source_desc = source.describe();
        source
            .open()
            .map_err(|err| PipelineError::source_open(&source_desc, &err))?;
        self.log_start(source, sink);

        let mut sampler = FrameSampler::new(self.config.skip_frames());
        let mut stats = ThroughputStats::start();
        let mut detections_rendered = 0;
        let mut inference_failures = 0;
        let mut consecutive_failures = 0;
        let mut last_rate = None;

        let termination = loop {
            let frame = match source.next_frame() {
                Ok(NextFrame::Frame(frame)) => frame,
                Ok(NextFrame::EndOfStream) => {
                    log::info!("End of stream: {}", source_desc);
                    break Termination::EndOfStream;
                }
                Err(err) => return Err(PipelineError::read(&source_desc, &err)),
            };

            if !sampler.admit() {
                if cancel.is_cancelled() {
                    break Termination::Stopped;
                }
                continue;
            }

            let frame = if self.config.resizes() {
                frame.resized(self.config.resize_factor())
            } else {
                frame
            };

            let detections = match self.detector.detect(&frame) {
                Ok(detections) => {
                    consecutive_failures = 0;
                    detections
                }
                Err(err) => {
                    if let Some(fatal) = err.downcast_ref::<FatalInference>() {
                        return Err(PipelineError::Inference(fatal.to_string()));
                    }
                    inference_failures += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_inference_failures() {
                        return Err(PipelineError::Inference(format!(
                            "{} consecutive failures, last: {:#}",
                            consecutive_failures, err
                        )));
                    }
                    log::warn!("Inference failed, skipping frame: {:#}", err);
                    if cancel.is_cancelled() {
                        break Termination::Stopped;
                    }
                    continue;
                }
            };

            let mut frame = self.renderer.render(frame, &detections);
            detections_rendered += detections.len() as u64;
            if let Some(rate) = stats.record_frame() {
                log::debug!(
                    "Processing rate: {:.1} fps over {} frames",
                    rate,
                    stats.processed_frames()
                );
                self.renderer.draw_rate(&mut frame, rate);
                last_rate = Some(rate);
            }

            sink.show(&frame)
                .map_err(|err| PipelineError::Display(format!("{:#}", err)))?;

            let quit = sink
                .poll_cancel()
                .map_err(|err| PipelineError::Display(format!("{:#}", err)))?;
            if quit || cancel.is_cancelled() {
                log::info!("Cancellation requested, stopping");
                break Termination::Stopped;
            }
        };

        Ok(RunReport {
            termination,
            device,
            frames_read: sampler.frames_seen(),
            frames_processed: stats.processed_frames(),
            detections_rendered,
            inference_failures,
            last_rate,
            elapsed: stats.elapsed(),
        })
    }

    fn log_start(&self, source: &dyn FrameSource, sink: &dyn DisplaySink) {
        log::info!(
            "Processing {} with {} on {}",
            source.describe(),
            self.detector.backend_name(),
            sink.describe()
        );
        if let Some(info) = source.info() {
            match info.fps {
                Some(fps) => log::info!(
                    "Original resolution: {}x{}, FPS: {:.2}",
                    info.width,
                    info.height,
                    fps
                ),
                None => log::info!("Original resolution: {}x{}", info.width, info.height),
            }
            if self.config.resizes() {
                let (width, height) =
                    scaled_dimensions(info.width, info.height, self.config.resize_factor());
                log::info!("Reduced resolution: {}x{}", width, height);
            }
        }
        log::info!(
            "Processing 1 of every {} frames",
            self.config.skip_frames()
        );
    }
}
