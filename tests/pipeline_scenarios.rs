use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::RgbImage;

use livedetect::detect::{RawBox, RawInference};
use livedetect::frame::scaled_dimensions;
use livedetect::ingest::{CameraConfig, CameraSource, FileConfig, FileSource, SourceStats};
use livedetect::{
    CancelToken, Detector, DisplaySink, FatalInference, FrameBuffer, FrameSource,
    HeadlessDisplay, InferenceBackend, LabelTranslator, NextFrame, OverlayRenderer,
    PipelineConfig, PipelineController, PipelineError, SourceInfo, SourceKind, StubBackend,
    Termination,
};

const BOX_COLOR: [u8; 3] = [0, 0, 255];

/// Shared view of what a backend was asked to do.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<(u32, u32)>>>);

impl Calls {
    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn sizes(&self) -> Vec<(u32, u32)> {
        self.0.lock().unwrap().clone()
    }
}

/// Wraps a backend and records the frame size of every call.
struct Recording<B> {
    inner: B,
    calls: Calls,
}

impl<B: InferenceBackend> InferenceBackend for Recording<B> {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn infer(&mut self, image: &RgbImage, confidence_threshold: f32) -> Result<RawInference> {
        self.calls.0.lock().unwrap().push(image.dimensions());
        self.inner.infer(image, confidence_threshold)
    }
}

/// Reports one box covering the whole frame.
struct FullFrame;

impl InferenceBackend for FullFrame {
    fn name(&self) -> &'static str {
        "full-frame"
    }

    fn infer(&mut self, image: &RgbImage, _confidence_threshold: f32) -> Result<RawInference> {
        Ok(RawInference {
            boxes: vec![RawBox {
                x1: 0.0,
                y1: 0.0,
                x2: image.width() as f32,
                y2: image.height() as f32,
                class_id: 0,
                confidence: 0.95,
            }],
            class_names: vec!["person".to_string()],
        })
    }
}

/// Reports a box whose corners lie well outside the frame.
struct Overshooting;

impl InferenceBackend for Overshooting {
    fn name(&self) -> &'static str {
        "overshooting"
    }

    fn infer(&mut self, _image: &RgbImage, _confidence_threshold: f32) -> Result<RawInference> {
        Ok(RawInference {
            boxes: vec![RawBox {
                x1: -5.0,
                y1: -3.0,
                x2: 1e10,
                y2: 40.0,
                class_id: 0,
                confidence: 0.9,
            }],
            class_names: vec!["person".to_string()],
        })
    }
}

/// Fails on the calls whose 1-based index satisfies `fails`.
struct Flaky {
    calls: u64,
    fails: fn(u64) -> bool,
    fatal: bool,
}

impl InferenceBackend for Flaky {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn infer(&mut self, image: &RgbImage, confidence_threshold: f32) -> Result<RawInference> {
        self.calls += 1;
        if (self.fails)(self.calls) {
            if self.fatal {
                return Err(FatalInference("model session lost".to_string()).into());
            }
            return Err(anyhow!("transient inference failure"));
        }
        StubBackend::new().infer(image, confidence_threshold)
    }
}

/// Keeps every displayed frame's size and whether the stub box corner is drawn.
#[derive(Default)]
struct RecordingSink {
    frames: Vec<((u32, u32), bool)>,
    cancel_after: Option<usize>,
    closes: u32,
}

impl DisplaySink for RecordingSink {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    fn show(&mut self, frame: &FrameBuffer) -> Result<()> {
        let (w, h) = frame.dimensions();
        let corner = frame.pixel(w / 4, h / 4) == Some(BOX_COLOR);
        self.frames.push(((w, h), corner));
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool> {
        Ok(self
            .cancel_after
            .is_some_and(|limit| self.frames.len() >= limit))
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Counts how often the pipeline releases the wrapped source.
struct CountingSource<S> {
    inner: S,
    release_calls: u32,
}

impl<S: FrameSource> CountingSource<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            release_calls: 0,
        }
    }
}

impl<S: FrameSource> FrameSource for CountingSource<S> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn next_frame(&mut self) -> Result<NextFrame> {
        self.inner.next_frame()
    }

    fn info(&self) -> Option<SourceInfo> {
        self.inner.info()
    }

    fn release(&mut self) {
        self.release_calls += 1;
        self.inner.release();
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

fn clip(frames: u64, width: u32, height: u32) -> FileSource {
    FileSource::new(FileConfig::for_path(format!(
        "stub://clip?frames={}&size={}x{}",
        frames, width, height
    )))
}

fn camera(device: &str) -> CameraSource {
    CameraSource::new(CameraConfig {
        device: device.to_string(),
        ..CameraConfig::default()
    })
}

fn pipeline(
    backend: impl InferenceBackend + 'static,
    resize: f64,
    skip: i64,
    confidence: f32,
) -> PipelineController {
    let detector = Detector::new(Box::new(backend), LabelTranslator::portuguese(), confidence);
    PipelineController::new(
        PipelineConfig::new(resize, skip, false, confidence),
        detector,
        OverlayRenderer::without_font(),
    )
}

fn recording_stub(calls: &Calls) -> Recording<StubBackend> {
    Recording {
        inner: StubBackend::new().with_confidence(0.9),
        calls: calls.clone(),
    }
}

#[test]
fn twenty_frame_clip_with_skip_and_resize() -> Result<()> {
    let calls = Calls::default();
    let mut controller = pipeline(recording_stub(&calls), 0.5, 2, 0.5);
    let mut source = CountingSource::new(clip(20, 640, 480));
    let mut sink = RecordingSink::default();

    let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

    assert_eq!(report.termination, Termination::EndOfStream);
    assert_eq!(report.frames_read, 20);
    assert_eq!(report.frames_processed, 10);
    assert_eq!(report.detections_rendered, 10);
    assert_eq!(calls.count(), 10);
    assert!(calls.sizes().iter().all(|size| *size == (320, 240)));
    assert_eq!(sink.frames.len(), 10);
    for (size, annotated) in &sink.frames {
        assert_eq!(*size, (320, 240));
        assert!(annotated, "every processed frame carries its box");
    }
    assert_eq!(source.release_calls, 1);
    assert_eq!(source.stats().releases, 1);
    assert_eq!(sink.closes, 1);
    assert_eq!(controller.last_termination(), Some(Termination::EndOfStream));
    Ok(())
}

#[test]
fn skip_policy_processes_floor_of_frames_over_stride() -> Result<()> {
    for (frames, skip) in [(0, 1), (3, 5), (9, 3), (10, 3), (25, 10), (7, 1)] {
        let calls = Calls::default();
        let mut controller = pipeline(recording_stub(&calls), 1.0, skip, 0.5);
        let mut source = clip(frames, 32, 24);
        let mut sink = HeadlessDisplay::new();

        let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

        let expected = frames / skip as u64;
        assert_eq!(report.termination, Termination::EndOfStream);
        assert_eq!(calls.count() as u64, expected, "{frames} frames, skip {skip}");
        assert_eq!(sink.frames_shown(), expected);
    }
    Ok(())
}

#[test]
fn boxes_stay_inside_the_resized_frame() -> Result<()> {
    for resize in [0.1, 0.33, 0.5, 0.7, 1.0] {
        let calls = Calls::default();
        let backend = Recording {
            inner: FullFrame,
            calls: calls.clone(),
        };
        let mut controller = pipeline(backend, resize, 1, 0.5);
        let mut source = clip(3, 641, 479);
        let mut sink = RecordingSink::default();

        controller.run(&mut source, &mut sink, &CancelToken::new())?;

        let expected = scaled_dimensions(641, 479, resize);
        assert_eq!(calls.sizes(), vec![expected; 3], "resize {resize}");
    }

    let mut detector = Detector::new(Box::new(FullFrame), LabelTranslator::portuguese(), 0.5);
    let frame = FrameBuffer::filled(641, 479, [0, 0, 0]).resized(0.33);
    let (max_x, max_y) = scaled_dimensions(641, 479, 0.33);
    for detection in detector.detect(&frame)? {
        let bbox = detection.bbox;
        assert!(bbox.x >= 0 && bbox.y >= 0);
        assert!(bbox.right() <= max_x as i32 && bbox.bottom() <= max_y as i32);
    }
    Ok(())
}

#[test]
fn backend_boxes_past_the_frame_are_clamped_and_drawn() -> Result<()> {
    let mut detector = Detector::new(Box::new(Overshooting), LabelTranslator::portuguese(), 0.5);
    let frame = FrameBuffer::filled(64, 48, [0, 0, 0]).resized(0.5);
    assert_eq!(frame.dimensions(), (32, 24));
    let detections = detector.detect(&frame)?;
    assert_eq!(detections.len(), 1);
    let bbox = detections[0].bbox;
    assert!(bbox.x >= 0 && bbox.y >= 0, "{bbox:?}");
    assert!(bbox.right() <= 32 && bbox.bottom() <= 24, "{bbox:?}");

    let mut controller = pipeline(Overshooting, 0.5, 1, 0.5);
    let mut source = clip(5, 64, 48);
    let mut sink = RecordingSink::default();

    let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

    assert_eq!(report.termination, Termination::EndOfStream);
    assert_eq!(report.frames_processed, 5);
    assert_eq!(report.detections_rendered, 5);
    assert!(sink.frames.iter().all(|(size, _)| *size == (32, 24)));
    Ok(())
}

#[test]
fn emitted_detections_respect_threshold() -> Result<()> {
    for threshold in [0.1, 0.5, 0.6, 0.61, 0.9] {
        let mut controller = pipeline(StubBackend::new().with_confidence(0.6), 1.0, 1, threshold);
        let mut source = clip(4, 16, 16);
        let mut sink = HeadlessDisplay::new();

        let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

        let expected = if 0.6 >= threshold { 4 } else { 0 };
        assert_eq!(report.detections_rendered, expected, "threshold {threshold}");
        assert_eq!(report.frames_processed, 4);
    }
    Ok(())
}

#[test]
fn camera_open_failure_never_reaches_detection() {
    let calls = Calls::default();
    let mut controller = pipeline(recording_stub(&calls), 0.5, 2, 0.5);
    let mut source = CountingSource::new(camera("/dev/livedetect-missing"));
    let mut sink = RecordingSink::default();

    let err = controller
        .run(&mut source, &mut sink, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, PipelineError::SourceOpen { .. }), "{err}");
    assert_eq!(calls.count(), 0);
    assert!(sink.frames.is_empty());
    assert_eq!(source.release_calls, 1);
    assert_eq!(sink.closes, 1);
    assert_eq!(controller.last_termination(), Some(Termination::Error));
}

#[test]
fn camera_read_failure_ends_the_run() {
    let calls = Calls::default();
    let mut controller = pipeline(recording_stub(&calls), 1.0, 1, 0.5);
    let mut source = CountingSource::new(camera("stub://cam?size=64x48&fail_after=4"));
    let mut sink = RecordingSink::default();

    let err = controller
        .run(&mut source, &mut sink, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, PipelineError::Read { .. }), "{err}");
    assert_eq!(calls.count(), 4);
    assert_eq!(sink.frames.len(), 4);
    assert_eq!(source.release_calls, 1);
    assert_eq!(source.stats().releases, 1);
}

#[test]
fn quit_request_from_the_display_stops_the_run() -> Result<()> {
    let mut controller = pipeline(StubBackend::new(), 1.0, 1, 0.5);
    let mut source = CountingSource::new(camera("stub://cam?size=32x32"));
    let mut sink = RecordingSink {
        cancel_after: Some(3),
        ..RecordingSink::default()
    };

    let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

    assert_eq!(report.termination, Termination::Stopped);
    assert_eq!(sink.frames.len(), 3);
    assert_eq!(source.release_calls, 1);
    Ok(())
}

#[test]
fn external_cancel_token_stops_the_run() -> Result<()> {
    let mut controller = pipeline(StubBackend::new(), 1.0, 3, 0.5);
    let mut source = camera("stub://cam?size=32x32");
    let mut sink = HeadlessDisplay::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = controller.run(&mut source, &mut sink, &cancel)?;

    assert_eq!(report.termination, Termination::Stopped);
    assert_eq!(sink.frames_shown(), 0);
    assert_eq!(report.frames_read, 1);
    Ok(())
}

#[test]
fn isolated_inference_failures_skip_frames() -> Result<()> {
    let backend = Flaky {
        calls: 0,
        fails: |call| call % 2 == 0,
        fatal: false,
    };
    let mut controller = pipeline(backend, 1.0, 1, 0.5);
    let mut source = clip(10, 16, 16);
    let mut sink = HeadlessDisplay::new();

    let report = controller.run(&mut source, &mut sink, &CancelToken::new())?;

    assert_eq!(report.termination, Termination::EndOfStream);
    assert_eq!(report.inference_failures, 5);
    assert_eq!(report.frames_processed, 5);
    assert_eq!(sink.frames_shown(), 5);
    Ok(())
}

#[test]
fn repeated_inference_failures_end_the_run() {
    let backend = Flaky {
        calls: 0,
        fails: |call| call > 2,
        fatal: false,
    };
    let mut controller = pipeline(backend, 1.0, 1, 0.5);
    let mut source = clip(50, 16, 16);
    let mut sink = HeadlessDisplay::new();

    let err = controller
        .run(&mut source, &mut sink, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, PipelineError::Inference(_)), "{err}");
    assert_eq!(sink.frames_shown(), 2);
    assert_eq!(source.stats().frames_captured, 5);
    assert_eq!(source.stats().releases, 1);
}

#[test]
fn fatal_inference_failure_ends_the_run_immediately() {
    let backend = Flaky {
        calls: 0,
        fails: |_| true,
        fatal: true,
    };
    let mut controller = pipeline(backend, 1.0, 1, 0.5);
    let mut source = clip(50, 16, 16);
    let mut sink = HeadlessDisplay::new();

    let err = controller
        .run(&mut source, &mut sink, &CancelToken::new())
        .unwrap_err();

    match err {
        PipelineError::Inference(reason) => assert!(reason.contains("model session lost")),
        other => panic!("unexpected {other}"),
    }
    assert_eq!(source.stats().frames_captured, 1);
}

#[test]
fn out_of_range_settings_are_clamped() {
    let cfg = PipelineConfig::new(1.5, 0, true, 0.5);
    assert_eq!(cfg.resize_factor(), 1.0);
    assert_eq!(cfg.skip_frames(), 1);
    assert!(!cfg.resizes());
}
