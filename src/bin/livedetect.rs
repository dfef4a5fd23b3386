//! livedetect - real-time object detection on a webcam or video file
//!
//! Settings are layered: defaults, then the TOML config file, then `LIVEDETECT_*`
//! environment variables, then command-line flags. Without a configured source
//! the session is set up interactively.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;

use livedetect::config::DisplaySettings;
use livedetect::detect::backends;
use livedetect::prompt::{prompt_session, SessionChoice};
use livedetect::ui::{Ui, UiMode};
use livedetect::{
    AppConfig, CancelToken, Detector, DisplayMode, DisplaySink, HeadlessDisplay, LabelTranslator,
    OverlayRenderer, PipelineConfig, PipelineController, RunReport, SourceKind, SourceSpec,
    Termination, Vocabulary,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML config file.
    #[arg(long, env = "LIVEDETECT_CONFIG")]
    config: Option<PathBuf>,
    /// Input: `camera:<index>` or a video file path. Asked interactively when unset.
    #[arg(long)]
    source: Option<String>,
    /// Resize factor applied before detection (0.1-1.0).
    #[arg(long)]
    resize: Option<f64>,
    /// Process 1 of every N frames (1-10).
    #[arg(long)]
    skip: Option<i64>,
    /// Never use a GPU, even when available.
    #[arg(long)]
    no_gpu: bool,
    /// Minimum confidence of reported detections (0-1).
    #[arg(long)]
    confidence: Option<f32>,
    /// Inference backend (stub|tract).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model file for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// TrueType font for captions.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Label vocabulary (pt|canonical).
    #[arg(long)]
    vocabulary: Option<String>,
    /// Do not open a window.
    #[arg(long)]
    headless: bool,
    /// Write a JSON run summary to this path.
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(args.ui);

    let mut cfg = {
        let _stage = ui.stage("Loading configuration");
        let mut cfg = AppConfig::load_from(args.config.as_deref())?;
        apply_args(&mut cfg, &args)?;
        cfg
    };

    let (source_spec, pipeline_cfg) = match cfg.source.take() {
        Some(source) => (source, cfg.pipeline),
        None => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            match prompt_session(&mut input, &mut output, &cfg.pipeline)? {
                SessionChoice::Run { source, pipeline } => (source, pipeline),
                SessionChoice::Abort(reason) => {
                    writeln!(output, "{}. Exiting.", reason)?;
                    return Ok(());
                }
            }
        }
    };

    let detector = {
        let stage = ui.stage("Loading model");
        match backends::from_settings(&cfg.model) {
            Ok(backend) => Detector::new(
                backend,
                LabelTranslator::for_vocabulary(cfg.overlay.vocabulary),
                pipeline_cfg.confidence_threshold(),
            ),
            Err(err) => {
                stage.fail();
                return Err(err);
            }
        }
    };
    let renderer = OverlayRenderer::from_font_path(cfg.overlay.font_path.as_deref())?;
    let mut sink = build_sink(&cfg.display, &source_spec);

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrlc()?;

    let mut source = source_spec.build();
    let source_desc = source.describe();
    let mut controller = PipelineController::new(pipeline_cfg, detector, renderer);
    let report = controller.run(source.as_mut(), sink.as_mut(), &cancel)?;

    ui.summary(&report);
    if let Some(path) = &args.report_json {
        write_report(path, &source_desc, &pipeline_cfg, &report)?;
    }
    Ok(())
}

/// Command-line flags override file and environment settings.
fn apply_args(cfg: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(raw) = &args.source {
        cfg.source = Some(SourceSpec::parse(raw)?);
    }
    let current = cfg.pipeline;
    cfg.pipeline = PipelineConfig::new(
        args.resize.unwrap_or(current.resize_factor()),
        args.skip.unwrap_or(current.skip_frames() as i64),
        current.use_gpu() && !args.no_gpu,
        args.confidence.unwrap_or(current.confidence_threshold()),
    )
    .with_max_consecutive_inference_failures(current.max_consecutive_inference_failures());

    if let Some(backend) = &args.backend {
        cfg.model.backend = backend.trim().to_lowercase();
    }
    if let Some(model) = &args.model {
        cfg.model.path = Some(model.clone());
    }
    if let Some(font) = &args.font {
        cfg.overlay.font_path = Some(font.clone());
    }
    if let Some(raw) = &args.vocabulary {
        cfg.overlay.vocabulary =
            Vocabulary::parse(raw).ok_or_else(|| anyhow!("unknown vocabulary '{}'", raw))?;
    }
    if args.headless {
        cfg.display.mode = DisplayMode::Headless;
    }
    Ok(())
}

fn build_sink(display: &DisplaySettings, source: &SourceSpec) -> Box<dyn DisplaySink> {
    match display.mode {
        DisplayMode::Headless => Box::new(HeadlessDisplay::new()),
        DisplayMode::Window => window_sink(display, source),
    }
}

#[cfg(feature = "display-opencv")]
fn window_sink(display: &DisplaySettings, source: &SourceSpec) -> Box<dyn DisplaySink> {
    let title = display.window_title.clone().unwrap_or_else(|| match source.kind() {
        SourceKind::Camera => "Object Detection - Webcam".to_string(),
        SourceKind::File => "Object Detection - Video".to_string(),
    });
    Box::new(livedetect::display::OpenCvWindow::new(title))
}

#[cfg(not(feature = "display-opencv"))]
fn window_sink(_display: &DisplaySettings, source: &SourceSpec) -> Box<dyn DisplaySink> {
    log::warn!(
        "window display requires the display-opencv feature; running {} headless",
        match source.kind() {
            SourceKind::Camera => "camera",
            SourceKind::File => "video",
        }
    );
    Box::new(HeadlessDisplay::new())
}

#[derive(Serialize)]
struct ReportJson<'a> {
    source: &'a str,
    termination: &'static str,
    device: String,
    resize_factor: f64,
    skip_frames: u32,
    frames_read: u64,
    frames_processed: u64,
    detections_rendered: u64,
    inference_failures: u64,
    last_rate: Option<f64>,
    elapsed_secs: f64,
}

fn write_report(
    path: &Path,
    source: &str,
    pipeline: &PipelineConfig,
    report: &RunReport,
) -> Result<()> {
    let json = ReportJson {
        source,
        termination: match report.termination {
            Termination::Stopped => "stopped",
            Termination::EndOfStream => "end_of_stream",
            Termination::Error => "error",
        },
        device: report.device.to_string(),
        resize_factor: pipeline.resize_factor(),
        skip_frames: pipeline.skip_frames(),
        frames_read: report.frames_read,
        frames_processed: report.frames_processed,
        detections_rendered: report.detections_rendered,
        inference_failures: report.inference_failures,
        last_rate: report.last_rate,
        elapsed_secs: report.elapsed.as_secs_f64(),
    };
    let body = serde_json::to_string_pretty(&json)?;
    std::fs::write(path, body)
        .with_context(|| format!("write run report {}", path.display()))?;
    log::info!("run report written to {}", path.display());
    Ok(())
}
