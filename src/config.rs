use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::SourceSpec;
use crate::labels::Vocabulary;

pub const DEFAULT_RESIZE_FACTOR: f64 = 0.5;
pub const DEFAULT_SKIP_FRAMES: u32 = 2;
pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_MAX_INFERENCE_FAILURES: u32 = 3;
const DEFAULT_BACKEND: &str = "tract";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_IOU: f32 = 0.45;

pub const MIN_RESIZE_FACTOR: f64 = 0.1;
pub const MAX_RESIZE_FACTOR: f64 = 1.0;
pub const MIN_SKIP_FRAMES: u32 = 1;
pub const MAX_SKIP_FRAMES: u32 = 10;

// ----------------------------------------------------------------------------
// PipelineConfig: validated, immutable per run
// ----------------------------------------------------------------------------

/// Sampling, resize and inference settings for one run.
///
/// Built through `PipelineConfig::new`, which clamps every field into range; there is
/// no way to hold an out-of-range value. Fields are read-only after construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    resize_factor: f64,
    skip_frames: u32,
    use_gpu: bool,
    confidence_threshold: f32,
    max_consecutive_inference_failures: u32,
}

impl PipelineConfig {
    /// Clamp `resize_factor` to [0.1, 1.0], `skip_frames` to [1, 10] and
    /// `confidence_threshold` to [0, 1]. Non-finite numbers fall back to the
    /// nearest sensible value (1.0 resize, default confidence).
    pub fn new(resize_factor: f64, skip_frames: i64, use_gpu: bool, confidence_threshold: f32) -> Self {
        Self {
            resize_factor: clamp_resize_factor(resize_factor),
            skip_frames: clamp_skip_frames(skip_frames),
            use_gpu,
            confidence_threshold: clamp_confidence(confidence_threshold),
            max_consecutive_inference_failures: DEFAULT_MAX_INFERENCE_FAILURES,
        }
    }

    pub fn with_max_consecutive_inference_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_inference_failures = failures.max(1);
        self
    }

    pub fn resize_factor(&self) -> f64 {
        self.resize_factor
    }

    pub fn skip_frames(&self) -> u32 {
        self.skip_frames
    }

    pub fn use_gpu(&self) -> bool {
        self.use_gpu
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn max_consecutive_inference_failures(&self) -> u32 {
        self.max_consecutive_inference_failures
    }

    pub fn resizes(&self) -> bool {
        self.resize_factor != 1.0
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_RESIZE_FACTOR,
            DEFAULT_SKIP_FRAMES as i64,
            true,
            DEFAULT_CONFIDENCE,
        )
    }
}

fn clamp_resize_factor(value: f64) -> f64 {
    if value.is_nan() {
        log::warn!("resize factor is not a number; using {}", MAX_RESIZE_FACTOR);
        return MAX_RESIZE_FACTOR;
    }
    let clamped = value.clamp(MIN_RESIZE_FACTOR, MAX_RESIZE_FACTOR);
    if clamped != value {
        log::warn!("resize factor {} clamped to {}", value, clamped);
    }
    clamped
}

fn clamp_skip_frames(value: i64) -> u32 {
    let clamped = value.clamp(MIN_SKIP_FRAMES as i64, MAX_SKIP_FRAMES as i64);
    if clamped != value {
        log::warn!("skip frames {} clamped to {}", value, clamped);
    }
    clamped as u32
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        log::warn!("confidence threshold is not a number; using {}", DEFAULT_CONFIDENCE);
        return DEFAULT_CONFIDENCE;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        log::warn!("confidence threshold {} clamped to {}", value, clamped);
    }
    clamped
}

// ----------------------------------------------------------------------------
// AppConfig: file + environment layering for the binary
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    source: Option<String>,
    pipeline: Option<PipelineConfigFile>,
    model: Option<ModelConfigFile>,
    overlay: Option<OverlayConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    resize_factor: Option<f64>,
    skip_frames: Option<i64>,
    use_gpu: Option<bool>,
    confidence_threshold: Option<f32>,
    max_consecutive_inference_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
    vocabulary: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    mode: Option<String>,
    window_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` means the session asks interactively.
    pub source: Option<SourceSpec>,
    pub pipeline: PipelineConfig,
    pub model: ModelSettings,
    pub overlay: OverlaySettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub backend: String,
    pub path: Option<PathBuf>,
    pub input_size: u32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySettings {
    pub font_path: Option<PathBuf>,
    pub vocabulary: Vocabulary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Window,
    Headless,
}

impl DisplayMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "window" => Some(Self::Window),
            "headless" | "none" => Some(Self::Headless),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub mode: DisplayMode,
    /// Derived from the source kind when unset.
    pub window_title: Option<String>,
}

impl AppConfig {
    /// Load from `LIVEDETECT_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVEDETECT_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit TOML file (or defaults), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let source = file.source.as_deref().map(SourceSpec::parse).transpose()?;

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline = PipelineConfig::new(
            pipeline_file.resize_factor.unwrap_or(DEFAULT_RESIZE_FACTOR),
            pipeline_file
                .skip_frames
                .unwrap_or(DEFAULT_SKIP_FRAMES as i64),
            pipeline_file.use_gpu.unwrap_or(true),
            pipeline_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
        )
        .with_max_consecutive_inference_failures(
            pipeline_file
                .max_consecutive_inference_failures
                .unwrap_or(DEFAULT_MAX_INFERENCE_FAILURES),
        );

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string())
                .to_lowercase(),
            path: model_file.path,
            input_size: model_file.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
            iou_threshold: model_file.iou_threshold.unwrap_or(DEFAULT_IOU),
        };
        if model.input_size == 0 {
            return Err(anyhow!("model.input_size must be greater than zero"));
        }

        let overlay_file = file.overlay.unwrap_or_default();
        let vocabulary = match overlay_file.vocabulary.as_deref() {
            Some(raw) => Vocabulary::parse(raw)
                .ok_or_else(|| anyhow!("unknown overlay.vocabulary '{}'", raw))?,
            None => Vocabulary::default(),
        };
        let overlay = OverlaySettings {
            font_path: overlay_file.font_path,
            vocabulary,
        };

        let display_file = file.display.unwrap_or_default();
        let mode = match display_file.mode.as_deref() {
            Some(raw) => DisplayMode::parse(raw)
                .ok_or_else(|| anyhow!("unknown display.mode '{}'", raw))?,
            None => DisplayMode::default(),
        };
        let display = DisplaySettings {
            mode,
            window_title: display_file.window_title,
        };

        Ok(Self {
            source,
            pipeline,
            model,
            overlay,
            display,
        })
    }

    /// Environment overrides. Malformed values are logged and ignored.
    fn apply_env(&mut self) {
        if let Some(raw) = env_value("LIVEDETECT_SOURCE") {
            match SourceSpec::parse(&raw) {
                Ok(source) => self.source = Some(source),
                Err(e) => log::warn!("ignoring LIVEDETECT_SOURCE: {}", e),
            }
        }
        if let Some(path) = env_value("LIVEDETECT_MODEL") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("LIVEDETECT_FONT") {
            self.overlay.font_path = Some(PathBuf::from(path));
        }

        let current = self.pipeline;
        let resize_factor = env_parsed("LIVEDETECT_RESIZE_FACTOR").unwrap_or(current.resize_factor());
        let skip_frames = env_parsed("LIVEDETECT_SKIP_FRAMES").unwrap_or(current.skip_frames() as i64);
        let use_gpu = env_value("LIVEDETECT_USE_GPU")
            .map(|raw| parse_yes(&raw))
            .unwrap_or(current.use_gpu());
        let confidence =
            env_parsed("LIVEDETECT_CONFIDENCE").unwrap_or(current.confidence_threshold());
        self.pipeline = PipelineConfig::new(resize_factor, skip_frames, use_gpu, confidence)
            .with_max_consecutive_inference_failures(current.max_consecutive_inference_failures());
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}: '{}' is not a valid number", key, raw);
            None
        }
    }
}

/// Yes/no answer as accepted by the interactive prompt; blank counts as yes.
pub fn parse_yes(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "" | "s" | "sim" | "y" | "yes" | "true" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_factor_is_clamped() {
        assert_eq!(PipelineConfig::new(1.5, 2, true, 0.5).resize_factor(), 1.0);
        assert_eq!(PipelineConfig::new(0.01, 2, true, 0.5).resize_factor(), 0.1);
        assert_eq!(PipelineConfig::new(f64::NAN, 2, true, 0.5).resize_factor(), 1.0);
        assert_eq!(PipelineConfig::new(0.75, 2, true, 0.5).resize_factor(), 0.75);
    }

    #[test]
    fn skip_frames_is_clamped() {
        assert_eq!(PipelineConfig::new(0.5, 0, true, 0.5).skip_frames(), 1);
        assert_eq!(PipelineConfig::new(0.5, -4, true, 0.5).skip_frames(), 1);
        assert_eq!(PipelineConfig::new(0.5, 11, true, 0.5).skip_frames(), 10);
        assert_eq!(PipelineConfig::new(0.5, 3, true, 0.5).skip_frames(), 3);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(PipelineConfig::new(0.5, 2, true, 1.2).confidence_threshold(), 1.0);
        assert_eq!(PipelineConfig::new(0.5, 2, true, -0.1).confidence_threshold(), 0.0);
        assert_eq!(
            PipelineConfig::new(0.5, 2, true, f32::NAN).confidence_threshold(),
            DEFAULT_CONFIDENCE
        );
    }

    #[test]
    fn inference_failure_budget_is_at_least_one() {
        let cfg = PipelineConfig::default().with_max_consecutive_inference_failures(0);
        assert_eq!(cfg.max_consecutive_inference_failures(), 1);
    }

    #[test]
    fn defaults_match_recommended_settings() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.resize_factor(), 0.5);
        assert_eq!(cfg.skip_frames(), 2);
        assert!(cfg.use_gpu());
        assert!(cfg.resizes());
    }

    #[test]
    fn yes_answers() {
        for answer in ["", "s", "SIM", "y", "Yes"] {
            assert!(parse_yes(answer), "{answer:?}");
        }
        for answer in ["n", "nao", "no", "0"] {
            assert!(!parse_yes(answer), "{answer:?}");
        }
    }

    #[test]
    fn file_sections_parse() -> Result<()> {
        let file: AppConfigFile = toml::from_str(
            r#"
            source = "camera:1"

            [pipeline]
            resize_factor = 2.0
            skip_frames = 0

            [display]
            mode = "headless"
            "#,
        )?;
        let cfg = AppConfig::from_file(file)?;
        assert_eq!(cfg.source, Some(SourceSpec::Camera { index: 1 }));
        assert_eq!(cfg.pipeline.resize_factor(), 1.0);
        assert_eq!(cfg.pipeline.skip_frames(), 1);
        assert_eq!(cfg.display.mode, DisplayMode::Headless);
        assert_eq!(cfg.model.backend, "tract");
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<AppConfigFile, _> = toml::from_str("frame_rate = 3");
        assert!(parsed.is_err());
    }
}
