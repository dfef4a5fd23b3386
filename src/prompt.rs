//! Interactive session setup.
//!
//! Asks for the input mode and, for video files, the throughput settings. Webcam
//! sessions process every frame at full resolution. Invalid numbers abandon the
//! remaining questions and fall back to the recommended file settings.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::config::{parse_yes, PipelineConfig, DEFAULT_RESIZE_FACTOR, DEFAULT_SKIP_FRAMES};
use crate::ingest::SourceSpec;

/// Outcome of the interactive prompt.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionChoice {
    Run {
        source: SourceSpec,
        pipeline: PipelineConfig,
    },
    /// Nothing to run; the message says why.
    Abort(String),
}

/// Run the prompt. `base` supplies the settings the prompt does not ask about
/// (confidence threshold, failure budget, and the GPU preference for webcams).
pub fn prompt_session<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    base: &PipelineConfig,
) -> io::Result<SessionChoice> {
    writeln!(output, "Choose the input mode:")?;
    writeln!(output, "1. Webcam")?;
    writeln!(output, "2. Video file")?;
    let choice = ask(input, output, "Enter your choice (1 or 2): ")?;

    match choice.as_str() {
        "1" => Ok(SessionChoice::Run {
            source: SourceSpec::Camera { index: 0 },
            pipeline: with_base(1.0, 1, base.use_gpu(), base),
        }),
        "2" => prompt_file(input, output, base),
        _ => Ok(SessionChoice::Abort("invalid choice".to_string())),
    }
}

fn prompt_file<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    base: &PipelineConfig,
) -> io::Result<SessionChoice> {
    let path = ask(input, output, "Enter the full path to the video file: ")?;
    if path.is_empty() || !Path::new(&path).exists() {
        return Ok(SessionChoice::Abort(format!("file not found: {}", path)));
    }
    let source = SourceSpec::File { path };

    writeln!(output)?;
    writeln!(output, "Real-time processing settings:")?;
    writeln!(
        output,
        "Recommended values: resize_factor={}, skip_frames={}",
        DEFAULT_RESIZE_FACTOR, DEFAULT_SKIP_FRAMES
    )?;

    let pipeline = match ask_settings(input, output)? {
        Some((resize_factor, skip_frames, use_gpu)) => {
            with_base(resize_factor, skip_frames, use_gpu, base)
        }
        None => {
            writeln!(output, "Invalid values. Using default settings.")?;
            with_base(DEFAULT_RESIZE_FACTOR, DEFAULT_SKIP_FRAMES as i64, true, base)
        }
    };
    Ok(SessionChoice::Run { source, pipeline })
}

/// `None` as soon as a number fails to parse.
fn ask_settings<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<(f64, i64, bool)>> {
    let raw = ask(input, output, "Resize factor (0.1-1.0, smaller = faster): ")?;
    let resize_factor = match parse_or(&raw, DEFAULT_RESIZE_FACTOR) {
        Some(value) => value,
        None => return Ok(None),
    };
    let raw = ask(input, output, "Skip frames (1-10, larger = faster): ")?;
    let skip_frames = match parse_or(&raw, DEFAULT_SKIP_FRAMES as i64) {
        Some(value) => value,
        None => return Ok(None),
    };
    let use_gpu = parse_yes(&ask(input, output, "Use GPU if available? (y/n): ")?);
    Ok(Some((resize_factor, skip_frames, use_gpu)))
}

fn with_base(resize_factor: f64, skip_frames: i64, use_gpu: bool, base: &PipelineConfig) -> PipelineConfig {
    PipelineConfig::new(resize_factor, skip_frames, use_gpu, base.confidence_threshold())
        .with_max_consecutive_inference_failures(base.max_consecutive_inference_failures())
}

fn parse_or<T: std::str::FromStr>(raw: &str, default: T) -> Option<T> {
    if raw.is_empty() {
        Some(default)
    } else {
        raw.parse().ok()
    }
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
