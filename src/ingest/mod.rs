//! Frame ingestion sources.
//!
//! Two kinds of source sit behind the `FrameSource` trait:
//! - Cameras (V4L2 devices, feature: ingest-v4l2). A camera never ends on its own;
//!   a failed read is an error.
//! - Local video files (feature: ingest-file-ffmpeg). A file reports
//!   `NextFrame::EndOfStream` once, after its last frame.
//!
//! Both accept `stub://` locations that synthesize frames in memory so the pipeline
//! can run without devices or codecs.
//!
//! Sources are constructed cheaply; nothing is touched until `open`. `release` is
//! idempotent and must be safe to call on a source that never opened.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::FrameBuffer;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};

/// Which kind of input a source reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    File,
}

/// User-facing source selection: `camera:<index>` or a file path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    Camera { index: u32 },
    File { path: String },
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if let Some(index) = raw.strip_prefix("camera:") {
            let index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("camera index must be a non-negative integer, got '{}'", index))?;
            return Ok(Self::Camera { index });
        }
        if raw == "camera" {
            return Ok(Self::Camera { index: 0 });
        }
        Ok(Self::File {
            path: raw.to_string(),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Camera { .. } => SourceKind::Camera,
            Self::File { .. } => SourceKind::File,
        }
    }

    /// Construct (but do not open) the source this spec names.
    pub fn build(&self) -> Box<dyn FrameSource> {
        match self {
            Self::Camera { index } => Box::new(CameraSource::new(CameraConfig::for_index(*index))),
            Self::File { path } => Box::new(FileSource::new(FileConfig::for_path(path))),
        }
    }
}

/// Result of pulling one frame.
#[derive(Debug)]
pub enum NextFrame {
    Frame(FrameBuffer),
    /// The source has no more frames. Only file sources produce this.
    EndOfStream,
}

/// Stream properties known after `open`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate, when the container or device reports one.
    pub fps: Option<f64>,
}

/// Counters kept by every source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub releases: u32,
}

/// A producer of frames, pulled one at a time by the pipeline.
pub trait FrameSource {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    fn kind(&self) -> SourceKind;

    /// Acquire the underlying device or file. Failure is fatal for the run.
    fn open(&mut self) -> Result<()>;

    /// Pull the next frame.
    ///
    /// `Ok(NextFrame::EndOfStream)` is the graceful end of a file. Errors are read
    /// failures.
    fn next_frame(&mut self) -> Result<NextFrame>;

    fn info(&self) -> Option<SourceInfo> {
        None
    }

    /// Release OS handles. Safe to call more than once.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

/// Parameters of a `stub://name?frames=N&size=WxH&fail_after=N` location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StubParams {
    pub frames: Option<u64>,
    pub size: Option<(u32, u32)>,
    pub fail_after: Option<u64>,
}

pub(crate) fn parse_stub(location: &str) -> Option<Result<StubParams>> {
    let rest = location.strip_prefix("stub://")?;
    let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut params = StubParams {
        frames: None,
        size: None,
        fail_after: None,
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some(kv) => kv,
            None => return Some(Err(anyhow!("malformed stub parameter '{}'", pair))),
        };
        let parsed = match key {
            "frames" => value.parse().map(|v| params.frames = Some(v)).is_ok(),
            "fail_after" => value.parse().map(|v| params.fail_after = Some(v)).is_ok(),
            "size" => match value.split_once('x') {
                Some((w, h)) => match (w.parse(), h.parse()) {
                    (Ok(w), Ok(h)) if w > 0 && h > 0 => {
                        params.size = Some((w, h));
                        true
                    }
                    _ => false,
                },
                None => false,
            },
            _ => return Some(Err(anyhow!("unknown stub parameter '{}'", key))),
        };
        if !parsed {
            return Some(Err(anyhow!("invalid value for stub parameter '{}': '{}'", key, value)));
        }
    }
    Some(Ok(params))
}

/// Deterministic synthetic frame: a dark gradient that shifts with the frame index.
pub(crate) fn synthetic_frame(width: u32, height: u32, index: u64) -> FrameBuffer {
    let mut pixels = vec![0u8; (width as usize) * (height as usize) * 3];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((i as u64 / 3 + index) % 96) as u8;
    }
    FrameBuffer::from_image(
        image::RgbImage::from_raw(width, height, pixels)
            .unwrap_or_else(|| image::RgbImage::new(width, height)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camera_and_file_specs() -> Result<()> {
        assert_eq!(SourceSpec::parse("camera:2")?, SourceSpec::Camera { index: 2 });
        assert_eq!(SourceSpec::parse("camera")?, SourceSpec::Camera { index: 0 });
        assert_eq!(
            SourceSpec::parse("/videos/street.mp4")?,
            SourceSpec::File {
                path: "/videos/street.mp4".to_string()
            }
        );
        assert!(SourceSpec::parse("camera:front").is_err());
        assert!(SourceSpec::parse("  ").is_err());
        Ok(())
    }

    #[test]
    fn stub_parameters_parse() -> Result<()> {
        let params = parse_stub("stub://clip?frames=20&size=64x48&fail_after=3")
            .expect("stub location")?;
        assert_eq!(params.frames, Some(20));
        assert_eq!(params.size, Some((64, 48)));
        assert_eq!(params.fail_after, Some(3));
        assert!(parse_stub("/tmp/clip.mp4").is_none());
        assert!(parse_stub("stub://clip?size=0x4").expect("stub").is_err());
        assert!(parse_stub("stub://clip?speed=2").expect("stub").is_err());
        Ok(())
    }

    #[test]
    fn synthetic_frames_differ_by_index() {
        let a = synthetic_frame(8, 8, 1);
        let b = synthetic_frame(8, 8, 2);
        assert_eq!(a.dimensions(), (8, 8));
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
