//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file, or synthesizes a finite clip
//! for `stub://` locations. It reports `NextFrame::EndOfStream` exactly once, after
//! the last frame; pulling again after that is an error.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{parse_stub, synthetic_frame, FrameSource, NextFrame, SourceInfo, SourceKind, SourceStats};

const DEFAULT_SYNTHETIC_FRAMES: u64 = 100;
const DEFAULT_SYNTHETIC_SIZE: (u32, u32) = (640, 480);
const SYNTHETIC_FPS: f64 = 30.0;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, or `stub://name?frames=N&size=WxH`.
    pub path: String,
}

impl FileConfig {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    backend: Option<FileBackend>,
    finished: bool,
    stats: SourceStats,
}

enum FileBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Self {
        Self {
            config,
            backend: None,
            finished: false,
            stats: SourceStats::default(),
        }
    }

    fn open_backend(&self) -> Result<FileBackend> {
        if !is_local_file_path(&self.config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if let Some(params) = parse_stub(&self.config.path) {
            let params = params?;
            return Ok(FileBackend::Synthetic(SyntheticClip {
                total_frames: params.frames.unwrap_or(DEFAULT_SYNTHETIC_FRAMES),
                size: params.size.unwrap_or(DEFAULT_SYNTHETIC_SIZE),
                emitted: 0,
            }));
        }
        if !std::path::Path::new(&self.config.path).is_file() {
            return Err(anyhow!("file not found: {}", self.config.path));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(FileBackend::Ffmpeg(FfmpegFileSource::open(&self.config.path)?))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "file ingestion requires the ingest-file-ffmpeg feature"
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.config.path)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn open(&mut self) -> Result<()> {
        let backend = self.open_backend()?;
        self.backend = Some(backend);
        self.finished = false;
        log::info!("FileSource: opened {}", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<NextFrame> {
        if self.finished {
            return Err(anyhow!(
                "{} was read past its end of stream",
                self.config.path
            ));
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("file source not opened"))?;
        let frame = match backend {
            FileBackend::Synthetic(clip) => clip.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame()?,
        };
        match frame {
            Some(frame) => {
                self.stats.frames_captured += 1;
                Ok(NextFrame::Frame(frame))
            }
            None => {
                self.finished = true;
                Ok(NextFrame::EndOfStream)
            }
        }
    }

    fn info(&self) -> Option<SourceInfo> {
        match self.backend.as_ref()? {
            FileBackend::Synthetic(clip) => Some(SourceInfo {
                width: clip.size.0,
                height: clip.size.1,
                fps: Some(SYNTHETIC_FPS),
            }),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => Some(source.info()),
        }
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            self.stats.releases += 1;
            log::debug!("FileSource: released {}", self.config.path);
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticClip {
    total_frames: u64,
    size: (u32, u32),
    emitted: u64,
}

impl SyntheticClip {
    fn next_frame(&mut self) -> Option<crate::frame::FrameBuffer> {
        if self.emitted >= self.total_frames {
            return None;
        }
        self.emitted += 1;
        Some(synthetic_frame(self.size.0, self.size.1, self.emitted))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
