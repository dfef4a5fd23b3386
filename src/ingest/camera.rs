//! Camera frame source.
//!
//! `CameraSource` captures from a local V4L2 device (`/dev/video<index>`), or from
//! an endless synthetic camera for `stub://` devices. A camera never reports end of
//! stream: every failed capture is returned as an error and the pipeline treats it
//! as fatal.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceCamera;
use super::{parse_stub, synthetic_frame, FrameSource, NextFrame, SourceInfo, SourceKind, SourceStats};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. "/dev/video0") or `stub://name?size=WxH&fail_after=N`.
    pub device: String,
    /// Requested frame rate; the device may ignore it.
    pub target_fps: u32,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
}

impl CameraConfig {
    pub fn for_index(index: u32) -> Self {
        Self {
            device: format!("/dev/video{}", index),
            ..Self::default()
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    config: CameraConfig,
    backend: Option<CameraBackend>,
    stats: SourceStats,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            backend: None,
            stats: SourceStats::default(),
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        format!("camera {}", self.config.device)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn open(&mut self) -> Result<()> {
        let backend = if let Some(params) = parse_stub(&self.config.device) {
            let params = params?;
            let (width, height) = params.size.unwrap_or((self.config.width, self.config.height));
            log::info!(
                "CameraSource: connected to {} (synthetic {}x{})",
                self.config.device,
                width,
                height
            );
            CameraBackend::Synthetic(SyntheticCamera {
                width,
                height,
                fps: self.config.target_fps,
                fail_after: params.fail_after,
                frame_count: 0,
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                CameraBackend::Device(DeviceCamera::open(&self.config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(anyhow!(
                    "camera capture from {} requires the ingest-v4l2 feature",
                    self.config.device
                ));
            }
        };
        self.backend = Some(backend);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<NextFrame> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("camera not opened"))?;
        let frame = match backend {
            CameraBackend::Synthetic(camera) => camera.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame()?,
        };
        self.stats.frames_captured += 1;
        Ok(NextFrame::Frame(frame))
    }

    fn info(&self) -> Option<SourceInfo> {
        match self.backend.as_ref()? {
            CameraBackend::Synthetic(camera) => Some(SourceInfo {
                width: camera.width,
                height: camera.height,
                fps: Some(camera.fps as f64),
            }),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => Some(camera.info()),
        }
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            self.stats.releases += 1;
            log::debug!("CameraSource: released {}", self.config.device);
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    /// Simulate a hardware failure after this many frames.
    fail_after: Option<u64>,
    frame_count: u64,
}

impl SyntheticCamera {
    fn next_frame(&mut self) -> Result<crate::frame::FrameBuffer> {
        if self.fail_after.is_some_and(|limit| self.frame_count >= limit) {
            return Err(anyhow!("synthetic camera stopped delivering frames"));
        }
        self.frame_count += 1;
        Ok(synthetic_frame(self.width, self.height, self.frame_count))
    }
}
