//! V4L2 device capture.
//!
//! Requests RGB24 at the configured size and rate, accepts whatever the driver
//! settles on, and converts RGB24, NV12 or YUYV buffers to packed RGB.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::camera::CameraConfig;
use super::normalize::{to_frame, PixelFormat};
use super::SourceInfo;
use crate::frame::FrameBuffer;

pub(crate) struct DeviceCamera {
    device_path: String,
    state: DeviceState,
    format: PixelFormat,
    width: u32,
    height: u32,
    fps: Option<f64>,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCamera {
    pub(crate) fn open(config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "unsupported v4l2 pixel format {} on {}",
                String::from_utf8_lossy(&format.fourcc.repr),
                config.device
            )
        })?;

        let mut fps = None;
        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            match device.set_params(&params) {
                Ok(applied) => {
                    let interval = applied.interval;
                    if interval.numerator > 0 {
                        fps = Some(interval.denominator as f64 / interval.numerator as f64);
                    }
                }
                Err(err) => log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    config.device,
                    err
                ),
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            config.device,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            device_path: config.device.clone(),
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
            fps,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<FrameBuffer> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let device_path = &self.device_path;
        self.state.with_mut(|fields| {
            let (buf, meta) = fields
                .stream
                .next()
                .with_context(|| format!("capture v4l2 frame from {}", device_path))?;
            let used = match meta.bytesused as usize {
                0 => buf.len(),
                used => used.min(buf.len()),
            };
            to_frame(&buf[..used], width, height, format)
        })
    }

    pub(crate) fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}
