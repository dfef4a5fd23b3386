//! Frame buffers flowing through the pipeline.
//!
//! - `FrameBuffer`: owned RGB pixel grid for one iteration. Sources produce it, the
//!   pipeline resizes it, the overlay renderer mutates it in place, and the display
//!   sink borrows it. It is dropped at the end of the iteration.
//!
//! Coordinates of any detection computed on a frame are in that frame's pixel space.
//! After `resized`, that is the reduced resolution, not the source resolution.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Smallest edge a resized frame may have.
const MIN_EDGE: u32 = 1;

/// Mutable RGB frame. Not `Clone`: a frame has exactly one owner per iteration.
#[derive(Debug)]
pub struct FrameBuffer {
    image: RgbImage,
}

impl FrameBuffer {
    /// Wrap packed RGB24 bytes (row-major, no padding).
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer rejected for {}x{}", width, height))?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Solid-colour frame, mostly for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width.max(MIN_EDGE), height.max(MIN_EDGE), Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB24 bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x < self.width() && y < self.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    /// Resize by `factor` on both axes with truncating dimension math.
    ///
    /// A factor of exactly 1.0 returns the frame untouched.
    pub fn resized(self, factor: f64) -> Self {
        if factor == 1.0 {
            return self;
        }
        let (width, height) = scaled_dimensions(self.width(), self.height(), factor);
        if (width, height) == self.dimensions() {
            return self;
        }
        Self {
            image: imageops::resize(&self.image, width, height, FilterType::Triangle),
        }
    }
}

/// `(floor(width * factor), floor(height * factor))`, never below 1x1.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |edge: u32| ((edge as f64 * factor) as u32).max(MIN_EDGE);
    (scale(width), scale(height))
}
