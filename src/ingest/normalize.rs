//! Conversion of raw capture buffers to packed RGB frames.

use anyhow::{anyhow, Result};

use crate::frame::FrameBuffer;

/// Pixel layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    /// Packed 8-bit RGB.
    Rgb24,
    /// Full-resolution luma plane followed by interleaved half-resolution chroma.
    Nv12,
    /// Packed 4:2:2, two pixels per `Y0 U Y1 V` quad. Most USB webcams default to it.
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"NV12" => Some(Self::Nv12),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }

    /// Chroma subsampling needs even widths for both YUV layouts and even heights for NV12.
    fn supports(self, width: u32, height: u32) -> bool {
        match self {
            Self::Rgb24 => true,
            Self::Nv12 => width % 2 == 0 && height % 2 == 0,
            Self::Yuyv => width % 2 == 0,
        }
    }

    fn expected_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            Self::Rgb24 => pixels.checked_mul(3),
            Self::Nv12 => pixels.checked_add(pixels / 2),
            Self::Yuyv => pixels.checked_mul(2),
        }
    }
}

/// Convert one captured buffer into a frame of `width` x `height`.
///
/// Trailing bytes past the expected length are ignored; drivers commonly pad.
pub(crate) fn to_frame(raw: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<FrameBuffer> {
    if !format.supports(width, height) {
        return Err(anyhow!(
            "{:?} frames must have even dimensions, got {}x{}",
            format,
            width,
            height
        ));
    }
    let expected = format
        .expected_len(width, height)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    let raw = raw.get(..expected).ok_or_else(|| {
        anyhow!(
            "{:?} frame too short: expected {} bytes, got {}",
            format,
            expected,
            raw.len()
        )
    })?;
    let rgb = match format {
        PixelFormat::Rgb24 => raw.to_vec(),
        PixelFormat::Nv12 => nv12_to_rgb(raw, width as usize, height as usize),
        PixelFormat::Yuyv => yuyv_to_rgb(raw, width as usize, height as usize),
    };
    FrameBuffer::from_rgb(width, height, rgb)
}

fn nv12_to_rgb(raw: &[u8], w: usize, h: usize) -> Vec<u8> {
    let y_plane = w * h;
    let mut rgb = Vec::with_capacity(y_plane * 3);
    for row in 0..h {
        for col in 0..w {
            let uv = y_plane + (row / 2) * w + (col / 2) * 2;
            rgb.extend_from_slice(&yuv_to_rgb(raw[row * w + col], raw[uv], raw[uv + 1]));
        }
    }
    rgb
}

fn yuyv_to_rgb(raw: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in raw.chunks_exact(w * 2) {
        for (col, pair) in row.chunks_exact(2).enumerate() {
            // Chroma is shared by each horizontal pixel pair.
            let quad = (col / 2) * 4;
            let (u, v) = (row[quad + 1], row[quad + 3]);
            rgb.extend_from_slice(&yuv_to_rgb(pair[0], u, v));
        }
    }
    rgb
}

/// BT.601 full-range conversion.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        clamp_to_u8(y + 1.402 * v),
        clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v),
        clamp_to_u8(y + 1.772 * u),
    ]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_gives_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let frame = to_frame(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(frame.as_raw(), &vec![128u8; 12][..]);

        let yuyv = vec![90u8, 128, 90, 128];
        let frame = to_frame(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert_eq!(frame.pixel(1, 0), Some([90, 90, 90]));
        Ok(())
    }

    #[test]
    fn padded_buffers_are_accepted() -> Result<()> {
        let mut raw = vec![7u8; 9];
        raw.extend_from_slice(&[0, 0, 0, 0]);
        let frame = to_frame(&raw, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(frame.dimensions(), (1, 3));
        assert_eq!(frame.pixel(0, 2), Some([7, 7, 7]));
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(to_frame(&[0u8; 5], 2, 2, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn odd_dimensions_are_rejected_for_subsampled_formats() {
        assert!(to_frame(&[128u8; 64], 3, 2, PixelFormat::Yuyv).is_err());
        assert!(to_frame(&[128u8; 64], 3, 2, PixelFormat::Nv12).is_err());
        assert!(to_frame(&[128u8; 64], 2, 3, PixelFormat::Nv12).is_err());
        assert!(to_frame(&[128u8; 64], 2, 3, PixelFormat::Yuyv).is_ok());
        assert!(to_frame(&[128u8; 64], 3, 3, PixelFormat::Rgb24).is_ok());
    }

    #[test]
    fn fourcc_mapping() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}
