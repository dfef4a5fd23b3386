//! Detection overlay rendering.
//!
//! Draws each detection as a thick box with a filled caption tab above its top-left
//! corner, and optionally the processing-rate readout in the top-left corner of the
//! frame. All drawing clips at the frame edges, so boxes touching the top of the
//! frame are safe. Rendering is deterministic for a given font and input.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::FrameBuffer;

/// Fonts tried when none is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Visual constants of the overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub box_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub rate_color: Rgb<u8>,
    /// Box outline width in pixels, centred on the box edge.
    pub thickness: i32,
    pub label_scale: f32,
    pub rate_scale: f32,
    /// Space between the caption baseline and the box top.
    pub label_baseline_gap: i32,
    /// Extra height of the caption tab beyond the text height.
    pub label_padding: i32,
    /// Baseline origin of the rate readout.
    pub rate_origin: (i32, i32),
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 0, 255]),
            text_color: Rgb([255, 255, 255]),
            rate_color: Rgb([0, 255, 0]),
            thickness: 3,
            label_scale: 24.0,
            rate_scale: 32.0,
            label_baseline_gap: 5,
            label_padding: 10,
            rate_origin: (10, 30),
        }
    }
}

pub struct OverlayRenderer {
    font: Option<FontVec>,
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>, style: OverlayStyle) -> Self {
        Self { font, style }
    }

    /// Renderer that draws boxes and caption tabs but no glyphs.
    pub fn without_font() -> Self {
        Self::new(None, OverlayStyle::default())
    }

    /// Use the font at `path`, or the first system font found when `path` is `None`.
    ///
    /// A missing configured font is an error; finding no system font only degrades
    /// the overlay to boxes without text.
    pub fn from_font_path(path: Option<&Path>) -> Result<Self> {
        let font = match path {
            Some(path) => Some(load_font(path)?),
            None => find_system_font(),
        };
        if font.is_none() {
            log::warn!("OverlayRenderer: no font found, captions will have no text");
        }
        Ok(Self::new(font, OverlayStyle::default()))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Draw `detections` onto `frame` in place and hand the same buffer back.
    pub fn render(&self, mut frame: FrameBuffer, detections: &[Detection]) -> FrameBuffer {
        let image = frame.image_mut();
        for detection in detections {
            self.draw_box(image, detection);
            self.draw_caption(image, detection);
        }
        frame
    }

    /// Draw the processing-rate readout, e.g. `FPS: 12.5`.
    pub fn draw_rate(&self, frame: &mut FrameBuffer, rate: f64) {
        let text = format!("FPS: {:.1}", rate);
        let (x, baseline) = self.style.rate_origin;
        let (_, text_height) = self.measure(&text, self.style.rate_scale);
        self.draw_glyphs(
            frame.image_mut(),
            &text,
            self.style.rate_scale,
            self.style.rate_color,
            x,
            baseline - text_height,
        );
    }

    fn draw_box(&self, image: &mut RgbImage, detection: &Detection) {
        let bbox = detection.bbox;
        let half = self.style.thickness / 2;
        for offset in -half..=(self.style.thickness - 1 - half) {
            // Corner points are inclusive, so the outline spans w + 1 pixels.
            let (offset, grow) = (i64::from(offset), 1 - 2 * i64::from(offset));
            if let Some(rect) = clipped_rect(
                image,
                i64::from(bbox.x) + offset,
                i64::from(bbox.y) + offset,
                i64::from(bbox.w) + grow,
                i64::from(bbox.h) + grow,
            ) {
                draw_hollow_rect_mut(image, rect, self.style.box_color);
            }
        }
    }

    fn draw_caption(&self, image: &mut RgbImage, detection: &Detection) {
        let text = detection.caption();
        let (text_width, text_height) = self.measure(&text, self.style.label_scale);
        let (x, y) = (detection.bbox.x, detection.bbox.y);
        let top = y.saturating_sub(text_height).saturating_sub(self.style.label_padding);
        if let Some(tab) = clipped_rect(
            image,
            i64::from(x),
            i64::from(top),
            i64::from(text_width) + 1,
            i64::from(y) - i64::from(top) + 1,
        ) {
            draw_filled_rect_mut(image, tab, self.style.box_color);
        }
        self.draw_glyphs(
            image,
            &text,
            self.style.label_scale,
            self.style.text_color,
            x,
            y.saturating_sub(self.style.label_baseline_gap)
                .saturating_sub(text_height),
        );
    }

    fn measure(&self, text: &str, scale: f32) -> (i32, i32) {
        match &self.font {
            Some(font) => {
                let (w, h) = text_size(PxScale::from(scale), font, text);
                (w as i32, h as i32)
            }
            None => {
                let chars = text.chars().count() as f32;
                ((chars * scale * 0.5) as i32, (scale * 0.7) as i32)
            }
        }
    }

    fn draw_glyphs(&self, image: &mut RgbImage, text: &str, scale: f32, color: Rgb<u8>, x: i32, y: i32) {
        if let Some(font) = &self.font {
            let (w, h) = self.measure(text, scale);
            let visible = i64::from(x) < i64::from(image.width())
                && i64::from(y) < i64::from(image.height())
                && i64::from(x) + i64::from(w) >= 0
                && i64::from(y) + i64::from(h) >= 0;
            if visible {
                draw_text_mut(image, color, x, y, PxScale::from(scale), font, text);
            }
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(find_system_font(), OverlayStyle::default())
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|_| anyhow!("invalid font file {}", path.display()))
}

fn find_system_font() -> Option<FontVec> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .filter(|path| path.is_file())
        .find_map(|path| match load_font(&path) {
            Ok(font) => {
                log::debug!("OverlayRenderer: using font {}", path.display());
                Some(font)
            }
            Err(err) => {
                log::debug!("OverlayRenderer: skipping font: {:#}", err);
                None
            }
        })
}

/// Rectangle `w` x `h` at (`x`, `y`), with its edges pulled in to one pixel
/// outside `image`. Edges beyond the image stay invisible; edges inside it are
/// unchanged.
fn clipped_rect(image: &RgbImage, x: i64, y: i64, w: i64, h: i64) -> Option<Rect> {
    if w <= 0 || h <= 0 {
        return None;
    }
    let (max_x, max_y) = (i64::from(image.width()), i64::from(image.height()));
    let left = x.clamp(-1, max_x);
    let top = y.clamp(-1, max_y);
    let right = x.saturating_add(w - 1).clamp(-1, max_x);
    let bottom = y.saturating_add(h - 1).clamp(-1, max_y);
    if right < left || bottom < top {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    const BLUE: [u8; 3] = [0, 0, 255];

    fn detection(x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection {
            label: "pessoa".to_string(),
            original_label: "person".to_string(),
            confidence: 0.87,
            bbox: BoundingBox { x, y, w, h },
        }
    }

    fn black(width: u32, height: u32) -> FrameBuffer {
        FrameBuffer::filled(width, height, [0, 0, 0])
    }

    #[test]
    fn draws_box_outline_and_caption_tab() {
        let renderer = OverlayRenderer::without_font();
        let frame = renderer.render(black(200, 200), &[detection(50, 80, 60, 40)]);
        assert_eq!(frame.dimensions(), (200, 200));
        assert_eq!(frame.pixel(50, 80), Some(BLUE));
        assert_eq!(frame.pixel(110, 120), Some(BLUE));
        assert_eq!(frame.pixel(49, 100), Some(BLUE));
        assert_eq!(frame.pixel(51, 100), Some(BLUE));
        // Inside of the box is untouched.
        assert_eq!(frame.pixel(80, 100), Some([0, 0, 0]));
        // Caption tab sits above the box.
        assert_eq!(frame.pixel(55, 75), Some(BLUE));
    }

    #[test]
    fn box_at_top_edge_is_clipped() {
        let renderer = OverlayRenderer::without_font();
        let frame = renderer.render(black(64, 64), &[detection(0, 0, 30, 20)]);
        assert_eq!(frame.pixel(0, 0), Some(BLUE));
        assert_eq!(frame.pixel(15, 10), Some([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_frame_do_not_panic() {
        let renderer = OverlayRenderer::without_font();
        let frame = renderer.render(
            black(32, 32),
            &[detection(-10, -10, 100, 100), detection(40, 40, 5, 5), detection(5, 5, 1, 1)],
        );
        assert_eq!(frame.dimensions(), (32, 32));
    }

    #[test]
    fn huge_boxes_are_clipped_to_the_frame() {
        let renderer = OverlayRenderer::default();
        let frame = renderer.render(
            black(32, 24),
            &[
                detection(-5, -3, i32::MAX, 43),
                detection(i32::MAX - 2, i32::MAX - 2, i32::MAX, i32::MAX),
                detection(i32::MIN, i32::MIN, 10, 10),
            ],
        );
        assert_eq!(frame.dimensions(), (32, 24));
        // Every edge of these boxes lies outside the frame.
        assert!(frame.as_raw().iter().all(|v| *v == 0));
    }

    #[test]
    fn no_detections_leaves_frame_unchanged() {
        let renderer = OverlayRenderer::without_font();
        let frame = renderer.render(black(16, 16), &[]);
        assert!(frame.as_raw().iter().all(|v| *v == 0));
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = OverlayRenderer::default();
        let detections = [detection(10, 30, 20, 20), detection(25, 35, 30, 10)];
        let a = renderer.render(black(80, 80), &detections);
        let b = renderer.render(black(80, 80), &detections);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn missing_configured_font_is_an_error() {
        assert!(OverlayRenderer::from_font_path(Some(Path::new("/nonexistent/font.ttf"))).is_err());
    }

    #[test]
    fn rate_readout_without_font_is_a_no_op() {
        let renderer = OverlayRenderer::without_font();
        let mut frame = black(100, 50);
        renderer.draw_rate(&mut frame, 12.34);
        assert!(frame.as_raw().iter().all(|v| *v == 0));
    }
}
