//! Display sinks for annotated frames.
//!
//! A sink presents frames and reports whether the user asked to quit. The
//! OpenCV window (feature: display-opencv) polls the keyboard for about 1 ms per
//! frame and treats `q` as a quit request. `HeadlessDisplay` drops frames and never
//! asks to quit.

use anyhow::Result;

use crate::frame::FrameBuffer;

pub trait DisplaySink {
    fn describe(&self) -> String;

    /// Present one frame.
    fn show(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// Non-blocking check for a quit request.
    fn poll_cancel(&mut self) -> Result<bool>;

    /// Tear down the sink. Safe to call more than once.
    fn close(&mut self);
}

/// Sink that keeps counters only.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames_shown: u64,
    last_dimensions: Option<(u32, u32)>,
    closes: u32,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn last_dimensions(&self) -> Option<(u32, u32)> {
        self.last_dimensions
    }

    pub fn closes(&self) -> u32 {
        self.closes
    }
}

impl DisplaySink for HeadlessDisplay {
    fn describe(&self) -> String {
        "headless".to_string()
    }

    fn show(&mut self, frame: &FrameBuffer) -> Result<()> {
        self.frames_shown += 1;
        self.last_dimensions = Some(frame.dimensions());
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

#[cfg(feature = "display-opencv")]
pub use window::OpenCvWindow;

#[cfg(feature = "display-opencv")]
mod window {
    use anyhow::{Context, Result};
    use opencv::core::{Mat, MatTraitConst};
    use opencv::highgui;

    use super::DisplaySink;
    use crate::frame::FrameBuffer;

    const QUIT_KEY: i32 = 'q' as i32;
    const POLL_MS: i32 = 1;

    /// HighGUI window.
    pub struct OpenCvWindow {
        title: String,
        open: bool,
    }

    impl OpenCvWindow {
        pub fn new(title: impl Into<String>) -> Self {
            Self {
                title: title.into(),
                open: false,
            }
        }
    }

    impl DisplaySink for OpenCvWindow {
        fn describe(&self) -> String {
            format!("window '{}'", self.title)
        }

        fn show(&mut self, frame: &FrameBuffer) -> Result<()> {
            if !self.open {
                highgui::named_window(&self.title, highgui::WINDOW_AUTOSIZE)
                    .context("create display window")?;
                self.open = true;
            }
            let mut bgr = frame.as_raw().to_vec();
            for pixel in bgr.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
            let mat: Mat = Mat::from_slice(&bgr)
                .context("wrap frame pixels")?
                .reshape(3, frame.height() as i32)
                .context("reshape frame to BGR image")?
                .try_clone()
                .context("copy frame into window buffer")?;
            highgui::imshow(&self.title, &mat).context("show frame")?;
            Ok(())
        }

        fn poll_cancel(&mut self) -> Result<bool> {
            if !self.open {
                return Ok(false);
            }
            let key = highgui::wait_key(POLL_MS).context("poll keyboard")?;
            Ok(key >= 0 && (key & 0xFF) == QUIT_KEY)
        }

        fn close(&mut self) {
            if !self.open {
                return;
            }
            self.open = false;
            if let Err(err) = highgui::destroy_window(&self.title) {
                log::warn!("OpenCvWindow: failed to close '{}': {}", self.title, err);
            }
        }
    }

    impl Drop for OpenCvWindow {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_counts_frames_and_never_cancels() -> Result<()> {
        let mut sink = HeadlessDisplay::new();
        sink.show(&FrameBuffer::filled(4, 3, [1, 2, 3]))?;
        sink.show(&FrameBuffer::filled(8, 6, [1, 2, 3]))?;
        assert!(!sink.poll_cancel()?);
        sink.close();
        assert_eq!(sink.frames_shown(), 2);
        assert_eq!(sink.last_dimensions(), Some((8, 6)));
        assert_eq!(sink.closes(), 1);
        Ok(())
    }
}
