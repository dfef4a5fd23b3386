/// Axis-aligned box in pixels of the frame it was computed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    /// Always > 0.
    pub w: i32,
    /// Always > 0.
    pub h: i32,
}

impl BoundingBox {
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }
}

/// One normalized recognition result. Built per inference call and dropped after
/// the frame is rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Display label (translated).
    pub label: String,
    /// Canonical class name reported by the model.
    pub original_label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Overlay caption, e.g. `pessoa: 0.87`.
    pub fn caption(&self) -> String {
        format!("{}: {:.2}", self.label, self.confidence)
    }
}
