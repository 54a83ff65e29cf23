/// A normalized rectangle with its origin at the bottom-left corner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bound2 {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bound2 {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Converts to a pixel scissor rect (top-left origin) inside a `width`×`height` target.
    pub fn to_scissor(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (fw, fh) = (width as f32, height as f32);
        let x = (self.x * fw).clamp(0.0, fw) as u32;
        let w = ((self.w * fw) as u32).min(width - x);
        let top = ((1.0 - self.y - self.h) * fh).clamp(0.0, fh) as u32;
        let h = ((self.h * fh) as u32).min(height - top);
        (x, top, w, h)
    }
}

impl Default for Bound2 {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// A pixel rectangle inside a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Size of a pass target for this viewport: the extent left after the
    /// origin offset, at least one pixel per axis.
    pub fn target_size(&self) -> (u32, u32) {
        (
            self.width.saturating_sub(self.x).max(1),
            self.height.saturating_sub(self.y).max(1),
        )
    }
}
