//! Scroll positioning for the highlighted chunk.

use super::content::Viewport;

/// Where the highlighted chunk should sit in the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPolicy {
    /// Fraction of the visible height kept above the target
    pub buffer_ratio: f64,
    /// Skip scrolling when already within this distance of the target
    pub tolerance: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            buffer_ratio: 0.3,
            tolerance: 8.0,
        }
    }
}

impl ScrollPolicy {
    pub fn new(buffer_ratio: f64, tolerance: f64) -> Self {
        Self {
            buffer_ratio: buffer_ratio.clamp(0.0, 1.0),
            tolerance: tolerance.max(0.0),
        }
    }

    /// Scroll offset that puts `target_offset` at the buffer line.
    pub fn desired_top(&self, target_offset: f64, viewport: &Viewport) -> f64 {
        let buffer = viewport.visible_height() * self.buffer_ratio;
        (target_offset - buffer).max(0.0)
    }

    /// The scroll offset to apply, or `None` when the target is already in place.
    pub fn scroll_target(&self, target_offset: f64, viewport: &Viewport) -> Option<f64> {
        let desired = self.desired_top(target_offset, viewport);
        if (viewport.scroll_top - desired).abs() <= self.tolerance {
            None
        } else {
            Some(desired)
        }
    }
}
