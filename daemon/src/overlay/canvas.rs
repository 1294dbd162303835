//! Drawing surface abstraction shared by the popup painters.
//!
//! All coordinates are logical (96-DPI) units.  The Win32 canvas maps them to device
//! pixels through the render target's DPI; [`SceneCanvas`] records them as-is.

use super::color::Color;

/// Logical size of a popup, in 96-DPI units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Font request.  `size` is in points, as in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f32,
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self { family: family.into(), size }
    }

    /// Em height in logical pixels.
    pub fn pixel_size(&self) -> f32 {
        self.size * 96.0 / 72.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

pub trait TextMeasure {
    fn measure_text(&self, text: &str, font: &Font) -> TextSize;
}

pub trait Canvas: TextMeasure {
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Outlines `rect` with a pen of `width` centred on its edges.
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32);

    /// Draws a single line of text with its top-left corner at (`x`, `y`).
    fn draw_text(&mut self, text: &str, font: &Font, x: f32, y: f32, color: Color);

    /// Restricts subsequent drawing to `rect`; `None` lifts the restriction.
    fn set_clip(&mut self, rect: Option<Rect>);
}

/// Approximate metrics for a proportional UI font, used where no text engine is
/// available.  Each character advances by 0.55 em and a line is 1.33 em tall.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics;

impl TextMeasure for FixedMetrics {
    fn measure_text(&self, text: &str, font: &Font) -> TextSize {
        let em = font.pixel_size();
        TextSize {
            width: text.chars().count() as f32 * em * 0.55,
            height: (em * 1.33).ceil(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill { rect: Rect, color: Color },
    Stroke { rect: Rect, color: Color, width: f32 },
    Text { text: String, x: f32, y: f32, color: Color },
    Clip(Option<Rect>),
}

/// Canvas that records its operations instead of rasterising them.
#[derive(Debug, Default)]
pub struct SceneCanvas {
    ops: Vec<DrawOp>,
    clip: Option<Rect>,
}

impl SceneCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }

    /// Fill operations in paint order.
    #[cfg(test)]
    pub fn fills(&self) -> impl Iterator<Item = (Rect, Color)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Fill { rect, color } => Some((*rect, *color)),
            _ => None,
        })
    }

    /// Text operations in paint order, as `(text, x, y)`.
    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = (&str, f32, f32)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, x, y, .. } => Some((text.as_str(), *x, *y)),
            _ => None,
        })
    }

    fn visible(&self, rect: &Rect) -> bool {
        match self.clip {
            Some(clip) => {
                rect.x < clip.right()
                    && rect.right() > clip.x
                    && rect.y < clip.bottom()
                    && rect.bottom() > clip.y
            }
            None => true,
        }
    }
}

impl TextMeasure for SceneCanvas {
    fn measure_text(&self, text: &str, font: &Font) -> TextSize {
        FixedMetrics.measure_text(text, font)
    }
}

impl Canvas for SceneCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if self.visible(&rect) {
            self.ops.push(DrawOp::Fill { rect, color });
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        self.ops.push(DrawOp::Stroke { rect, color, width });
    }

    fn draw_text(&mut self, text: &str, font: &Font, x: f32, y: f32, color: Color) {
        let size = self.measure_text(text, font);
        if self.visible(&Rect::new(x, y, size.width, size.height)) {
            self.ops.push(DrawOp::Text { text: text.to_string(), x, y, color });
        }
    }

    fn set_clip(&mut self, rect: Option<Rect>) {
        self.clip = rect;
        self.ops.push(DrawOp::Clip(rect));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_metrics_scale_with_length_and_size() {
        let font = Font::new("Segoe UI", 12.0);
        let one = FixedMetrics.measure_text("A", &font);
        let three = FixedMetrics.measure_text("ABC", &font);
        assert!((three.width - one.width * 3.0).abs() < 1e-3);
        assert_eq!(one.height, three.height);

        let bigger = FixedMetrics.measure_text("A", &Font::new("Segoe UI", 24.0));
        assert!(bigger.height > one.height);
    }

    #[test]
    fn scene_drops_ops_outside_the_clip() {
        let mut canvas = SceneCanvas::new();
        canvas.set_clip(Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        canvas.fill_rect(Rect::new(2.0, 2.0, 4.0, 4.0), Color::WHITE);
        canvas.fill_rect(Rect::new(-20.0, 2.0, 5.0, 4.0), Color::WHITE);
        canvas.set_clip(None);
        canvas.fill_rect(Rect::new(-20.0, 2.0, 5.0, 4.0), Color::BLACK);

        let fills: Vec<_> = canvas.fills().collect();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].1, Color::BLACK);
    }
}
