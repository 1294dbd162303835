//! Popup painters.  Each variant measures its content first, then paints into a
//! canvas of exactly that logical size.

use super::canvas::{Canvas, Font, Rect, Size, TextMeasure};
use super::color::Color;
use crate::modules::pressed_keys::{KeyStroke, Press};

/// What a module asks a popup to show.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    Caption(String),
    /// A level out of `max_value`.  `caption: None` keeps the current caption.
    Level {
        caption: Option<String>,
        value: usize,
        max_value: usize,
    },
    /// Key history, newest first.
    Keys(Vec<KeyStroke>),
}

/// Colours and font shared by every painter.
#[derive(Debug, Clone, PartialEq)]
pub struct Look {
    pub background: Color,
    pub border: Color,
    pub font: Font,
    pub font_color: Color,
}

#[derive(Debug, Clone)]
pub enum Painter {
    Text(TextPopup),
    Bar(BarPopup),
    Keys(KeyStripPopup),
}

impl Painter {
    /// Takes `content` into the painter.  Returns `false` when the content does not
    /// apply to this kind of popup, leaving it unchanged.
    pub fn apply(&mut self, content: PopupContent) -> bool {
        match (self, content) {
            (Painter::Text(p), PopupContent::Caption(caption)) => p.caption = caption,
            (Painter::Text(p), PopupContent::Level { caption: Some(caption), .. }) => {
                p.caption = caption
            }
            (Painter::Bar(p), PopupContent::Caption(caption)) => p.caption = caption,
            (Painter::Bar(p), PopupContent::Level { caption, value, max_value }) => {
                if let Some(caption) = caption {
                    p.caption = caption;
                }
                p.value = value;
                p.max_value = max_value;
            }
            (Painter::Keys(p), PopupContent::Keys(strokes)) => p.strokes = strokes,
            _ => return false,
        }
        true
    }

    pub fn measure(&mut self, metrics: &dyn TextMeasure) -> Size {
        match self {
            Painter::Text(p) => p.size,
            Painter::Bar(p) => p.measure(),
            Painter::Keys(p) => p.measure(metrics),
        }
    }

    pub fn paint(&self, canvas: &mut dyn Canvas, size: Size) {
        match self {
            Painter::Text(p) => p.paint(canvas, size),
            Painter::Bar(p) => p.paint(canvas, size),
            Painter::Keys(p) => p.paint(canvas, size),
        }
    }
}

/// Background fill plus a one-pixel border inset by one pixel.
fn paint_frame(canvas: &mut dyn Canvas, size: Size, look: &Look) {
    let (w, h) = (size.width as f32, size.height as f32);
    canvas.fill_rect(Rect::new(0.0, 0.0, w, h), look.background);
    canvas.stroke_rect(Rect::new(1.5, 1.5, w - 3.0, h - 3.0), look.border, 1.0);
}

// ── text ──────────────────────────────────────────────────────────────────────

pub const TEXT_POPUP_SIZE: Size = Size::new(200, 40);

#[derive(Debug, Clone)]
pub struct TextPopup {
    caption: String,
    size: Size,
    look: Look,
}

impl TextPopup {
    pub fn new(look: Look, size: Size) -> Self {
        Self { caption: String::new(), size, look }
    }

    fn paint(&self, canvas: &mut dyn Canvas, size: Size) {
        paint_frame(canvas, size, &self.look);
        let text = canvas.measure_text(&self.caption, &self.look.font);
        let x = (size.width as f32 - text.width) / 2.0;
        let y = (size.height as f32 - text.height) / 2.0;
        canvas.draw_text(&self.caption, &self.look.font, x, y, self.look.font_color);
    }
}

// ── level bar ─────────────────────────────────────────────────────────────────

const BAR_WIDTH: i32 = 330;
const BAR_HEIGHT: i32 = 70;
const BAR_WINDOW_BORDER: i32 = 12;
const BAR_INITIAL_GAP: i32 = 3;
const BAR_CAPTION_TOP: f32 = 5.0;
const BAR_TOP: i32 = 29;
const BAR_MAX_SEGMENTS: usize = 1000;
const BAR_ON: Color = Color::rgb(61, 148, 255);
const BAR_OFF: Color = Color::rgb(50, 50, 50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarLayout {
    pub width: i32,
    pub segment_width: i32,
    pub gap: i32,
}

impl BarLayout {
    /// Picks segment width and gap so that segments stay at least 1.8 gaps wide,
    /// shrinking the gap first and bottoming out at 1-pixel segments.  The popup
    /// width is then fitted to the segments exactly.
    pub fn for_segments(max_value: usize) -> Self {
        let max = max_value.min(BAR_MAX_SEGMENTS) as i32;
        if max == 0 {
            return Self { width: BAR_WIDTH, segment_width: 0, gap: BAR_INITIAL_GAP };
        }
        let mut gap = BAR_INITIAL_GAP;
        let mut segment_width;
        loop {
            segment_width = (BAR_WIDTH - 2 * BAR_WINDOW_BORDER - (max + 1) * gap) / max;
            if f64::from(segment_width) >= 1.8 * f64::from(gap) || gap == 0 {
                break;
            }
            gap -= 1;
        }
        if segment_width <= 0 {
            segment_width = 1;
        }
        Self {
            width: 2 * BAR_WINDOW_BORDER + (max + 1) * gap + max * segment_width,
            segment_width,
            gap,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarPopup {
    caption: String,
    value: usize,
    max_value: usize,
    layout: BarLayout,
    look: Look,
}

impl BarPopup {
    pub fn new(look: Look, caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            value: 3,
            max_value: 5,
            layout: BarLayout::for_segments(5),
            look,
        }
    }

    fn measure(&mut self) -> Size {
        self.layout = BarLayout::for_segments(self.max_value);
        Size::new(self.layout.width, BAR_HEIGHT)
    }

    fn paint(&self, canvas: &mut dyn Canvas, size: Size) {
        paint_frame(canvas, size, &self.look);
        let (w, h) = (size.width, size.height);
        let font = &self.look.font;

        let text = canvas.measure_text(&self.caption, font);
        let x = w as f32 / 2.0 - text.width / 2.0;
        canvas.draw_text(&self.caption, font, x, BAR_CAPTION_TOP, self.look.font_color);

        let wb = BAR_WINDOW_BORDER;
        let well = Rect::new(
            (wb - 1) as f32,
            BAR_TOP as f32,
            (w - 2 * wb) as f32,
            (h - BAR_TOP - wb - 1) as f32,
        );
        canvas.fill_rect(well, Color::BLACK);

        let BarLayout { segment_width: bw, gap, .. } = self.layout;
        let segment_height = (h - BAR_TOP - wb - 2 * gap - 1) as f32;
        for i in 0..self.max_value.min(BAR_MAX_SEGMENTS) {
            let x = wb - 1 + (gap + bw) * i as i32 + gap;
            let color = if i < self.value { BAR_ON } else { BAR_OFF };
            canvas.fill_rect(
                Rect::new(x as f32, (BAR_TOP + gap) as f32, bw as f32, segment_height),
                color,
            );
        }
    }
}

// ── key strip ─────────────────────────────────────────────────────────────────

pub const KEY_STRIP_WIDTH: i32 = 300;
const KEY_PADDING: f32 = 7.0;
const KEY_SPACING: f32 = 4.0;
const KEY_MARGIN: f32 = 5.0;
const KEY_MARK: f32 = 3.0;
const KEY_HIGHLIGHT: Color = Color::rgb(0x78, 0x78, 0x78);

#[derive(Debug, Clone)]
pub struct KeyStripPopup {
    strokes: Vec<KeyStroke>,
    width: i32,
    look: Look,
}

impl KeyStripPopup {
    pub fn new(look: Look, width: i32) -> Self {
        Self { strokes: Vec::new(), width, look }
    }

    /// Height fits the tallest label, with a margin above and below.
    fn measure(&self, metrics: &dyn TextMeasure) -> Size {
        let font = &self.look.font;
        let tallest = self
            .strokes
            .iter()
            .map(|s| metrics.measure_text(&s.key.label(), font).height)
            .fold(None, |acc: Option<f32>, h| Some(acc.map_or(h, |a| a.max(h))))
            .unwrap_or_else(|| metrics.measure_text("0", font).height);
        Size::new(self.width, (KEY_MARGIN * 2.0 + tallest).ceil() as i32)
    }

    fn paint(&self, canvas: &mut dyn Canvas, size: Size) {
        paint_frame(canvas, size, &self.look);
        let (w, h) = (size.width as f32, size.height as f32);
        canvas.set_clip(Some(Rect::new(2.0, 2.0, w - 4.0, h - 4.0)));

        let font = &self.look.font;
        let mut x = w - KEY_MARGIN;
        for stroke in &self.strokes {
            if x < 0.0 {
                break;
            }
            let label = stroke.key.label();
            let text = canvas.measure_text(&label, font);
            let cell = KEY_PADDING * 2.0 + text.width;
            x -= cell;

            let mark = match stroke.press {
                Press::Down => Rect::new(x, KEY_MARGIN + text.height - KEY_MARK, cell, KEY_MARK),
                Press::Up => Rect::new(x, KEY_MARGIN, cell, KEY_MARK),
                Press::Full => Rect::new(x, KEY_MARGIN, cell, text.height),
            };
            canvas.fill_rect(mark, KEY_HIGHLIGHT);
            canvas.draw_text(&label, font, x + KEY_PADDING, KEY_MARGIN, self.look.font_color);
            x -= KEY_SPACING;
        }
        canvas.set_clip(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::overlay::canvas::{FixedMetrics, SceneCanvas};

    fn look(font_size: f32) -> Look {
        Look {
            background: Color::argb(0xF7, 0x0F, 0x0F, 0x0F),
            border: Color::argb(0xF7, 0xFF, 0xFF, 0xFF),
            font: Font::new("Segoe UI", font_size),
            font_color: Color::WHITE,
        }
    }

    fn stroke(key: Key, press: Press) -> KeyStroke {
        KeyStroke { key, press }
    }

    // ── bar layout ────────────────────────────────────────────────────────────

    #[test]
    fn few_segments_keep_the_initial_gap() {
        let layout = BarLayout::for_segments(10);
        assert_eq!(layout, BarLayout { width: 327, segment_width: 27, gap: 3 });
    }

    #[test]
    fn many_segments_shrink_the_gap_first() {
        let layout = BarLayout::for_segments(100);
        assert_eq!(layout.gap, 1);
        assert_eq!(layout.segment_width, 2);
        assert_eq!(layout.width, 24 + 101 + 200);
    }

    #[test]
    fn extreme_segment_counts_fall_back_to_one_pixel() {
        let layout = BarLayout::for_segments(400);
        assert_eq!(layout.gap, 0);
        assert_eq!(layout.segment_width, 1);
        assert_eq!(layout.width, 24 + 400);
    }

    #[test]
    fn zero_segments_keep_the_base_width() {
        assert_eq!(BarLayout::for_segments(0).width, 330);
    }

    // ── bar paint ─────────────────────────────────────────────────────────────

    #[test]
    fn bar_lights_segments_below_value() {
        let mut painter = Painter::Bar(BarPopup::new(look(12.0), "Brightness"));
        assert!(painter.apply(PopupContent::Level { caption: None, value: 2, max_value: 4 }));
        let size = painter.measure(&FixedMetrics);
        assert_eq!(size.height, 70);

        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);

        // background, well, then one fill per segment
        let segments: Vec<Color> = canvas.fills().skip(2).map(|(_, c)| c).collect();
        assert_eq!(segments, vec![BAR_ON, BAR_ON, BAR_OFF, BAR_OFF]);
        assert_eq!(canvas.texts().next().map(|t| t.0), Some("Brightness"));
    }

    #[test]
    fn segments_fit_inside_the_well() {
        let mut painter = Painter::Bar(BarPopup::new(look(12.0), "x"));
        painter.apply(PopupContent::Level { caption: None, value: 7, max_value: 17 });
        let size = painter.measure(&FixedMetrics);
        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);

        let fills: Vec<Rect> = canvas.fills().map(|(r, _)| r).collect();
        let well = fills[1];
        for seg in &fills[2..] {
            assert!(seg.x >= well.x && seg.right() <= well.right() + 0.01, "{seg:?} outside {well:?}");
        }
    }

    // ── key strip ─────────────────────────────────────────────────────────────

    #[test]
    fn key_strip_draws_newest_rightmost() {
        let mut painter = Painter::Keys(KeyStripPopup::new(look(15.0), KEY_STRIP_WIDTH));
        painter.apply(PopupContent::Keys(vec![
            stroke(Key::B, Press::Full),
            stroke(Key::A, Press::Full),
        ]));
        let size = painter.measure(&FixedMetrics);
        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);

        let texts: Vec<(&str, f32)> = canvas.texts().map(|(t, x, _)| (t, x)).collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].0, "B");
        assert!(texts[0].1 > texts[1].1);
    }

    #[test]
    fn key_strip_marks_reflect_press_state() {
        let mut painter = Painter::Keys(KeyStripPopup::new(look(15.0), KEY_STRIP_WIDTH));
        painter.apply(PopupContent::Keys(vec![
            stroke(Key::A, Press::Down),
            stroke(Key::B, Press::Up),
            stroke(Key::C, Press::Full),
        ]));
        let size = painter.measure(&FixedMetrics);
        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);

        let marks: Vec<Rect> = canvas.fills().skip(1).map(|(r, _)| r).collect();
        let line = FixedMetrics.measure_text("A", &Font::new("Segoe UI", 15.0)).height;
        assert_eq!(marks[0].y, KEY_MARGIN + line - KEY_MARK);
        assert_eq!(marks[0].height, KEY_MARK);
        assert_eq!(marks[1].y, KEY_MARGIN);
        assert_eq!(marks[1].height, KEY_MARK);
        assert_eq!(marks[2].height, line);
    }

    #[test]
    fn key_strip_height_follows_font() {
        let mut small = Painter::Keys(KeyStripPopup::new(look(10.0), KEY_STRIP_WIDTH));
        let mut large = Painter::Keys(KeyStripPopup::new(look(30.0), KEY_STRIP_WIDTH));
        let small_size = small.measure(&FixedMetrics);
        let large_size = large.measure(&FixedMetrics);
        assert_eq!(small_size.width, KEY_STRIP_WIDTH);
        assert!(large_size.height > small_size.height);
    }

    #[test]
    fn long_history_stops_at_the_left_edge() {
        let mut painter = Painter::Keys(KeyStripPopup::new(look(15.0), KEY_STRIP_WIDTH));
        painter.apply(PopupContent::Keys(vec![stroke(Key::PageDown, Press::Full); 40]));
        let size = painter.measure(&FixedMetrics);
        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);
        assert!(canvas.texts().count() < 40);
    }

    // ── content routing ───────────────────────────────────────────────────────

    #[test]
    fn mismatched_content_is_rejected() {
        let mut keys = Painter::Keys(KeyStripPopup::new(look(15.0), KEY_STRIP_WIDTH));
        assert!(!keys.apply(PopupContent::Caption("EN".into())));

        let mut text = Painter::Text(TextPopup::new(look(12.0), TEXT_POPUP_SIZE));
        assert!(!text.apply(PopupContent::Keys(Vec::new())));
        assert!(text.apply(PopupContent::Caption("EN".into())));
        assert_eq!(text.measure(&FixedMetrics), TEXT_POPUP_SIZE);
    }

    #[test]
    fn text_popup_centres_its_caption() {
        let mut painter = Painter::Text(TextPopup::new(look(12.0), TEXT_POPUP_SIZE));
        painter.apply(PopupContent::Caption("EN".into()));
        let size = painter.measure(&FixedMetrics);
        let mut canvas = SceneCanvas::new();
        painter.paint(&mut canvas, size);

        let (_, x, _) = canvas.texts().next().unwrap();
        let width = FixedMetrics.measure_text("EN", &Font::new("Segoe UI", 12.0)).width;
        assert!((x + width / 2.0 - 100.0).abs() < 0.01);
        let (frame, fill) = canvas.fills().next().unwrap();
        assert_eq!(frame, Rect::new(0.0, 0.0, 200.0, 40.0));
        assert_eq!(fill, Color::argb(0xF7, 0x0F, 0x0F, 0x0F));
    }
}
