use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::canvas::{Canvas, Font, Size, TextMeasure};
use super::color::Color;
use super::painters::{Look, Painter, PopupContent};
use super::position::{Pos, PosRel, PosScreen, PosUnit, ScreenTopology};

pub const DEFAULT_TIMEOUT_SECS: f64 = 1.2;
pub const DEFAULT_FONT_FAMILY: &str = "Segoe UI";

/// How a popup reacts to the mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickPolicy {
    /// Clicks fall through to whatever is underneath.
    #[default]
    ClickThrough,
    /// The popup can be dragged anywhere on its surface.
    Move,
    /// A click hides the popup.
    Dismiss,
}

/// Appearance and placement shared by every popup kind.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PopupStyle {
    /// Seconds the popup stays visible after the last display request.
    pub timeout: f64,
    pub horz_anchor: PosRel,
    pub vert_anchor: PosRel,
    pub horz_pos: Pos,
    pub vert_pos: Pos,
    pub click: ClickPolicy,
    pub background: Color,
    pub border: Color,
    pub font_family: String,
    /// Points.  Unset means the popup kind's own default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    pub font_color: Color,
}

impl Default for PopupStyle {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            horz_anchor: PosRel::Center,
            vert_anchor: PosRel::RightOrBottom,
            horz_pos: Pos {
                value: 0.0,
                unit: PosUnit::Pixels,
                rel: PosRel::Center,
                screen: PosScreen::Primary,
                work_area_only: false,
            },
            vert_pos: Pos {
                value: 90.0,
                unit: PosUnit::Percent,
                rel: PosRel::LeftOrTop,
                screen: PosScreen::Primary,
                work_area_only: false,
            },
            click: ClickPolicy::ClickThrough,
            background: Color::argb(0xF7, 0x0F, 0x0F, 0x0F),
            border: Color::argb(0xF7, 0xFF, 0xFF, 0xFF),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: None,
            font_color: Color::WHITE,
        }
    }
}

impl PopupStyle {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    pub fn look(&self, default_font_size: f32) -> Look {
        Look {
            background: self.background,
            border: self.border,
            font: Font::new(&self.font_family, self.font_size.unwrap_or(default_font_size)),
            font_color: self.font_color,
        }
    }
}

/// Where and how large a popup is on screen, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub dpi: u32,
    /// Size the painter draws at, in 96-DPI units.
    pub logical: Size,
}

/// One popup: its style, its painter, and its auto-hide deadline.
#[derive(Debug)]
pub struct Popup {
    style: PopupStyle,
    painter: Painter,
    deadline: Option<Instant>,
}

impl Popup {
    pub fn new(style: PopupStyle, painter: Painter) -> Self {
        Self { style, painter, deadline: None }
    }

    #[cfg_attr(not(any(windows, test)), allow(dead_code))]
    pub fn click(&self) -> ClickPolicy {
        self.style.click
    }

    pub fn apply(&mut self, content: PopupContent) -> bool {
        self.painter.apply(content)
    }

    /// Measures the content and resolves the on-screen frame.  `None` when no
    /// screen is attached.
    pub fn layout(&mut self, topology: &dyn ScreenTopology, metrics: &dyn TextMeasure) -> Option<Frame> {
        let logical = self.painter.measure(metrics);
        let style = &self.style;
        let horz = style.horz_pos.target(topology)?;
        let vert = style.vert_pos.target(topology)?;
        Some(Frame {
            left: style.horz_pos.calculate(&horz, style.horz_anchor, logical.width, true),
            top: style.vert_pos.calculate(&vert, style.vert_anchor, logical.height, false),
            width: horz.scale(logical.width).max(1),
            height: horz.scale(logical.height).max(1),
            dpi: horz.dpi,
            logical,
        })
    }

    pub fn paint(&self, canvas: &mut dyn Canvas, size: Size) {
        self.painter.paint(canvas, size);
    }

    /// Starts (or restarts) the auto-hide countdown.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.style.timeout());
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` exactly once when the deadline has passed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
