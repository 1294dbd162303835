//! Popup placement: resolves a configured [`Pos`] against the current screen
//! topology into a device-pixel coordinate.

use serde::{Deserialize, Serialize};

/// Edge of a screen (or of the popup itself) a position is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PosRel {
    LeftOrTop,
    #[default]
    Center,
    RightOrBottom,
}

impl PosRel {
    fn offset(self, extent: i32) -> f64 {
        let extent = f64::from(extent);
        match self {
            PosRel::LeftOrTop => 0.0,
            PosRel::Center => extent / 2.0,
            PosRel::RightOrBottom => extent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PosUnit {
    /// Logical pixels, scaled by the target screen's DPI.
    #[default]
    Pixels,
    /// Percentage of the target screen's extent in that axis.
    Percent,
}

/// Which screen a position is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "ScreenSpec", into = "ScreenSpec")]
pub enum PosScreen {
    /// Bounding box of every screen.
    Desktop,
    #[default]
    Primary,
    /// Screen under the foreground window, else under the cursor.
    Active,
    Index(usize),
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum ScreenSpec {
    Index(usize),
    Name(String),
}

impl TryFrom<ScreenSpec> for PosScreen {
    type Error = String;

    fn try_from(spec: ScreenSpec) -> Result<Self, Self::Error> {
        match spec {
            ScreenSpec::Index(i) => Ok(PosScreen::Index(i)),
            ScreenSpec::Name(name) => match name.to_ascii_lowercase().as_str() {
                "desktop" => Ok(PosScreen::Desktop),
                "primary" => Ok(PosScreen::Primary),
                "active" => Ok(PosScreen::Active),
                _ => Err(format!(
                    "unknown screen \"{name}\": expected desktop, primary, active or an index"
                )),
            },
        }
    }
}

impl From<PosScreen> for ScreenSpec {
    fn from(screen: PosScreen) -> Self {
        match screen {
            PosScreen::Desktop => ScreenSpec::Name("desktop".into()),
            PosScreen::Primary => ScreenSpec::Name("primary".into()),
            PosScreen::Active => ScreenSpec::Name("active".into()),
            PosScreen::Index(i) => ScreenSpec::Index(i),
        }
    }
}

/// One axis of a popup position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Pos {
    pub value: f64,
    pub unit: PosUnit,
    pub rel: PosRel,
    pub screen: PosScreen,
    /// Measure against the work area (excluding task bars) instead of the bounds.
    pub work_area_only: bool,
}

/// Screen rectangle in virtual-desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width / 2, self.top + self.height / 2)
    }

    pub fn contains(&self, (x, y): (i32, i32)) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    fn union(&self, other: &ScreenRect) -> ScreenRect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        ScreenRect::new(left, top, right - left, bottom - top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub bounds: ScreenRect,
    pub work_area: ScreenRect,
    pub is_primary: bool,
}

/// Read-only view of the monitor layout.
pub trait ScreenTopology: Send + Sync {
    fn all_screens(&self) -> Vec<Screen>;
    fn foreground_window_bounds(&self) -> Option<ScreenRect>;
    fn cursor_position(&self) -> Option<(i32, i32)>;
    fn dpi_for_screen(&self, screen: &Screen) -> u32;
}

/// Rectangle and DPI a position resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub area: ScreenRect,
    pub dpi: u32,
}

impl Target {
    /// Scales a logical extent to device pixels.
    pub fn scale(&self, logical: i32) -> i32 {
        logical * self.dpi as i32 / 96
    }
}

impl Pos {
    /// Screen area and DPI this position is measured against, or `None` when no
    /// screen is attached.
    pub fn target(&self, topology: &dyn ScreenTopology) -> Option<Target> {
        let screens = topology.all_screens();
        let primary = screens
            .iter()
            .find(|s| s.is_primary)
            .or_else(|| screens.first())?;

        let area = |s: &Screen| if self.work_area_only { s.work_area } else { s.bounds };

        let screen = match self.screen {
            PosScreen::Desktop => {
                let union = screens
                    .iter()
                    .map(area)
                    .reduce(|acc, r| acc.union(&r))
                    .unwrap_or_else(|| area(primary));
                return Some(Target {
                    area: union,
                    dpi: topology.dpi_for_screen(primary),
                });
            }
            PosScreen::Primary => primary,
            PosScreen::Active => active_screen(topology, &screens).unwrap_or(primary),
            PosScreen::Index(i) => screens.get(i).unwrap_or_else(|| {
                tracing::warn!(index = i, count = screens.len(), "screen index out of range; using primary");
                primary
            }),
        };

        Some(Target {
            area: area(screen),
            dpi: topology.dpi_for_screen(screen),
        })
    }

    /// Device-pixel coordinate of the popup's leading edge in this axis.
    ///
    /// `anchor` is the popup's own reference edge and `size` its logical extent in
    /// this axis.  The result is `base + rel(extent) - anchor(size) + value`, with
    /// `value` scaled by DPI (pixels) or by the screen extent (percent).
    pub fn calculate(&self, target: &Target, anchor: PosRel, size: i32, horizontal: bool) -> i32 {
        let (start, extent) = if horizontal {
            (target.area.left, target.area.width)
        } else {
            (target.area.top, target.area.height)
        };
        let scale = match self.unit {
            PosUnit::Pixels => f64::from(target.dpi) / 96.0,
            PosUnit::Percent => f64::from(extent) / 100.0,
        };
        let exact = f64::from(start) + self.rel.offset(extent) - anchor.offset(target.scale(size))
            + self.value * scale;
        exact.round_ties_even() as i32
    }
}

fn active_screen<'a>(topology: &dyn ScreenTopology, screens: &'a [Screen]) -> Option<&'a Screen> {
    let point = match topology.foreground_window_bounds() {
        Some(rect) => rect.center(),
        None => topology.cursor_position()?,
    };
    screens.iter().find(|s| s.bounds.contains(point))
}

/// Fixed topology, used headless and in tests.
#[cfg(any(test, not(windows)))]
#[derive(Debug, Clone)]
pub struct StaticTopology {
    pub screens: Vec<Screen>,
    pub dpi: u32,
    pub foreground: Option<ScreenRect>,
    pub cursor: Option<(i32, i32)>,
}

#[cfg(any(test, not(windows)))]
impl StaticTopology {
    /// A single primary screen of the given size at 96 DPI.
    pub fn single(width: i32, height: i32) -> Self {
        let rect = ScreenRect::new(0, 0, width, height);
        Self {
            screens: vec![Screen { bounds: rect, work_area: rect, is_primary: true }],
            dpi: 96,
            foreground: None,
            cursor: None,
        }
    }
}

#[cfg(any(test, not(windows)))]
impl ScreenTopology for StaticTopology {
    fn all_screens(&self) -> Vec<Screen> {
        self.screens.clone()
    }

    fn foreground_window_bounds(&self) -> Option<ScreenRect> {
        self.foreground
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        self.cursor
    }

    fn dpi_for_screen(&self, _screen: &Screen) -> u32 {
        self.dpi
    }
}
