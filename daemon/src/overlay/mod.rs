//! Transient, alpha-blended, always-on-top feedback popups.

mod canvas;
mod color;
mod host;
mod painters;
mod popup;
mod position;
mod surface;
#[cfg(windows)]
mod window;

pub use canvas::Size;
pub use host::{Indicator, OverlayHandle, OverlayHost};
pub use painters::{
    BarPopup, KeyStripPopup, Painter, PopupContent, TextPopup, KEY_STRIP_WIDTH, TEXT_POPUP_SIZE,
};
pub use popup::PopupStyle;
#[cfg(any(test, not(windows)))]
pub use position::StaticTopology;
pub use position::ScreenTopology;
#[cfg(windows)]
pub use position::{Screen, ScreenRect};

#[cfg(test)]
pub use color::Color;
#[cfg(test)]
pub use popup::ClickPolicy;
#[cfg(test)]
pub use position::PosScreen;
#[cfg(test)]
pub use surface::HeadlessFactory;
