//! Handler modules.  Each owns its hotkeys and private state and is offered every
//! key transition by the dispatcher.
pub mod brightness;
pub mod keyboard_layout;
pub mod pressed_keys;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use crate::config::{IndicatorConfig, IndicatorKind, ModuleConfig};
use crate::hotkey::Hotkey;
use crate::overlay::{
    BarPopup, Indicator, OverlayHandle, Painter, PopupContent, Size, TextPopup, TEXT_POPUP_SIZE,
};
use crate::workers::Worker;

use self::brightness::{BrightnessControl, BrightnessModule};
use self::keyboard_layout::{KeyboardLayoutModule, LayoutProvider};
use self::pressed_keys::PressedKeyMonitor;

/// Font size for captions when the style does not set one.
const CAPTION_FONT_SIZE: f32 = 12.0;

pub trait Module: Send {
    fn name(&self) -> &'static str;

    /// Called on the hook thread for every transition that no earlier module
    /// claimed.  Must return quickly; slow work goes to the [`Worker`].
    ///
    /// Returning `true` claims the transition: the chain stops and the key is
    /// swallowed.
    fn handle_key(&mut self, hotkey: &Hotkey, down: bool) -> bool;
}

/// The outside world modules act on.
pub trait Collaborators {
    fn brightness(&self, ddc_step: u8) -> Arc<dyn BrightnessControl>;
    fn layouts(&self) -> Arc<dyn LayoutProvider>;
}

/// What modules are built with.
pub struct ModuleContext<'a> {
    pub worker: Worker,
    pub overlay: OverlayHandle,
    pub collaborators: &'a dyn Collaborators,
}

impl ModuleContext<'_> {
    /// Creates the popup described by `config`, falling back to `default_kind` and
    /// `default_caption` where it is silent.
    pub fn indicator(
        &self,
        config: &IndicatorConfig,
        default_kind: IndicatorKind,
        default_caption: &str,
    ) -> anyhow::Result<Arc<dyn Indicator>> {
        let caption = config.caption.as_deref().unwrap_or(default_caption);
        let look = config.style.look(CAPTION_FONT_SIZE);
        let mut painter = match config.kind.unwrap_or(default_kind) {
            IndicatorKind::Text => Painter::Text(TextPopup::new(
                look,
                Size::new(
                    config.width.unwrap_or(TEXT_POPUP_SIZE.width),
                    config.height.unwrap_or(TEXT_POPUP_SIZE.height),
                ),
            )),
            IndicatorKind::Bar => Painter::Bar(BarPopup::new(look, caption)),
        };
        painter.apply(PopupContent::Caption(caption.to_owned()));
        let id = self.overlay.create_popup(config.style.clone(), painter)?;
        Ok(self.overlay.indicator(id))
    }
}

/// A hotkey without modifiers is accepted, but the key it names stops reaching
/// every other application.
fn warn_if_bare(module: &'static str, hotkey: &Hotkey) {
    if hotkey.is_bare() {
        tracing::warn!(module, %hotkey, "hotkey has no modifiers; the key is claimed everywhere");
    }
}

/// Builds the dispatch chain in configuration order, creating every popup up front.
pub fn build(configs: &[ModuleConfig], ctx: &ModuleContext<'_>) -> anyhow::Result<Vec<Box<dyn Module>>> {
    configs
        .iter()
        .map(|config| -> anyhow::Result<Box<dyn Module>> {
            Ok(match config {
                ModuleConfig::Brightness(c) => Box::new(BrightnessModule::new(c, ctx)?),
                ModuleConfig::KeyboardLayout(c) => Box::new(KeyboardLayoutModule::new(c, ctx)?),
                ModuleConfig::PressedKeyMonitor(c) => Box::new(PressedKeyMonitor::new(c, ctx)?),
            })
        })
        .collect()
}
