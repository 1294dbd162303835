//! Steps the primary monitor's brightness through the levels it reports.
use std::sync::Arc;

use anyhow::Context;

use super::{warn_if_bare, Module, ModuleContext};
use crate::config::{BrightnessConfig, IndicatorKind, DEFAULT_BRIGHTNESS_CAPTION};
use crate::hotkey::Hotkey;
use crate::overlay::{Indicator, PopupContent};
use crate::workers::Worker;

/// Hardware brightness of one display.
pub trait BrightnessControl: Send + Sync {
    /// Levels the display accepts.  Need not be sorted.
    fn levels(&self) -> anyhow::Result<Vec<u8>>;
    fn current(&self) -> anyhow::Result<u8>;
    fn set_level(&self, level: u8) -> anyhow::Result<()>;
}

/// Index of the level after one step from `current`.
///
/// The current index is the first level at or above `current`, or the last level
/// when `current` is above all of them.  `levels` must be sorted ascending.
/// Returns `None` for an empty table.
pub fn step_index(levels: &[u8], current: u8, up: bool) -> Option<usize> {
    let last = levels.len().checked_sub(1)?;
    let index = levels.iter().position(|&level| current <= level).unwrap_or(last);
    Some(if up { (index + 1).min(last) } else { index.saturating_sub(1) })
}

pub struct BrightnessModule {
    brighter: Hotkey,
    darker: Hotkey,
    action: Arc<StepAction>,
    worker: Worker,
}

/// Everything a step needs once it is off the hook thread.
struct StepAction {
    control: Arc<dyn BrightnessControl>,
    indicator: Arc<dyn Indicator>,
    caption: String,
    kind: IndicatorKind,
}

impl BrightnessModule {
    pub fn new(config: &BrightnessConfig, ctx: &ModuleContext<'_>) -> anyhow::Result<Self> {
        let caption = config
            .indicator
            .caption
            .clone()
            .unwrap_or_else(|| DEFAULT_BRIGHTNESS_CAPTION.to_owned());
        warn_if_bare("brightness", &config.brighter);
        warn_if_bare("brightness", &config.darker);
        let kind = config.indicator.kind.unwrap_or(IndicatorKind::Bar);
        let indicator = ctx
            .indicator(&config.indicator, IndicatorKind::Bar, &caption)
            .context("creating the brightness popup")?;
        Ok(Self::with_parts(
            config.brighter,
            config.darker,
            ctx.collaborators.brightness(config.ddc_step),
            indicator,
            caption,
            kind,
            ctx.worker.clone(),
        ))
    }

    fn with_parts(
        brighter: Hotkey,
        darker: Hotkey,
        control: Arc<dyn BrightnessControl>,
        indicator: Arc<dyn Indicator>,
        caption: String,
        kind: IndicatorKind,
        worker: Worker,
    ) -> Self {
        let action = Arc::new(StepAction { control, indicator, caption, kind });
        Self { brighter, darker, action, worker }
    }
}

impl Module for BrightnessModule {
    fn name(&self) -> &'static str {
        "brightness"
    }

    /// Steps on the down transition.  The matching up transition is claimed too so
    /// the foreground application never sees half of the hotkey.
    fn handle_key(&mut self, hotkey: &Hotkey, down: bool) -> bool {
        let up = if *hotkey == self.brighter {
            true
        } else if *hotkey == self.darker {
            false
        } else {
            return false;
        };
        if down {
            let action = Arc::clone(&self.action);
            self.worker.spawn(self.name(), move || action.step(up));
        }
        true
    }
}

impl StepAction {
    fn step(&self, up: bool) -> anyhow::Result<()> {
        let mut levels = self.control.levels().context("querying brightness levels")?;
        levels.sort_unstable();
        levels.dedup();
        let current = self.control.current().context("querying current brightness")?;
        let Some(index) = step_index(&levels, current, up) else {
            anyhow::bail!("display reported no brightness levels");
        };
        let level = levels[index];
        self.control.set_level(level).context("setting brightness")?;
        tracing::debug!(current, level, index, up, "brightness stepped");

        let content = match self.kind {
            IndicatorKind::Bar => PopupContent::Level {
                caption: None,
                value: index,
                max_value: levels.len() - 1,
            },
            IndicatorKind::Text => PopupContent::Caption(format!("{}: {level}", self.caption)),
        };
        self.indicator.display(content);
        Ok(())
    }
}
