//! Switches the foreground window's keyboard layout on a hotkey.
use std::sync::Arc;

use anyhow::Context;

use super::{warn_if_bare, Module, ModuleContext};
use crate::config::{IndicatorKind, KeyboardLayoutConfig, NamePattern};
use crate::hotkey::Hotkey;
use crate::overlay::{Indicator, PopupContent};
use crate::workers::Worker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInfo {
    /// OS layout handle (`HKL`).
    pub handle: isize,
    pub name: String,
}

/// Installed layouts and a way to switch between them.
pub trait LayoutProvider: Send + Sync {
    /// Every installed layout, in the order enumerated at startup.
    fn installed(&self) -> &[LayoutInfo];

    /// Asks the foreground window's top-level owner to switch to `layout`.
    fn activate_for_foreground(&self, layout: &LayoutInfo) -> anyhow::Result<()>;
}

/// The layout an entry at `index` selects: the first name matching `pattern`, or
/// the installed layout at `index` (clamped to the last one) without a pattern.
pub fn select_layout<'a>(
    installed: &'a [LayoutInfo],
    index: usize,
    pattern: Option<&NamePattern>,
) -> Option<&'a LayoutInfo> {
    match pattern {
        Some(pattern) => installed.iter().find(|layout| pattern.is_match(&layout.name)),
        None => installed.get(index.min(installed.len().checked_sub(1)?)),
    }
}

struct Entry {
    hotkey: Option<Hotkey>,
    switch: Arc<Switch>,
}

/// One entry's action, run on a worker.
struct Switch {
    index: usize,
    pattern: Option<NamePattern>,
    display_name: Option<String>,
    indicator: Option<Arc<dyn Indicator>>,
    provider: Arc<dyn LayoutProvider>,
}

pub struct KeyboardLayoutModule {
    entries: Vec<Entry>,
    worker: Worker,
}

impl KeyboardLayoutModule {
    pub fn new(config: &KeyboardLayoutConfig, ctx: &ModuleContext<'_>) -> anyhow::Result<Self> {
        let provider = ctx.collaborators.layouts();
        let entries = config
            .layouts
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if let Some(hotkey) = &entry.hotkey {
                    warn_if_bare("keyboard_layout", hotkey);
                }
                let indicator = entry
                    .indicator
                    .as_ref()
                    .map(|cfg| ctx.indicator(cfg, IndicatorKind::Text, ""))
                    .transpose()
                    .with_context(|| format!("creating the popup for layout entry {index}"))?;
                Ok(Entry {
                    hotkey: entry.hotkey,
                    switch: Arc::new(Switch {
                        index,
                        pattern: entry.name_match.clone(),
                        display_name: entry.display_name.clone(),
                        indicator,
                        provider: Arc::clone(&provider),
                    }),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        tracing::debug!(
            entries = entries.len(),
            installed = provider.installed().len(),
            "keyboard layout module ready"
        );
        Ok(Self { entries, worker: ctx.worker.clone() })
    }
}

impl Module for KeyboardLayoutModule {
    fn name(&self) -> &'static str {
        "keyboard_layout"
    }

    /// A matching entry claims both transitions, even when no layout resolves.
    fn handle_key(&mut self, hotkey: &Hotkey, down: bool) -> bool {
        let Some(entry) = self.entries.iter().find(|e| e.hotkey.as_ref() == Some(hotkey)) else {
            return false;
        };
        if down {
            let switch = Arc::clone(&entry.switch);
            self.worker.spawn(self.name(), move || switch.run());
        }
        true
    }
}

impl Switch {
    fn run(&self) -> anyhow::Result<()> {
        let installed = self.provider.installed();
        let Some(layout) = select_layout(installed, self.index, self.pattern.as_ref()) else {
            tracing::debug!(entry = self.index, installed = installed.len(), "no layout selected");
            return Ok(());
        };
        self.provider
            .activate_for_foreground(layout)
            .with_context(|| format!("activating layout {}", layout.name))?;
        tracing::debug!(entry = self.index, layout = %layout.name, "layout activated");

        if let Some(indicator) = &self.indicator {
            let caption = self.display_name.as_deref().unwrap_or(&layout.name);
            indicator.display(PopupContent::Caption(caption.to_owned()));
        }
        Ok(())
    }
}
