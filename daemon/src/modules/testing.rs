//! Fakes shared by module and dispatcher tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::brightness::BrightnessControl;
use super::keyboard_layout::{LayoutInfo, LayoutProvider};
use super::{Collaborators, Module};
use crate::hotkey::Hotkey;
use crate::overlay::{Indicator, PopupContent};

pub type Seen = Arc<Mutex<Vec<(Hotkey, bool)>>>;

/// Records every transition it is offered and claims one hotkey.
pub struct ScriptedModule {
    claims: Hotkey,
    seen: Seen,
}

impl ScriptedModule {
    pub fn claiming(claims: Hotkey) -> (Self, Seen) {
        let seen = Seen::default();
        (Self { claims, seen: Arc::clone(&seen) }, seen)
    }
}

impl Module for ScriptedModule {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn handle_key(&mut self, hotkey: &Hotkey, down: bool) -> bool {
        self.seen.lock().unwrap().push((*hotkey, down));
        *hotkey == self.claims
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    shown: Mutex<Vec<PopupContent>>,
    hides: AtomicUsize,
}

impl RecordingIndicator {
    pub fn shown(&self) -> Vec<PopupContent> {
        self.shown.lock().unwrap().clone()
    }

    pub fn hides(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }
}

impl Indicator for RecordingIndicator {
    fn display(&self, content: PopupContent) {
        self.shown.lock().unwrap().push(content);
    }

    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

/// A monitor with a fixed level table.  `None` levels make every query fail.
pub struct FakeBrightness {
    levels: Option<Vec<u8>>,
    current: Mutex<u8>,
    sets: Mutex<Vec<u8>>,
}

impl FakeBrightness {
    pub fn new(levels: Vec<u8>, current: u8) -> Self {
        Self { levels: Some(levels), current: Mutex::new(current), sets: Mutex::default() }
    }

    pub fn unavailable() -> Self {
        Self { levels: None, current: Mutex::new(0), sets: Mutex::default() }
    }

    pub fn level(&self) -> u8 {
        *self.current.lock().unwrap()
    }

    pub fn sets(&self) -> Vec<u8> {
        self.sets.lock().unwrap().clone()
    }
}

impl BrightnessControl for FakeBrightness {
    fn levels(&self) -> anyhow::Result<Vec<u8>> {
        self.levels.clone().ok_or_else(|| anyhow::anyhow!("no monitor responded"))
    }

    fn current(&self) -> anyhow::Result<u8> {
        anyhow::ensure!(self.levels.is_some(), "no monitor responded");
        Ok(*self.current.lock().unwrap())
    }

    fn set_level(&self, level: u8) -> anyhow::Result<()> {
        anyhow::ensure!(self.levels.is_some(), "no monitor responded");
        *self.current.lock().unwrap() = level;
        self.sets.lock().unwrap().push(level);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLayouts {
    installed: Vec<LayoutInfo>,
    activated: Mutex<Vec<isize>>,
}

impl FakeLayouts {
    pub fn named(names: &[&str]) -> Self {
        let installed = names
            .iter()
            .enumerate()
            .map(|(i, name)| LayoutInfo { handle: 0x0409_0000 + i as isize, name: (*name).to_owned() })
            .collect();
        Self { installed, activated: Mutex::default() }
    }

    pub fn activated(&self) -> Vec<isize> {
        self.activated.lock().unwrap().clone()
    }
}

impl LayoutProvider for FakeLayouts {
    fn installed(&self) -> &[LayoutInfo] {
        &self.installed
    }

    fn activate_for_foreground(&self, layout: &LayoutInfo) -> anyhow::Result<()> {
        self.activated.lock().unwrap().push(layout.handle);
        Ok(())
    }
}

pub struct FakeCollaborators {
    pub brightness: Arc<FakeBrightness>,
    pub layouts: Arc<FakeLayouts>,
}

impl Default for FakeCollaborators {
    fn default() -> Self {
        Self {
            brightness: Arc::new(FakeBrightness::unavailable()),
            layouts: Arc::new(FakeLayouts::default()),
        }
    }
}

impl Collaborators for FakeCollaborators {
    fn brightness(&self, _ddc_step: u8) -> Arc<dyn BrightnessControl> {
        self.brightness.clone()
    }

    fn layouts(&self) -> Arc<dyn LayoutProvider> {
        self.layouts.clone()
    }
}
