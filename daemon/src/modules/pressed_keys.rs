//! Pressed-key monitor: records recent key transitions and shows them in a
//! scrolling strip while enabled.  It observes keys without claiming them; only its
//! own toggle hotkey is swallowed.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;

use super::{warn_if_bare, Module, ModuleContext};
use crate::config::PressedKeyMonitorConfig;
use crate::hotkey::Hotkey;
use crate::key::Key;
use crate::overlay::{Indicator, KeyStripPopup, Painter, PopupContent, KEY_STRIP_WIDTH};
use crate::ring_buffer::RingBuffer;
use crate::workers::Worker;

const STRIP_FONT_SIZE: f32 = 15.0;

/// Which halves of a keystroke were seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Down,
    Up,
    /// A down immediately followed by its up.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: Key,
    pub press: Press,
}

pub struct PressedKeyMonitor {
    toggle: Hotkey,
    enabled: bool,
    history: RingBuffer<KeyStroke>,
    /// Last seen direction per key; only used to drop autorepeat.
    held: HashMap<Key, bool>,
    indicator: Arc<dyn Indicator>,
    /// Bumped on every toggle-off so redisplays queued before it stay hidden.
    generation: Arc<AtomicU64>,
    worker: Worker,
}

impl PressedKeyMonitor {
    pub fn new(config: &PressedKeyMonitorConfig, ctx: &ModuleContext<'_>) -> anyhow::Result<Self> {
        warn_if_bare("pressed_key_monitor", &config.toggle);
        let style = &config.indicator.style;
        let painter = Painter::Keys(KeyStripPopup::new(
            style.look(STRIP_FONT_SIZE),
            config.indicator.width.unwrap_or(KEY_STRIP_WIDTH),
        ));
        let id = ctx
            .overlay
            .create_popup(style.clone(), painter)
            .context("creating the key history popup")?;
        Ok(Self::with_parts(
            config.toggle,
            config.capacity,
            config.enabled,
            ctx.overlay.indicator(id),
            ctx.worker.clone(),
        ))
    }

    fn with_parts(
        toggle: Hotkey,
        capacity: usize,
        enabled: bool,
        indicator: Arc<dyn Indicator>,
        worker: Worker,
    ) -> Self {
        Self {
            toggle,
            enabled,
            history: RingBuffer::new(capacity),
            held: HashMap::new(),
            indicator,
            generation: Arc::new(AtomicU64::new(0)),
            worker,
        }
    }

    fn flip(&mut self) {
        self.enabled = !self.enabled;
        tracing::info!(
            enabled = self.enabled,
            capacity = self.history.capacity(),
            "pressed key monitor toggled"
        );
        if !self.enabled {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.history.clear();
            self.held.clear();
            self.indicator.hide();
        }
    }

    /// Records one transition.  Returns `false` for autorepeat, which changes nothing.
    fn record(&mut self, key: Key, down: bool) -> bool {
        if down && self.held.get(&key).copied().unwrap_or(false) {
            return false;
        }
        match self.history.newest_mut() {
            Some(last) if !down && last.key == key && last.press == Press::Down => {
                last.press = Press::Full;
            }
            _ => self.history.push(KeyStroke {
                key,
                press: if down { Press::Down } else { Press::Up },
            }),
        }
        self.held.insert(key, down);
        true
    }

    fn redisplay(&self) {
        let strokes: Vec<KeyStroke> = self.history.iter().rev().copied().collect();
        let indicator = Arc::clone(&self.indicator);
        let generation = Arc::clone(&self.generation);
        let queued_at = generation.load(Ordering::SeqCst);
        self.worker.spawn(self.name(), move || {
            show_strokes(indicator.as_ref(), &generation, queued_at, strokes);
            Ok(())
        });
    }
}

/// Shows `strokes` unless the monitor was switched off after they were queued.
/// A switch-off that lands while the frame is being painted hides it again.
fn show_strokes(
    indicator: &dyn Indicator,
    generation: &AtomicU64,
    queued_at: u64,
    strokes: Vec<KeyStroke>,
) {
    if generation.load(Ordering::SeqCst) != queued_at {
        return;
    }
    indicator.display(PopupContent::Keys(strokes));
    if generation.load(Ordering::SeqCst) != queued_at {
        indicator.hide();
    }
}

impl Module for PressedKeyMonitor {
    fn name(&self) -> &'static str {
        "pressed_key_monitor"
    }

    fn handle_key(&mut self, hotkey: &Hotkey, down: bool) -> bool {
        if *hotkey == self.toggle {
            if down {
                self.flip();
            }
            return true;
        }
        if self.enabled && self.record(hotkey.key(), down) {
            self.redisplay();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Modifiers;
    use crate::modules::testing::RecordingIndicator;

    fn monitor(capacity: usize, enabled: bool) -> (PressedKeyMonitor, Arc<RecordingIndicator>) {
        let indicator = Arc::new(RecordingIndicator::default());
        let m = PressedKeyMonitor::with_parts(
            "Ctrl+Alt+K".parse().unwrap(),
            capacity,
            enabled,
            indicator.clone(),
            Worker::Inline,
        );
        (m, indicator)
    }

    fn press(m: &mut PressedKeyMonitor, key: Key, down: bool) -> bool {
        m.handle_key(&Hotkey::new(key, Modifiers::NONE), down)
    }

    fn toggle(m: &mut PressedKeyMonitor) {
        let t: Hotkey = "Ctrl+Alt+K".parse().unwrap();
        assert!(m.handle_key(&t, true));
        assert!(m.handle_key(&t, false));
    }

    fn history(m: &PressedKeyMonitor) -> Vec<KeyStroke> {
        m.history.iter().copied().collect()
    }

    fn stroke(key: Key, press: Press) -> KeyStroke {
        KeyStroke { key, press }
    }

    #[test]
    fn disabled_monitor_records_nothing() {
        let (mut m, indicator) = monitor(50, false);
        assert!(!press(&mut m, Key::A, true));
        assert!(!press(&mut m, Key::A, false));
        assert!(m.history.is_empty());
        assert!(indicator.shown().is_empty());
    }

    #[test]
    fn down_then_up_merges_into_one_full_press() {
        let (mut m, _) = monitor(50, true);
        press(&mut m, Key::A, true);
        press(&mut m, Key::A, false);
        assert_eq!(history(&m), vec![stroke(Key::A, Press::Full)]);
    }

    #[test]
    fn interleaved_keys_are_not_merged() {
        let (mut m, _) = monitor(50, true);
        press(&mut m, Key::LShift, true);
        press(&mut m, Key::A, true);
        press(&mut m, Key::LShift, false);
        press(&mut m, Key::A, false);
        assert_eq!(
            history(&m),
            vec![
                stroke(Key::LShift, Press::Down),
                stroke(Key::A, Press::Down),
                stroke(Key::LShift, Press::Up),
                stroke(Key::A, Press::Up),
            ]
        );
    }

    #[test]
    fn autorepeat_changes_nothing() {
        let (mut m, indicator) = monitor(50, true);
        press(&mut m, Key::B, true);
        let before = history(&m);
        let displays = indicator.shown().len();

        for _ in 0..5 {
            assert!(!press(&mut m, Key::B, true));
        }
        assert_eq!(history(&m), before);
        assert_eq!(m.held.get(&Key::B), Some(&true));
        assert_eq!(indicator.shown().len(), displays);
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let (mut m, _) = monitor(3, true);
        for key in [Key::A, Key::B, Key::C, Key::D] {
            press(&mut m, key, true);
        }
        let keys: Vec<Key> = history(&m).iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![Key::B, Key::C, Key::D]);
    }

    #[test]
    fn redisplay_sends_newest_first() {
        let (mut m, indicator) = monitor(50, true);
        press(&mut m, Key::A, true);
        press(&mut m, Key::A, false);
        press(&mut m, Key::B, false);
        let last = indicator.shown().pop().unwrap();
        assert_eq!(
            last,
            PopupContent::Keys(vec![stroke(Key::B, Press::Up), stroke(Key::A, Press::Full)])
        );
    }

    #[test]
    fn toggle_is_claimed_and_never_recorded() {
        let (mut m, _) = monitor(50, false);
        toggle(&mut m);
        assert!(m.enabled);
        assert!(m.history.is_empty());
        toggle(&mut m);
        assert!(!m.enabled);
    }

    #[test]
    fn toggle_off_clears_history_and_hides() {
        let (mut m, indicator) = monitor(50, false);
        toggle(&mut m);
        press(&mut m, Key::A, true);
        press(&mut m, Key::C, true);
        toggle(&mut m);
        assert_eq!(indicator.hides(), 1);

        toggle(&mut m);
        assert!(m.history.is_empty());
        assert!(m.held.is_empty());
        // C's stale down-state must not swallow the next press as autorepeat.
        press(&mut m, Key::C, true);
        assert_eq!(history(&m), vec![stroke(Key::C, Press::Down)]);
    }

    /// Switches the monitor off (from the indicator's point of view) mid-paint.
    struct SwitchedOffWhilePainting {
        generation: Arc<AtomicU64>,
        inner: RecordingIndicator,
    }

    impl Indicator for SwitchedOffWhilePainting {
        fn display(&self, content: PopupContent) {
            self.inner.display(content);
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        fn hide(&self) {
            self.inner.hide();
        }
    }

    #[test]
    fn redisplay_queued_before_toggle_off_is_dropped() {
        let (m, indicator) = monitor(50, true);
        let queued_at = m.generation.load(Ordering::SeqCst);
        m.generation.fetch_add(1, Ordering::SeqCst);

        show_strokes(indicator.as_ref(), &m.generation, queued_at, vec![stroke(Key::A, Press::Down)]);
        assert!(indicator.shown().is_empty());
        assert_eq!(indicator.hides(), 0);
    }

    #[test]
    fn toggle_off_during_paint_hides_the_stale_frame() {
        let generation = Arc::new(AtomicU64::new(3));
        let indicator = SwitchedOffWhilePainting {
            generation: Arc::clone(&generation),
            inner: RecordingIndicator::default(),
        };

        show_strokes(&indicator, &generation, 3, vec![stroke(Key::A, Press::Down)]);
        assert_eq!(indicator.inner.shown().len(), 1);
        assert_eq!(indicator.inner.hides(), 1);
    }

    #[test]
    fn toggle_off_bumps_the_generation_only_when_switching_off() {
        let (mut m, _) = monitor(50, false);
        toggle(&mut m);
        assert_eq!(m.generation.load(Ordering::SeqCst), 0);
        toggle(&mut m);
        assert_eq!(m.generation.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recorded_keys_are_never_claimed() {
        let (mut m, _) = monitor(50, true);
        assert!(!m.handle_key(&"Ctrl+C".parse().unwrap(), true));
        assert!(!m.handle_key(&"Ctrl+C".parse().unwrap(), false));
        assert_eq!(history(&m), vec![stroke(Key::C, Press::Full)]);
    }
}
