/// Global keyboard listener using a low-level Windows keyboard hook (`WH_KEYBOARD_LL`).
///
/// The hook runs on a dedicated OS thread with its own Windows message pump.  Every
/// key transition is turned into a [`Hotkey`] (the key plus the modifiers held after
/// applying it) and run through the dispatch chain synchronously; a claimed
/// transition is swallowed so no other application sees it.
///
/// On non-Windows platforms the public API compiles but is a no-op at runtime.
use tokio::sync::mpsc;

use crate::dispatch::Dispatcher;
use crate::event::DaemonEvent;
use crate::hotkey::{Hotkey, Modifiers};
use crate::key::Key;

/// Tracks which modifier keys are held from the stream of transitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModifierTracker {
    lctrl: bool,
    rctrl: bool,
    lalt: bool,
    ralt: bool,
    lshift: bool,
    rshift: bool,
    lwin: bool,
    rwin: bool,
}

impl ModifierTracker {
    pub fn apply(&mut self, key: Key, down: bool) {
        let slot = match key {
            Key::LCtrl | Key::Ctrl => &mut self.lctrl,
            Key::RCtrl => &mut self.rctrl,
            Key::LAlt | Key::Alt => &mut self.lalt,
            Key::RAlt => &mut self.ralt,
            Key::LShift | Key::Shift => &mut self.lshift,
            Key::RShift => &mut self.rshift,
            Key::LWin => &mut self.lwin,
            Key::RWin => &mut self.rwin,
            _ => return,
        };
        *slot = down;
    }

    pub fn current(&self) -> Modifiers {
        Modifiers {
            ctrl: self.lctrl || self.rctrl,
            alt: self.lalt || self.ralt,
            shift: self.lshift || self.rshift,
            win: self.lwin || self.rwin,
        }
    }
}

/// Everything the hook callback needs: modifier state and the dispatch chain.
pub struct KeyPipeline {
    modifiers: ModifierTracker,
    dispatcher: Dispatcher,
}

impl KeyPipeline {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { modifiers: ModifierTracker::default(), dispatcher }
    }

    /// Feeds one transition through the chain.  Returns `true` if it was claimed.
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn on_key(&mut self, key: Key, down: bool) -> bool {
        self.modifiers.apply(key, down);
        let hotkey = Hotkey::new(key, self.modifiers.current());
        self.dispatcher.dispatch(hotkey, down)
    }
}

/// Maps a raw hook event to a key.  Enter with the extended flag is the keypad Enter.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn translate(vk: u32, extended: bool) -> Option<Key> {
    if extended && vk == Key::Enter.vk() {
        Some(Key::NumEnter)
    } else {
        Key::from_vk(vk)
    }
}

// ── Public handle ─────────────────────────────────────────────────────────────

/// A handle to the running keyboard hook.
pub struct HookHandle {
    #[cfg(windows)]
    thread: std::thread::JoinHandle<()>,
    /// Thread ID of the message-pump thread, used to post `WM_QUIT`.
    #[cfg(windows)]
    thread_id: u32,
}

impl HookHandle {
    /// Signals the hook thread to stop and blocks until it exits.
    pub fn stop(self) {
        #[cfg(windows)]
        {
            imp::post_quit(self.thread_id);
            let _ = self.thread.join();
        }
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

/// Installs a `WH_KEYBOARD_LL` keyboard hook on a dedicated OS thread that feeds
/// every key transition to `pipeline`, and returns a [`HookHandle`] for stopping it.
///
/// If the pump ends on its own, [`DaemonEvent::HookExited`] is sent to `tx`.
///
/// # Non-Windows
/// Returns a stub handle; nothing is ever dispatched.
pub fn start(pipeline: KeyPipeline, tx: mpsc::Sender<DaemonEvent>) -> anyhow::Result<HookHandle> {
    #[cfg(windows)]
    {
        use anyhow::Context;

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<u32, String>>(1);
        let thread = std::thread::Builder::new()
            .name("hotkey-pump".into())
            .spawn(move || imp::run_message_pump(pipeline, ready_tx, tx))
            .context("Failed to spawn hook thread")?;
        let thread_id = ready_rx
            .recv()
            .context("hook thread exited during startup")?
            .map_err(anyhow::Error::msg)
            .context("SetWindowsHookExW failed")?;
        tracing::info!(thread_id, "keyboard hook installed");
        Ok(HookHandle { thread, thread_id })
    }

    #[cfg(not(windows))]
    {
        drop((pipeline, tx));
        tracing::warn!("keyboard hook is only available on Windows; no keys will be dispatched");
        Ok(HookHandle {})
    }
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc as std_mpsc;

    use tokio::sync::mpsc;
    use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
        SetWindowsHookExW, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, LLKHF_EXTENDED, MSG,
        PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
        WM_USER,
    };

    use super::{translate, KeyPipeline};
    use crate::event::DaemonEvent;

    thread_local! {
        /// Owned by the pump thread; the hook callback runs on that same thread.
        static PIPELINE: RefCell<Option<KeyPipeline>> = const { RefCell::new(None) };
    }

    /// Set before `WM_QUIT` is posted so an intentional stop is not reported.
    static STOPPING: AtomicBool = AtomicBool::new(false);

    /// Low-level keyboard hook procedure.
    ///
    /// Called by Windows on every keyboard event system-wide.  Returning a non-zero
    /// value without calling the next hook swallows the event.
    unsafe extern "system" fn keyboard_proc(
        n_code: i32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        if n_code >= 0 {
            let kb = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
            let msg = w_param.0 as u32;
            let down = msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN;
            let up = msg == WM_KEYUP || msg == WM_SYSKEYUP;
            if down || up {
                let extended = kb.flags.0 & LLKHF_EXTENDED.0 != 0;
                if let Some(key) = translate(kb.vkCode, extended) {
                    let consumed = PIPELINE.with(|p| match p.try_borrow_mut() {
                        Ok(mut p) => p.as_mut().is_some_and(|p| p.on_key(key, down)),
                        Err(_) => false,
                    });
                    if consumed {
                        return LRESULT(1);
                    }
                }
            }
        }
        CallNextHookEx(None, n_code, w_param, l_param)
    }

    /// Installs `WH_KEYBOARD_LL`, runs a Windows message pump until `WM_QUIT`,
    /// then uninstalls the hook.
    ///
    /// Reports the thread ID (or the install error) on `ready` before entering the
    /// pump so that [`super::start`] can later use it to post `WM_QUIT`.
    pub fn run_message_pump(
        pipeline: KeyPipeline,
        ready: std_mpsc::SyncSender<Result<u32, String>>,
        tx: mpsc::Sender<DaemonEvent>,
    ) {
        unsafe {
            PIPELINE.with(|p| *p.borrow_mut() = Some(pipeline));

            let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) {
                Ok(hook) => hook,
                Err(e) => {
                    let _ = ready.send(Err(e.to_string()));
                    return;
                }
            };

            // Make sure the thread has a message queue before WM_QUIT can be posted.
            let mut msg = MSG::default();
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
            let _ = ready.send(Ok(GetCurrentThreadId()));
            drop(ready);

            // GetMessageW: >0 = message, 0 = WM_QUIT, <0 = error.
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                DispatchMessageW(&msg);
            }

            let _ = UnhookWindowsHookEx(hook);
            PIPELINE.with(|p| p.borrow_mut().take());
        }

        if STOPPING.load(Ordering::SeqCst) {
            tracing::info!("keyboard hook removed");
        } else {
            tracing::error!("hook message pump ended unexpectedly");
            let _ = tx.try_send(DaemonEvent::HookExited);
        }
    }

    /// Posts `WM_QUIT` to `thread_id`, causing its `GetMessageW` loop to exit.
    pub fn post_quit(thread_id: u32) {
        STOPPING.store(true, Ordering::SeqCst);
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::ScriptedModule;
    use crate::modules::Module;

    fn pipeline(modules: Vec<Box<dyn Module>>) -> KeyPipeline {
        KeyPipeline::new(Dispatcher::new(modules))
    }

    // ── modifier tracking ─────────────────────────────────────────────────────

    #[test]
    fn modifiers_reflect_state_after_the_event() {
        let mut m = ModifierTracker::default();
        m.apply(Key::LCtrl, true);
        assert!(m.current().ctrl);
        m.apply(Key::LCtrl, false);
        assert!(m.current().is_empty());
    }

    #[test]
    fn left_and_right_are_merged() {
        let mut m = ModifierTracker::default();
        m.apply(Key::LShift, true);
        m.apply(Key::RShift, true);
        m.apply(Key::LShift, false);
        assert!(m.current().shift, "right shift still held");
        m.apply(Key::RShift, false);
        assert!(!m.current().shift);
    }

    #[test]
    fn non_modifiers_leave_state_alone() {
        let mut m = ModifierTracker::default();
        m.apply(Key::RWin, true);
        m.apply(Key::A, true);
        m.apply(Key::A, false);
        assert_eq!(m.current(), Modifiers { win: true, ..Modifiers::NONE });
    }

    // ── translate ─────────────────────────────────────────────────────────────

    #[test]
    fn extended_enter_is_the_keypad_enter() {
        assert_eq!(translate(13, false), Some(Key::Enter));
        assert_eq!(translate(13, true), Some(Key::NumEnter));
        assert_eq!(translate(Key::Right.vk(), true), Some(Key::Right));
        assert_eq!(translate(0xFF, false), None);
    }

    // ── pipeline ──────────────────────────────────────────────────────────────

    #[test]
    fn pipeline_dispatches_the_combined_hotkey() {
        let target: Hotkey = "Ctrl+Alt+K".parse().unwrap();
        let (module, seen) = ScriptedModule::claiming(target);
        let mut p = pipeline(vec![Box::new(module)]);

        assert!(!p.on_key(Key::LCtrl, true));
        assert!(!p.on_key(Key::LAlt, true));
        assert!(p.on_key(Key::K, true));
        assert!(!p.on_key(Key::LAlt, false));
        // K released with only Ctrl held is a different hotkey.
        assert!(!p.on_key(Key::K, false));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[2], (target, true));
        assert_eq!(seen[4].0.to_string(), "Ctrl+K");
    }
}
