//! Overlay host: a dedicated thread that owns every popup window.
//!
//! Modules never touch a window directly.  They hold an [`Indicator`] that posts
//! commands to the host; `display` blocks the calling worker until the frame is on
//! screen, `hide` only posts.
//!
//! Off Windows the host runs headless: popups paint into recorded scenes and the
//! loop is a `recv_timeout` on the command channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, warn};

use super::canvas::Canvas;
use super::painters::{Painter, PopupContent};
use super::popup::{ClickPolicy, Popup, PopupStyle};
use super::position::ScreenTopology;
use super::surface::{Surface, SurfaceFactory};

/// Auto-hide check interval.
pub const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupId(pub(super) usize);

pub(super) enum Command {
    Create {
        style: PopupStyle,
        painter: Painter,
        reply: mpsc::SyncSender<anyhow::Result<PopupId>>,
    },
    Display {
        id: PopupId,
        content: PopupContent,
        done: mpsc::SyncSender<()>,
    },
    Hide {
        id: PopupId,
    },
    Shutdown,
}

/// Something a module can show feedback on.
pub trait Indicator: Send + Sync {
    /// Shows `content`, restarting the auto-hide countdown.  Blocks until painted.
    fn display(&self, content: PopupContent);

    /// Hides the popup without waiting.
    fn hide(&self);
}

/// Cloneable, thread-safe handle to the overlay host.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    tx: Sender<Command>,
    /// Win32 thread id of the host, `0` when headless.
    #[cfg_attr(not(windows), allow(dead_code))]
    thread_id: u32,
}

impl OverlayHandle {
    /// Creates a hidden popup on the host thread.
    pub fn create_popup(&self, style: PopupStyle, painter: Painter) -> anyhow::Result<PopupId> {
        let (reply, rx) = mpsc::sync_channel(1);
        self.send(Command::Create { style, painter, reply })?;
        rx.recv().context("overlay host exited before creating the popup")?
    }

    pub fn indicator(&self, id: PopupId) -> Arc<dyn Indicator> {
        Arc::new(PopupIndicator { overlay: self.clone(), id })
    }

    fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("overlay host is not running"))?;
        self.wake();
        Ok(())
    }

    fn wake(&self) {
        #[cfg(windows)]
        if self.thread_id != 0 {
            super::window::wake(self.thread_id);
        }
    }
}

struct PopupIndicator {
    overlay: OverlayHandle,
    id: PopupId,
}

impl Indicator for PopupIndicator {
    fn display(&self, content: PopupContent) {
        let (done, rx) = mpsc::sync_channel(1);
        if let Err(e) = self.overlay.send(Command::Display { id: self.id, content, done }) {
            debug!(error = %e, "display dropped");
            return;
        }
        // An error here means the host shut down mid-request.
        let _ = rx.recv();
    }

    fn hide(&self) {
        if let Err(e) = self.overlay.send(Command::Hide { id: self.id }) {
            debug!(error = %e, "hide dropped");
        }
    }
}

struct Slot {
    popup: Popup,
    surface: Box<dyn Surface>,
}

/// Everything the host thread owns.  Lives and dies on that thread.
pub(super) struct HostState {
    slots: Vec<Slot>,
    topology: Arc<dyn ScreenTopology>,
    factory: Box<dyn SurfaceFactory>,
}

impl HostState {
    pub(super) fn new(topology: Arc<dyn ScreenTopology>, factory: Box<dyn SurfaceFactory>) -> Self {
        Self { slots: Vec::new(), topology, factory }
    }

    /// Applies one command.  Returns `false` on shutdown.
    pub(super) fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Create { style, painter, reply } => {
                let _ = reply.send(self.create(style, painter));
            }
            Command::Display { id, content, done } => {
                self.display(id, content);
                let _ = done.send(());
            }
            Command::Hide { id } => self.hide(id),
            Command::Shutdown => return false,
        }
        true
    }

    /// Hides every popup whose deadline has passed.
    pub(super) fn tick(&mut self, now: Instant) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.popup.expire(now) {
                debug!(popup = i, "auto-hide");
                slot.surface.hide();
            }
        }
    }

    /// A mouse click landed on the popup's window.
    #[cfg_attr(not(any(windows, test)), allow(dead_code))]
    pub(super) fn clicked(&mut self, id: PopupId) {
        let dismiss = self
            .slots
            .get(id.0)
            .is_some_and(|slot| slot.popup.click() == ClickPolicy::Dismiss);
        if dismiss {
            debug!(popup = id.0, "dismissed by click");
            self.hide(id);
        }
    }

    fn create(&mut self, style: PopupStyle, painter: Painter) -> anyhow::Result<PopupId> {
        let id = PopupId(self.slots.len());
        let surface = self.factory.create(id.0, style.click)?;
        self.slots.push(Slot { popup: Popup::new(style, painter), surface });
        Ok(id)
    }

    fn display(&mut self, id: PopupId, content: PopupContent) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            warn!(popup = id.0, "display for unknown popup");
            return;
        };
        if !slot.popup.apply(content) {
            warn!(popup = id.0, "content does not match the popup kind; ignored");
            return;
        }
        let Some(frame) = slot.popup.layout(self.topology.as_ref(), slot.surface.metrics()) else {
            warn!(popup = id.0, "no screen attached; popup not shown");
            return;
        };

        let popup = &slot.popup;
        if let Err(e) = slot
            .surface
            .present(&frame, &|canvas: &mut dyn Canvas| popup.paint(canvas, frame.logical))
        {
            warn!(popup = id.0, error = %e, "repaint failed; previous frame kept");
        }
        slot.surface.show();
        slot.popup.arm(Instant::now());
    }

    fn hide(&mut self, id: PopupId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.popup.disarm();
            slot.surface.hide();
        }
    }
}

/// Running overlay host thread.
pub struct OverlayHost {
    handle: OverlayHandle,
    thread: Option<JoinHandle<()>>,
}

impl OverlayHost {
    /// Starts the host with native windows where available, headless otherwise.
    pub fn spawn(topology: Arc<dyn ScreenTopology>) -> anyhow::Result<Self> {
        #[cfg(windows)]
        {
            super::window::spawn(topology)
        }
        #[cfg(not(windows))]
        {
            Self::spawn_headless(topology, Box::new(super::surface::HeadlessFactory::default()))
        }
    }

    #[cfg_attr(windows, allow(dead_code))]
    pub fn spawn_headless(
        topology: Arc<dyn ScreenTopology>,
        factory: Box<dyn SurfaceFactory + Send>,
    ) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("overlay".into())
            .spawn(move || run_headless(rx, HostState::new(topology, factory)))
            .context("spawning overlay host thread")?;
        info!("overlay host started (headless)");
        Ok(Self::from_parts(OverlayHandle { tx, thread_id: 0 }, thread))
    }

    pub(super) fn from_parts(handle: OverlayHandle, thread: JoinHandle<()>) -> Self {
        Self { handle, thread: Some(thread) }
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    pub(super) fn handle_for(tx: Sender<Command>, thread_id: u32) -> OverlayHandle {
        OverlayHandle { tx, thread_id }
    }

    pub fn handle(&self) -> OverlayHandle {
        self.handle.clone()
    }

    /// Destroys every popup and joins the host thread.
    pub fn stop(mut self) {
        let _ = self.handle.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("overlay host stopped");
    }
}

fn run_headless(rx: Receiver<Command>, mut state: HostState) {
    loop {
        match rx.recv_timeout(TICK) {
            Ok(cmd) => {
                if !state.handle(cmd) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        state.tick(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::canvas::DrawOp;
    use crate::overlay::painters::{BarPopup, TextPopup, TEXT_POPUP_SIZE};
    use crate::overlay::position::StaticTopology;
    use crate::overlay::popup::Frame;
    use crate::overlay::surface::{HeadlessFactory, SurfaceEvent, SurfaceLog};

    /// Surfaces whose every repaint fails; showing and hiding still work.
    struct BrokenFactory(HeadlessFactory);

    struct BrokenSurface(Box<dyn Surface>);

    impl SurfaceFactory for BrokenFactory {
        fn create(&mut self, id: usize, click: ClickPolicy) -> anyhow::Result<Box<dyn Surface>> {
            Ok(Box::new(BrokenSurface(self.0.create(id, click)?)))
        }
    }

    impl Surface for BrokenSurface {
        fn present(&mut self, _frame: &Frame, _paint: &dyn Fn(&mut dyn Canvas)) -> anyhow::Result<()> {
            anyhow::bail!("UpdateLayeredWindow failed")
        }

        fn show(&mut self) {
            self.0.show();
        }

        fn hide(&mut self) {
            self.0.hide();
        }

        fn metrics(&self) -> &dyn crate::overlay::canvas::TextMeasure {
            self.0.metrics()
        }
    }

    fn text_painter(style: &PopupStyle) -> Painter {
        Painter::Text(TextPopup::new(style.look(12.0), TEXT_POPUP_SIZE))
    }

    fn state(log: &SurfaceLog) -> HostState {
        HostState::new(
            Arc::new(StaticTopology::single(1920, 1080)),
            Box::new(HeadlessFactory::recording(log.clone())),
        )
    }

    fn create(state: &mut HostState, style: PopupStyle, painter: Painter) -> PopupId {
        let (reply, rx) = mpsc::sync_channel(1);
        assert!(state.handle(Command::Create { style, painter, reply }));
        rx.recv().unwrap().unwrap()
    }

    fn display(state: &mut HostState, id: PopupId, content: PopupContent) {
        let (done, rx) = mpsc::sync_channel(1);
        assert!(state.handle(Command::Display { id, content, done }));
        rx.recv().unwrap();
    }

    fn count(log: &SurfaceLog, pred: impl Fn(&SurfaceEvent) -> bool) -> usize {
        log.events().iter().filter(|e| pred(e)).count()
    }

    // ── host state ────────────────────────────────────────────────────────────

    #[test]
    fn display_paints_then_shows() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle::default();
        let id = create(&mut state, style.clone(), text_painter(&style));

        display(&mut state, id, PopupContent::Caption("EN".into()));

        let events = log.events();
        assert!(matches!(events[0], SurfaceEvent::Created { surface: 0, .. }));
        let SurfaceEvent::Presented { frame, ops, .. } = &events[1] else {
            panic!("expected a frame, got {:?}", events[1]);
        };
        assert_eq!(frame.left, 860);
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Text { text, .. } if text == "EN")));
        assert_eq!(events[2], SurfaceEvent::Shown { surface: 0 });
    }

    #[test]
    fn tick_hides_once_after_the_timeout() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle::default();
        let id = create(&mut state, style.clone(), text_painter(&style));
        display(&mut state, id, PopupContent::Caption("EN".into()));

        let now = Instant::now();
        state.tick(now);
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 0);

        state.tick(now + Duration::from_secs(2));
        state.tick(now + Duration::from_secs(3));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);
    }

    #[test]
    fn hide_command_cancels_the_timer() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle::default();
        let id = create(&mut state, style.clone(), text_painter(&style));
        display(&mut state, id, PopupContent::Caption("EN".into()));

        assert!(state.handle(Command::Hide { id }));
        state.tick(Instant::now() + Duration::from_secs(5));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);
    }

    #[test]
    fn mismatched_content_is_not_painted() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle::default();
        let bar = Painter::Bar(BarPopup::new(style.look(12.0), "Brightness"));
        let id = create(&mut state, style, bar);

        display(&mut state, id, PopupContent::Keys(Vec::new()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Presented { .. })), 0);
    }

    #[test]
    fn no_screens_means_no_frame() {
        let log = SurfaceLog::default();
        let mut topo = StaticTopology::single(1920, 1080);
        topo.screens.clear();
        let mut state = HostState::new(Arc::new(topo), Box::new(HeadlessFactory::recording(log.clone())));
        let style = PopupStyle::default();
        let id = create(&mut state, style.clone(), text_painter(&style));

        display(&mut state, id, PopupContent::Caption("EN".into()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Presented { .. })), 0);
    }

    #[test]
    fn failed_repaint_still_shows_and_auto_hides() {
        let log = SurfaceLog::default();
        let mut state = HostState::new(
            Arc::new(StaticTopology::single(1920, 1080)),
            Box::new(BrokenFactory(HeadlessFactory::recording(log.clone()))),
        );
        let style = PopupStyle::default();
        let id = create(&mut state, style.clone(), text_painter(&style));

        display(&mut state, id, PopupContent::Caption("EN".into()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Presented { .. })), 0);
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Shown { .. })), 1);

        let now = Instant::now();
        state.tick(now);
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 0);
        state.tick(now + Duration::from_secs(2));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);
    }

    #[test]
    fn dismiss_click_hides_and_cancels_the_timer() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle { click: ClickPolicy::Dismiss, ..PopupStyle::default() };
        let id = create(&mut state, style.clone(), text_painter(&style));
        display(&mut state, id, PopupContent::Caption("EN".into()));

        state.clicked(id);
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);

        // The pending deadline must not hide (or re-show) anything later.
        state.tick(Instant::now() + Duration::from_secs(5));
        display(&mut state, id, PopupContent::Caption("DE".into()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Shown { .. })), 2);
    }

    #[test]
    fn clicks_on_other_popups_are_ignored() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        let style = PopupStyle { click: ClickPolicy::Move, ..PopupStyle::default() };
        let id = create(&mut state, style.clone(), text_painter(&style));
        display(&mut state, id, PopupContent::Caption("EN".into()));

        state.clicked(id);
        state.clicked(PopupId(9));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 0);
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let log = SurfaceLog::default();
        let mut state = state(&log);
        assert!(!state.handle(Command::Shutdown));
    }

    // ── host thread ───────────────────────────────────────────────────────────

    #[test]
    fn headless_host_auto_hides_from_its_own_timer() {
        let log = SurfaceLog::default();
        let host = OverlayHost::spawn_headless(
            Arc::new(StaticTopology::single(1920, 1080)),
            Box::new(HeadlessFactory::recording(log.clone())),
        )
        .unwrap();
        let handle = host.handle();

        let style = PopupStyle { timeout: 0.05, ..PopupStyle::default() };
        let painter = text_painter(&style);
        let indicator = handle.indicator(handle.create_popup(style, painter).unwrap());

        indicator.display(PopupContent::Caption("EN".into()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Shown { .. })), 1);

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);

        host.stop();
        assert!(handle.create_popup(PopupStyle::default(), text_painter(&PopupStyle::default())).is_err());
    }

    #[test]
    fn host_thread_survives_failed_repaints() {
        let log = SurfaceLog::default();
        let host = OverlayHost::spawn_headless(
            Arc::new(StaticTopology::single(1920, 1080)),
            Box::new(BrokenFactory(HeadlessFactory::recording(log.clone()))),
        )
        .unwrap();
        let handle = host.handle();

        let style = PopupStyle { timeout: 0.05, ..PopupStyle::default() };
        let painter = text_painter(&style);
        let indicator = handle.indicator(handle.create_popup(style, painter).unwrap());

        indicator.display(PopupContent::Caption("EN".into()));
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Hidden { .. })), 1);

        // Still serving commands after the failures.
        indicator.display(PopupContent::Caption("DE".into()));
        assert_eq!(count(&log, |e| matches!(e, SurfaceEvent::Shown { .. })), 2);
        assert!(handle.create_popup(PopupStyle::default(), text_painter(&PopupStyle::default())).is_ok());
        host.stop();
    }
}
