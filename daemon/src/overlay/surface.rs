// Headless surfaces only run off Windows and in tests.
#![cfg_attr(all(windows, not(test)), allow(dead_code))]

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::canvas::{Canvas, DrawOp, FixedMetrics, SceneCanvas, TextMeasure};
use super::popup::{ClickPolicy, Frame};

/// A top-level, non-activating overlay window.
///
/// Every method is called on the overlay host thread.
pub trait Surface {
    /// Moves, resizes and repaints in one step.  On error the previous frame stays
    /// on screen.
    fn present(&mut self, frame: &Frame, paint: &dyn Fn(&mut dyn Canvas)) -> anyhow::Result<()>;
    fn show(&mut self);
    fn hide(&mut self);
    fn metrics(&self) -> &dyn TextMeasure;
}

pub trait SurfaceFactory {
    /// Creates the hidden surface for popup number `id`.
    fn create(&mut self, id: usize, click: ClickPolicy) -> anyhow::Result<Box<dyn Surface>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Created { surface: usize, click: ClickPolicy },
    Presented { surface: usize, frame: Frame, ops: Vec<DrawOp> },
    Shown { surface: usize },
    Hidden { surface: usize },
}

/// Shared record of what headless surfaces were asked to do.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog(Arc<Mutex<Vec<SurfaceEvent>>>);

impl SurfaceLog {
    #[cfg(test)]
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, event: SurfaceEvent) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Creates surfaces that paint into a [`SceneCanvas`] instead of a window.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    log: Option<SurfaceLog>,
}

impl HeadlessFactory {
    #[cfg(test)]
    pub fn recording(log: SurfaceLog) -> Self {
        Self { log: Some(log) }
    }
}

impl SurfaceFactory for HeadlessFactory {
    fn create(&mut self, id: usize, click: ClickPolicy) -> anyhow::Result<Box<dyn Surface>> {
        if let Some(log) = &self.log {
            log.push(SurfaceEvent::Created { surface: id, click });
        }
        Ok(Box::new(HeadlessSurface { id, log: self.log.clone(), visible: false }))
    }
}

struct HeadlessSurface {
    id: usize,
    log: Option<SurfaceLog>,
    visible: bool,
}

impl HeadlessSurface {
    fn record(&self, event: SurfaceEvent) {
        if let Some(log) = &self.log {
            log.push(event);
        }
    }
}

impl Surface for HeadlessSurface {
    fn present(&mut self, frame: &Frame, paint: &dyn Fn(&mut dyn Canvas)) -> anyhow::Result<()> {
        let mut canvas = SceneCanvas::new();
        paint(&mut canvas);
        debug!(
            surface = self.id,
            left = frame.left,
            top = frame.top,
            width = frame.width,
            height = frame.height,
            ops = canvas.ops().len(),
            "headless frame"
        );
        self.record(SurfaceEvent::Presented { surface: self.id, frame: *frame, ops: canvas.into_ops() });
        Ok(())
    }

    fn show(&mut self) {
        if !self.visible {
            self.visible = true;
            self.record(SurfaceEvent::Shown { surface: self.id });
        }
    }

    fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.record(SurfaceEvent::Hidden { surface: self.id });
        }
    }

    fn metrics(&self) -> &dyn TextMeasure {
        &FixedMetrics
    }
}
