//! Live monitor topology for the position resolver.

use std::mem;

use windows::core::BOOL;
use windows::Win32::Foundation::{LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, HDC, HMONITOR, MONITORINFO,
    MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::UI::HiDpi::{
    GetDpiForMonitor, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    MDT_EFFECTIVE_DPI,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, GetForegroundWindow, GetWindowRect};

use crate::overlay::{Screen, ScreenRect, ScreenTopology};

const MONITORINFOF_PRIMARY: u32 = 1;
const DEFAULT_DPI: u32 = 96;

/// Opts the process into per-monitor DPI awareness so window rectangles and
/// monitor bounds are reported in physical pixels.
pub fn enable_dpi_awareness() {
    if let Err(e) = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
        // Already set by a manifest or an earlier call.
        tracing::debug!("SetProcessDpiAwarenessContext: {e}");
    }
}

fn rect(rc: RECT) -> ScreenRect {
    ScreenRect::new(rc.left, rc.top, rc.right - rc.left, rc.bottom - rc.top)
}

unsafe extern "system" fn collect_screen(
    monitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let screens = &mut *(data.0 as *mut Vec<Screen>);
    let mut info = MONITORINFO { cbSize: mem::size_of::<MONITORINFO>() as u32, ..Default::default() };
    if GetMonitorInfoW(monitor, &mut info).as_bool() {
        screens.push(Screen {
            bounds: rect(info.rcMonitor),
            work_area: rect(info.rcWork),
            is_primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
        });
    }
    BOOL(1)
}

/// Queries the desktop on every call; nothing is cached.
pub struct SystemTopology;

impl ScreenTopology for SystemTopology {
    fn all_screens(&self) -> Vec<Screen> {
        let mut screens: Vec<Screen> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                None,
                None,
                Some(collect_screen),
                LPARAM(&mut screens as *mut Vec<Screen> as isize),
            );
        }
        screens
    }

    fn foreground_window_bounds(&self) -> Option<ScreenRect> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_invalid() {
                return None;
            }
            let mut rc = RECT::default();
            GetWindowRect(hwnd, &mut rc).ok()?;
            Some(rect(rc))
        }
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }.ok()?;
        Some((point.x, point.y))
    }

    fn dpi_for_screen(&self, screen: &Screen) -> u32 {
        let (x, y) = screen.bounds.center();
        let (mut dpi_x, mut dpi_y) = (0u32, 0u32);
        unsafe {
            let monitor = MonitorFromPoint(POINT { x, y }, MONITOR_DEFAULTTONEAREST);
            match GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) {
                Ok(()) if dpi_x > 0 => dpi_x,
                _ => DEFAULT_DPI,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn there_is_exactly_one_primary_screen() {
        let screens = SystemTopology.all_screens();
        assert_eq!(screens.iter().filter(|s| s.is_primary).count(), 1);
    }

    #[test]
    fn dpi_is_never_zero() {
        let topo = SystemTopology;
        for screen in topo.all_screens() {
            assert!(topo.dpi_for_screen(&screen) >= DEFAULT_DPI / 2);
        }
    }
}
