//! Win32 overlay host: one layered window per popup, painted with Direct2D into a
//! 32-bpp DIB and pushed to the desktop with `UpdateLayeredWindow`.
//!
//! The host thread runs a plain message loop.  Commands arrive on an mpsc channel
//! and a posted `WM_APP_WAKE` tells the loop to drain it; a thread timer drives the
//! auto-hide tick.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{
    COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, SIZE, WPARAM,
};
use windows::Win32::Graphics::Direct2D::Common::{
    D2D1_ALPHA_MODE_PREMULTIPLIED, D2D1_COLOR_F, D2D1_PIXEL_FORMAT, D2D_RECT_F,
};
use windows::Win32::Graphics::Direct2D::{
    D2D1CreateFactory, ID2D1DCRenderTarget, ID2D1Factory, ID2D1RenderTarget,
    ID2D1SolidColorBrush, D2D1_ANTIALIAS_MODE_ALIASED, D2D1_DRAW_TEXT_OPTIONS_NONE,
    D2D1_FACTORY_TYPE_SINGLE_THREADED, D2D1_RENDER_TARGET_PROPERTIES,
    D2D1_RENDER_TARGET_TYPE_DEFAULT, D2D1_RENDER_TARGET_USAGE_NONE,
};
use windows::Win32::Graphics::DirectWrite::{
    DWriteCreateFactory, IDWriteFactory, IDWriteTextLayout, DWRITE_FACTORY_TYPE_SHARED,
    DWRITE_FONT_STRETCH_NORMAL, DWRITE_FONT_STYLE_NORMAL, DWRITE_FONT_WEIGHT_NORMAL,
    DWRITE_TEXT_METRICS, DWRITE_WORD_WRAPPING_NO_WRAP,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_B8G8R8A8_UNORM;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject,
    BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DIB_RGB_COLORS, HDC,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetWindowLongPtrW, KillTimer, LoadCursorW, PeekMessageW, PostThreadMessageW, RegisterClassW,
    SetTimer, SetWindowLongPtrW, SetWindowPos, ShowWindow, TranslateMessage, UpdateLayeredWindow,
    GWLP_USERDATA, HWND_TOPMOST, IDC_ARROW, MSG, PM_NOREMOVE, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOSIZE, SW_HIDE, SW_SHOWNOACTIVATE, ULW_ALPHA, WM_APP, WM_LBUTTONUP, WM_MOUSEACTIVATE,
    WM_NCHITTEST, WM_TIMER, WM_USER, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows_numerics::Vector2;

use super::canvas::{Canvas, FixedMetrics, Font, Rect, TextMeasure, TextSize};
use super::color::Color;
use super::host::{Command, HostState, OverlayHost, PopupId, TICK};
use super::popup::{ClickPolicy, Frame};
use super::position::ScreenTopology;
use super::surface::{Surface, SurfaceFactory};

const WM_APP_WAKE: u32 = WM_APP + 1;
/// Posted by a popup window on a click; `wParam` is the popup id.
const WM_APP_CLICKED: u32 = WM_APP + 2;
const CLASS_NAME: PCWSTR = w!("KeyHudPopup");

const HTCAPTION: isize = 2;
const MA_NOACTIVATE: isize = 3;

// GWLP_USERDATA holds `popup id << 2 | click code`.
const CLICK_THROUGH: isize = 0;
const CLICK_MOVE: isize = 1;
const CLICK_DISMISS: isize = 2;
const CLICK_MASK: isize = 0b11;

/// Nudges the host loop to drain its command channel.
pub(super) fn wake(thread_id: u32) {
    unsafe {
        let _ = PostThreadMessageW(thread_id, WM_APP_WAKE, WPARAM(0), LPARAM(0));
    }
}

pub(super) fn spawn(topology: Arc<dyn ScreenTopology>) -> anyhow::Result<OverlayHost> {
    let (tx, rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, String>>(1);

    let thread = std::thread::Builder::new()
        .name("overlay".into())
        .spawn(move || {
            let factory = match LayeredFactory::new() {
                Ok(f) => f,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("{e:#}")));
                    return;
                }
            };
            // Create the thread's message queue before anyone can post to it.
            unsafe {
                let mut msg = MSG::default();
                let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
            }
            let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));
            run(rx, HostState::new(topology, Box::new(factory)));
        })
        .context("spawning overlay host thread")?;

    let thread_id = ready_rx
        .recv()
        .context("overlay host exited during startup")?
        .map_err(anyhow::Error::msg)
        .context("initialising the overlay renderer")?;

    info!(thread_id, "overlay host started");
    Ok(OverlayHost::from_parts(OverlayHost::handle_for(tx, thread_id), thread))
}

fn run(rx: Receiver<Command>, mut state: HostState) {
    let timer = unsafe { SetTimer(None, 0, TICK.as_millis() as u32, None) };
    let mut msg = MSG::default();

    'pump: loop {
        if unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 <= 0 {
            break;
        }
        if !msg.hwnd.is_invalid() {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            continue;
        }
        match msg.message {
            WM_APP_WAKE | WM_TIMER => {
                // Thread messages are lost during modal loops, so the timer drains too.
                loop {
                    match rx.try_recv() {
                        Ok(cmd) => {
                            if !state.handle(cmd) {
                                break 'pump;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => break 'pump,
                    }
                }
                if msg.message == WM_TIMER {
                    state.tick(Instant::now());
                }
            }
            WM_APP_CLICKED => state.clicked(PopupId(msg.wParam.0)),
            _ => {}
        }
    }

    if timer != 0 {
        unsafe {
            let _ = KillTimer(None, timer);
        }
    }
}

unsafe extern "system" fn popup_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let data = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
    let click = data & CLICK_MASK;
    match msg {
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE),
        WM_NCHITTEST if click == CLICK_MOVE => LRESULT(HTCAPTION),
        WM_LBUTTONUP if click == CLICK_DISMISS => {
            // The host hides the window and drops its pending auto-hide.
            let id = (data >> 2) as usize;
            let _ = PostThreadMessageW(GetCurrentThreadId(), WM_APP_CLICKED, WPARAM(id), LPARAM(0));
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

// ── text ──────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct TextEngine {
    factory: IDWriteFactory,
}

impl TextEngine {
    fn layout(&self, text: &str, font: &Font) -> windows::core::Result<IDWriteTextLayout> {
        let family: Vec<u16> = font.family.encode_utf16().chain(Some(0)).collect();
        let text: Vec<u16> = text.encode_utf16().collect();
        unsafe {
            let format = self.factory.CreateTextFormat(
                PCWSTR(family.as_ptr()),
                None,
                DWRITE_FONT_WEIGHT_NORMAL,
                DWRITE_FONT_STYLE_NORMAL,
                DWRITE_FONT_STRETCH_NORMAL,
                font.pixel_size(),
                w!("en-us"),
            )?;
            format.SetWordWrapping(DWRITE_WORD_WRAPPING_NO_WRAP)?;
            self.factory.CreateTextLayout(&text, &format, f32::MAX, f32::MAX)
        }
    }
}

impl TextMeasure for TextEngine {
    fn measure_text(&self, text: &str, font: &Font) -> TextSize {
        let metrics = self.layout(text, font).and_then(|layout| {
            let mut m = DWRITE_TEXT_METRICS::default();
            unsafe { layout.GetMetrics(&mut m)? };
            Ok(m)
        });
        match metrics {
            Ok(m) => TextSize { width: m.widthIncludingTrailingWhitespace, height: m.height },
            Err(e) => {
                warn!(error = %e, family = %font.family, "text measurement failed; estimating");
                FixedMetrics.measure_text(text, font)
            }
        }
    }
}

// ── surfaces ──────────────────────────────────────────────────────────────────

struct LayeredFactory {
    d2d: ID2D1Factory,
    text: TextEngine,
    instance: HINSTANCE,
}

impl LayeredFactory {
    fn new() -> anyhow::Result<Self> {
        unsafe {
            let d2d: ID2D1Factory = D2D1CreateFactory(D2D1_FACTORY_TYPE_SINGLE_THREADED, None)
                .context("creating Direct2D factory")?;
            let dwrite: IDWriteFactory = DWriteCreateFactory(DWRITE_FACTORY_TYPE_SHARED)
                .context("creating DirectWrite factory")?;
            let instance: HINSTANCE = GetModuleHandleW(None).context("GetModuleHandleW")?.into();

            let wc = WNDCLASSW {
                lpfnWndProc: Some(popup_proc),
                hInstance: instance,
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                anyhow::bail!("RegisterClassW failed for the popup window class");
            }

            Ok(Self { d2d, text: TextEngine { factory: dwrite }, instance })
        }
    }
}

impl SurfaceFactory for LayeredFactory {
    fn create(&mut self, id: usize, click: ClickPolicy) -> anyhow::Result<Box<dyn Surface>> {
        let mut ex_style = WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW;
        if click == ClickPolicy::ClickThrough {
            ex_style |= WS_EX_TRANSPARENT;
        }
        let click_code = match click {
            ClickPolicy::ClickThrough => CLICK_THROUGH,
            ClickPolicy::Move => CLICK_MOVE,
            ClickPolicy::Dismiss => CLICK_DISMISS,
        };

        unsafe {
            let hwnd = CreateWindowExW(
                ex_style,
                CLASS_NAME,
                w!("KeyHud"),
                WS_POPUP,
                0,
                0,
                1,
                1,
                None,
                None,
                Some(self.instance),
                None,
            )
            .context("creating popup window")?;
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, ((id as isize) << 2) | click_code);

            Ok(Box::new(LayeredSurface {
                hwnd,
                d2d: self.d2d.clone(),
                text: self.text.clone(),
            }))
        }
    }
}

struct LayeredSurface {
    hwnd: HWND,
    d2d: ID2D1Factory,
    text: TextEngine,
}

impl LayeredSurface {
    /// Paints into a fresh DIB selected into `mem_dc` and hands it to the window.
    unsafe fn blit(
        &self,
        screen_dc: HDC,
        mem_dc: HDC,
        frame: &Frame,
        paint: &dyn Fn(&mut dyn Canvas),
    ) -> anyhow::Result<()> {
        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: frame.width,
                biHeight: -frame.height, // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
        let bitmap = CreateDIBSection(Some(mem_dc), &bmi, DIB_RGB_COLORS, &mut bits, None, 0)
            .context("allocating popup bitmap")?;
        if bits.is_null() {
            let _ = DeleteObject(bitmap.into());
            anyhow::bail!("popup bitmap has no pixels");
        }
        let old = SelectObject(mem_dc, bitmap.into());

        let result = self.render(mem_dc, frame, paint).and_then(|()| {
            let blend = BLENDFUNCTION {
                BlendOp: 0, // AC_SRC_OVER
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: 1, // AC_SRC_ALPHA
            };
            UpdateLayeredWindow(
                self.hwnd,
                Some(screen_dc),
                Some(&POINT { x: frame.left, y: frame.top }),
                Some(&SIZE { cx: frame.width, cy: frame.height }),
                Some(mem_dc),
                Some(&POINT { x: 0, y: 0 }),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            )
            .context("UpdateLayeredWindow")
        });

        SelectObject(mem_dc, old);
        let _ = DeleteObject(bitmap.into());
        result
    }

    unsafe fn render(
        &self,
        mem_dc: HDC,
        frame: &Frame,
        paint: &dyn Fn(&mut dyn Canvas),
    ) -> anyhow::Result<()> {
        // Target DPI = screen DPI, so painters draw in 96-DPI units.
        let props = D2D1_RENDER_TARGET_PROPERTIES {
            r#type: D2D1_RENDER_TARGET_TYPE_DEFAULT,
            pixelFormat: D2D1_PIXEL_FORMAT {
                format: DXGI_FORMAT_B8G8R8A8_UNORM,
                alphaMode: D2D1_ALPHA_MODE_PREMULTIPLIED,
            },
            dpiX: frame.dpi as f32,
            dpiY: frame.dpi as f32,
            usage: D2D1_RENDER_TARGET_USAGE_NONE,
            minLevel: Default::default(),
        };
        let dc_rt: ID2D1DCRenderTarget = self
            .d2d
            .CreateDCRenderTarget(&props)
            .context("creating render target")?;
        let rect = RECT { left: 0, top: 0, right: frame.width, bottom: frame.height };
        dc_rt.BindDC(mem_dc, &rect).context("binding render target")?;

        let rt: ID2D1RenderTarget = dc_rt.into();
        rt.BeginDraw();
        rt.Clear(Some(&D2D1_COLOR_F { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }));
        let mut canvas = D2dCanvas { rt: &rt, text: &self.text, clipped: false };
        paint(&mut canvas);
        canvas.unclip();
        rt.EndDraw(None, None).context("painting popup")?;
        Ok(())
    }
}

impl Surface for LayeredSurface {
    fn present(&mut self, frame: &Frame, paint: &dyn Fn(&mut dyn Canvas)) -> anyhow::Result<()> {
        unsafe {
            let screen_dc = GetDC(None);
            let mem_dc = CreateCompatibleDC(Some(screen_dc));
            let result = self.blit(screen_dc, mem_dc, frame, paint);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);
            result
        }
    }

    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
            let _ = SetWindowPos(
                self.hwnd,
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            );
        }
    }

    fn hide(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }

    fn metrics(&self) -> &dyn TextMeasure {
        &self.text
    }
}

impl Drop for LayeredSurface {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

// ── canvas ────────────────────────────────────────────────────────────────────

struct D2dCanvas<'a> {
    rt: &'a ID2D1RenderTarget,
    text: &'a TextEngine,
    clipped: bool,
}

impl D2dCanvas<'_> {
    fn brush(&self, color: Color) -> Option<ID2D1SolidColorBrush> {
        // Brushes take straight alpha; the target stores premultiplied pixels.
        let color = D2D1_COLOR_F {
            r: f32::from(color.r) / 255.0,
            g: f32::from(color.g) / 255.0,
            b: f32::from(color.b) / 255.0,
            a: f32::from(color.a) / 255.0,
        };
        unsafe { self.rt.CreateSolidColorBrush(&color, None).ok() }
    }

    fn unclip(&mut self) {
        if self.clipped {
            unsafe { self.rt.PopAxisAlignedClip() };
            self.clipped = false;
        }
    }
}

fn d2d_rect(r: Rect) -> D2D_RECT_F {
    D2D_RECT_F { left: r.x, top: r.y, right: r.right(), bottom: r.bottom() }
}

impl TextMeasure for D2dCanvas<'_> {
    fn measure_text(&self, text: &str, font: &Font) -> TextSize {
        self.text.measure_text(text, font)
    }
}

impl Canvas for D2dCanvas<'_> {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if let Some(brush) = self.brush(color) {
            unsafe { self.rt.FillRectangle(&d2d_rect(rect), &brush) };
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        if let Some(brush) = self.brush(color) {
            unsafe { self.rt.DrawRectangle(&d2d_rect(rect), &brush, width, None) };
        }
    }

    fn draw_text(&mut self, text: &str, font: &Font, x: f32, y: f32, color: Color) {
        let Some(brush) = self.brush(color) else { return };
        match self.text.layout(text, font) {
            Ok(layout) => unsafe {
                self.rt.DrawTextLayout(
                    Vector2 { X: x, Y: y },
                    &layout,
                    &brush,
                    D2D1_DRAW_TEXT_OPTIONS_NONE,
                );
            },
            Err(e) => warn!(error = %e, "text layout failed"),
        }
    }

    fn set_clip(&mut self, rect: Option<Rect>) {
        self.unclip();
        if let Some(rect) = rect {
            unsafe {
                self.rt
                    .PushAxisAlignedClip(&d2d_rect(rect), D2D1_ANTIALIAS_MODE_ALIASED)
            };
            self.clipped = true;
        }
    }
}
