//! Installed keyboard layouts, enumerated once at startup.
//!
//! Each layout is named after its registry `Layout Text` followed by its KLID, e.g.
//! `US (00000409)`, so patterns can match either part.
use crate::modules::keyboard_layout::{LayoutInfo, LayoutProvider};

pub struct InstalledLayouts {
    layouts: Vec<LayoutInfo>,
}

impl InstalledLayouts {
    pub fn enumerate() -> Self {
        let layouts = imp::enumerate();
        for layout in &layouts {
            tracing::debug!(handle = format_args!("{:#x}", layout.handle), name = %layout.name, "layout installed");
        }
        tracing::info!(count = layouts.len(), "keyboard layouts enumerated");
        Self { layouts }
    }
}

impl LayoutProvider for InstalledLayouts {
    fn installed(&self) -> &[LayoutInfo] {
        &self.layouts
    }

    fn activate_for_foreground(&self, layout: &LayoutInfo) -> anyhow::Result<()> {
        imp::activate_for_foreground(layout.handle)
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use anyhow::{ensure, Context, Result};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{ERROR_SUCCESS, LPARAM, WPARAM};
    use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        ActivateKeyboardLayout, GetKeyboardLayout, GetKeyboardLayoutList, GetKeyboardLayoutNameW,
        HKL, KLF_SETFORPROCESS,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetAncestor, GetForegroundWindow, PostMessageW, GA_ROOTOWNER, WM_INPUTLANGCHANGEREQUEST,
    };

    use crate::modules::keyboard_layout::LayoutInfo;

    const LAYOUTS_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Keyboard Layouts";

    /// Converts a Rust `&str` to a null-terminated UTF-16 `Vec<u16>`.
    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn from_wide(buf: &[u16]) -> String {
        let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..end])
    }

    /// `Layout Text` of the layout with this KLID, if the registry has one.
    fn layout_text(klid: &str) -> Option<String> {
        let key = to_wide(&format!(r"{LAYOUTS_KEY}\{klid}"));
        let value = to_wide("Layout Text");
        let mut buf = [0u16; 256];
        let mut len = std::mem::size_of_val(&buf) as u32;
        let err = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                PCWSTR::from_raw(key.as_ptr()),
                PCWSTR::from_raw(value.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr().cast()),
                Some(&mut len as *mut u32),
            )
        };
        (err == ERROR_SUCCESS).then(|| from_wide(&buf))
    }

    /// The KLID is only reported for the active layout, so each one is activated
    /// for this process in turn and the original is restored afterwards.
    pub fn enumerate() -> Vec<LayoutInfo> {
        unsafe {
            let was = GetKeyboardLayout(0);
            let count = GetKeyboardLayoutList(None).max(0) as usize;
            let mut handles = vec![HKL::default(); count];
            let filled = GetKeyboardLayoutList(Some(&mut handles)).max(0) as usize;
            handles.truncate(filled);

            let layouts = handles
                .into_iter()
                .map(|hkl| {
                    let _ = ActivateKeyboardLayout(hkl, KLF_SETFORPROCESS);
                    let mut klid = [0u16; 9];
                    let klid = match GetKeyboardLayoutNameW(&mut klid) {
                        Ok(()) => from_wide(&klid),
                        Err(_) => format!("{:08X}", hkl.0 as usize & 0xFFFF),
                    };
                    let text = layout_text(&klid).unwrap_or_else(|| "n/a".to_owned());
                    LayoutInfo { handle: hkl.0 as isize, name: format!("{text} ({klid})") }
                })
                .collect();

            let _ = ActivateKeyboardLayout(was, KLF_SETFORPROCESS);
            layouts
        }
    }

    /// Posts the switch request to the foreground window's root owner, since child
    /// dialogs share their owner's input context.
    pub fn activate_for_foreground(handle: isize) -> Result<()> {
        unsafe {
            let foreground = GetForegroundWindow();
            ensure!(!foreground.is_invalid(), "no foreground window");
            let owner = GetAncestor(foreground, GA_ROOTOWNER);
            PostMessageW(Some(owner), WM_INPUTLANGCHANGEREQUEST, WPARAM(0), LPARAM(handle))
                .context("PostMessageW(WM_INPUTLANGCHANGEREQUEST)")
        }
    }
}

#[cfg(not(windows))]
mod imp {
    use crate::modules::keyboard_layout::LayoutInfo;

    pub fn enumerate() -> Vec<LayoutInfo> {
        Vec::new()
    }

    pub fn activate_for_foreground(_handle: isize) -> anyhow::Result<()> {
        anyhow::bail!("keyboard layout switching is only available on Windows")
    }
}
