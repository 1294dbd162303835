//! Monitor brightness: WMI for panels the firmware exposes (laptop screens), DDC/CI
//! for external monitors.
//!
//! [`FirstAvailable`] tries the backends in order for every call, so a machine with
//! both kinds of display steps the internal panel and falls back to DDC/CI only when
//! WMI has nothing to offer.
//!
//! Handles are opened for every query and released straight after, so a monitor
//! that is replugged between two presses is picked up again.
//!
//! On non-Windows platforms every call fails; the brightness module then logs the
//! failure and shows nothing.
use std::sync::Arc;

use anyhow::anyhow;

use crate::modules::brightness::BrightnessControl;

/// Levels from `min` to `max` (inclusive) every `step`, always ending on `max`.
pub fn ddc_levels(min: u32, max: u32, step: u8) -> Vec<u8> {
    let (min, max) = (min.min(255) as u8, max.min(255) as u8);
    if max < min {
        return Vec::new();
    }
    let mut levels: Vec<u8> = (min..=max).step_by(usize::from(step.max(1))).collect();
    if levels.last() != Some(&max) {
        levels.push(max);
    }
    levels
}

/// Named backends, asked in order.  Each call is answered by the first backend
/// that succeeds.
pub struct FirstAvailable {
    backends: Vec<(&'static str, Arc<dyn BrightnessControl>)>,
}

impl FirstAvailable {
    pub fn new(backends: Vec<(&'static str, Arc<dyn BrightnessControl>)>) -> Self {
        Self { backends }
    }

    /// WMI first, then DDC/CI with `ddc_step` between generated levels.
    pub fn system(ddc_step: u8) -> Self {
        Self::new(vec![
            ("wmi", Arc::new(WmiBrightness)),
            ("ddc/ci", Arc::new(DdcBrightness::new(ddc_step))),
        ])
    }

    fn first<T>(&self, what: &str, call: impl Fn(&dyn BrightnessControl) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let mut failures = Vec::with_capacity(self.backends.len());
        for (name, backend) in &self.backends {
            match call(backend.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(backend = name, error = %format!("{e:#}"), "brightness {what} failed");
                    failures.push(format!("{name}: {e:#}"));
                }
            }
        }
        Err(anyhow!("no brightness backend answered: {}", failures.join("; ")))
    }
}

impl BrightnessControl for FirstAvailable {
    fn levels(&self) -> anyhow::Result<Vec<u8>> {
        self.first("level query", |b| b.levels())
    }

    fn current(&self) -> anyhow::Result<u8> {
        self.first("current query", |b| b.current())
    }

    fn set_level(&self, level: u8) -> anyhow::Result<()> {
        self.first("update", |b| b.set_level(level))
    }
}

/// The `WmiMonitorBrightness` level table of the active panel.
pub struct WmiBrightness;

impl BrightnessControl for WmiBrightness {
    fn levels(&self) -> anyhow::Result<Vec<u8>> {
        let (levels, _) = wmi::query()?;
        Ok(levels)
    }

    fn current(&self) -> anyhow::Result<u8> {
        let (_, current) = wmi::query()?;
        Ok(current)
    }

    fn set_level(&self, level: u8) -> anyhow::Result<()> {
        wmi::set(level)
    }
}

/// Brightness of the primary display's physical monitors.
pub struct DdcBrightness {
    step: u8,
}

impl DdcBrightness {
    pub fn new(step: u8) -> Self {
        Self { step }
    }
}

impl BrightnessControl for DdcBrightness {
    fn levels(&self) -> anyhow::Result<Vec<u8>> {
        let (min, _, max) = ddc::query()?;
        Ok(ddc_levels(min, max, self.step))
    }

    fn current(&self) -> anyhow::Result<u8> {
        let (_, current, _) = ddc::query()?;
        Ok(current.min(255) as u8)
    }

    fn set_level(&self, level: u8) -> anyhow::Result<()> {
        ddc::set(u32::from(level))
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod wmi {
    use anyhow::{bail, ensure, Context, Result};
    use windows::core::{w, BSTR, PCWSTR};
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER,
        COINIT_MULTITHREADED, SAFEARRAY,
    };
    use windows::Win32::System::Variant::{VariantClear, VARIANT, VT_ARRAY, VT_BSTR, VT_I4, VT_UI1};
    use windows::Win32::System::Wmi::{
        IWbemClassObject, IWbemLocator, IWbemServices, WbemLocator, WBEM_FLAG_FORWARD_ONLY,
        WBEM_FLAG_RETURN_IMMEDIATELY, WBEM_GENERIC_FLAG_TYPE, WBEM_INFINITE,
    };

    /// COM for the current (worker) thread; uninitialised on drop when this call
    /// initialised it.
    struct Apartment(bool);

    impl Apartment {
        fn enter() -> Self {
            // RPC_E_CHANGED_MODE means the thread already has COM; use it as is.
            Self(unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.is_ok())
        }
    }

    impl Drop for Apartment {
        fn drop(&mut self) {
            if self.0 {
                unsafe { CoUninitialize() };
            }
        }
    }

    /// A property value read from a WMI object; cleared on drop.
    struct Value(VARIANT);

    impl Value {
        fn read(object: &IWbemClassObject, name: PCWSTR) -> Result<Self> {
            let mut value = Value(VARIANT::default());
            unsafe { object.Get(name, 0, &mut value.0, None, None) }
                .with_context(|| format!("reading {}", unsafe { name.display() }))?;
            Ok(value)
        }

        fn vt(&self) -> u16 {
            unsafe { self.0.Anonymous.Anonymous.vt.0 }
        }

        fn byte(&self) -> Result<u8> {
            ensure!(self.vt() == VT_UI1.0, "expected a byte, got variant type {}", self.vt());
            Ok(unsafe { self.0.Anonymous.Anonymous.Anonymous.bVal })
        }

        fn bytes(&self) -> Result<Vec<u8>> {
            ensure!(
                self.vt() == (VT_ARRAY.0 | VT_UI1.0),
                "expected a byte array, got variant type {}",
                self.vt()
            );
            unsafe {
                let array: *const SAFEARRAY = self.0.Anonymous.Anonymous.Anonymous.parray;
                ensure!(!array.is_null() && (*array).cDims == 1, "malformed level array");
                let len = (*array).rgsabound[0].cElements as usize;
                let data = (*array).pvData as *const u8;
                ensure!(len == 0 || !data.is_null(), "malformed level array");
                Ok(if len == 0 { Vec::new() } else { std::slice::from_raw_parts(data, len).to_vec() })
            }
        }

        fn string(&self) -> Result<BSTR> {
            ensure!(self.vt() == VT_BSTR.0, "expected a string, got variant type {}", self.vt());
            Ok(unsafe { BSTR::clone(&self.0.Anonymous.Anonymous.Anonymous.bstrVal) })
        }
    }

    impl Drop for Value {
        fn drop(&mut self) {
            unsafe {
                let _ = VariantClear(&mut self.0);
            }
        }
    }

    fn int_value(v: i32) -> VARIANT {
        let mut var = VARIANT::default();
        unsafe {
            (*var.Anonymous.Anonymous).vt = VT_I4;
            (*var.Anonymous.Anonymous).Anonymous.lVal = v;
        }
        var
    }

    fn byte_value(v: u8) -> VARIANT {
        let mut var = VARIANT::default();
        unsafe {
            (*var.Anonymous.Anonymous).vt = VT_UI1;
            (*var.Anonymous.Anonymous).Anonymous.bVal = v;
        }
        var
    }

    fn connect() -> Result<IWbemServices> {
        unsafe {
            let locator: IWbemLocator = CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER)
                .context("creating the WMI locator")?;
            locator
                .ConnectServer(
                    &BSTR::from("ROOT\\WMI"),
                    &BSTR::new(),
                    &BSTR::new(),
                    &BSTR::new(),
                    0,
                    &BSTR::new(),
                    None,
                )
                .context("connecting to ROOT\\WMI")
        }
    }

    /// First active instance of `class`.
    fn active_instance(services: &IWbemServices, class: &str) -> Result<IWbemClassObject> {
        let query = BSTR::from(format!("SELECT * FROM {class} WHERE Active = TRUE"));
        let flags = WBEM_GENERIC_FLAG_TYPE(WBEM_FLAG_FORWARD_ONLY.0 | WBEM_FLAG_RETURN_IMMEDIATELY.0);
        unsafe {
            let rows = services
                .ExecQuery(&BSTR::from("WQL"), &query, flags, None)
                .with_context(|| format!("querying {class}"))?;
            let mut row = [None];
            let mut returned = 0u32;
            rows.Next(WBEM_INFINITE.0, &mut row, &mut returned)
                .ok()
                .with_context(|| format!("reading {class}"))?;
            match row {
                [Some(object)] if returned == 1 => Ok(object),
                _ => bail!("no active {class} instance"),
            }
        }
    }

    /// `(levels, current)` of the active panel.
    pub fn query() -> Result<(Vec<u8>, u8)> {
        let _com = Apartment::enter();
        let services = connect()?;
        let panel = active_instance(&services, "WmiMonitorBrightness")?;
        let levels = Value::read(&panel, w!("Level"))?.bytes()?;
        let current = Value::read(&panel, w!("CurrentBrightness"))?.byte()?;
        Ok((levels, current))
    }

    pub fn set(level: u8) -> Result<()> {
        let _com = Apartment::enter();
        let services = connect()?;
        let methods = active_instance(&services, "WmiMonitorBrightnessMethods")?;
        let path = Value::read(&methods, w!("__PATH"))?.string()?;
        unsafe {
            let mut class = None;
            services
                .GetObject(
                    &BSTR::from("WmiMonitorBrightnessMethods"),
                    WBEM_GENERIC_FLAG_TYPE(0),
                    None,
                    Some(&mut class as *mut _),
                    None,
                )
                .context("loading WmiMonitorBrightnessMethods")?;
            let class: IWbemClassObject = class.context("WmiMonitorBrightnessMethods has no class object")?;

            let mut signature = None;
            class
                .GetMethod(w!("WmiSetBrightness"), 0, &mut signature, std::ptr::null_mut())
                .context("looking up WmiSetBrightness")?;
            let signature = signature.context("WmiSetBrightness has no input signature")?;
            let params = signature.SpawnInstance(0).context("building WmiSetBrightness arguments")?;

            let mut timeout = int_value(1);
            let mut brightness = byte_value(level);
            params.Put(w!("Timeout"), 0, &timeout, 0).context("setting Timeout")?;
            params.Put(w!("Brightness"), 0, &brightness, 0).context("setting Brightness")?;
            let _ = VariantClear(&mut timeout);
            let _ = VariantClear(&mut brightness);

            services
                .ExecMethod(&path, &BSTR::from("WmiSetBrightness"), WBEM_GENERIC_FLAG_TYPE(0), None, &params, None, None)
                .with_context(|| format!("setting panel brightness to {level}"))
        }
    }
}

#[cfg(windows)]
mod ddc {
    use anyhow::{bail, ensure, Context, Result};
    use windows::Win32::Devices::Display::{
        DestroyPhysicalMonitors, GetMonitorBrightness, GetNumberOfPhysicalMonitorsFromHMONITOR,
        GetPhysicalMonitorsFromHMONITOR, SetMonitorBrightness, PHYSICAL_MONITOR,
    };
    use windows::Win32::Foundation::POINT;
    use windows::Win32::Graphics::Gdi::{MonitorFromPoint, MONITOR_DEFAULTTOPRIMARY};

    /// Physical monitors behind the primary display; destroyed on drop.
    struct PhysicalMonitors(Vec<PHYSICAL_MONITOR>);

    impl PhysicalMonitors {
        fn primary() -> Result<Self> {
            unsafe {
                let hmonitor = MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY);
                let mut count = 0u32;
                GetNumberOfPhysicalMonitorsFromHMONITOR(hmonitor, &mut count)
                    .context("GetNumberOfPhysicalMonitorsFromHMONITOR")?;
                ensure!(count > 0, "primary display has no physical monitors");
                let mut monitors = vec![PHYSICAL_MONITOR::default(); count as usize];
                GetPhysicalMonitorsFromHMONITOR(hmonitor, &mut monitors)
                    .context("GetPhysicalMonitorsFromHMONITOR")?;
                Ok(Self(monitors))
            }
        }
    }

    impl Drop for PhysicalMonitors {
        fn drop(&mut self) {
            unsafe {
                let _ = DestroyPhysicalMonitors(&self.0);
            }
        }
    }

    /// `(min, current, max)` of the first monitor that answers.
    pub fn query() -> Result<(u32, u32, u32)> {
        let monitors = PhysicalMonitors::primary()?;
        for m in &monitors.0 {
            let (mut min, mut cur, mut max) = (0u32, 0u32, 0u32);
            if unsafe { GetMonitorBrightness(m.hPhysicalMonitor, &mut min, &mut cur, &mut max) } != 0 {
                return Ok((min, cur, max));
            }
        }
        bail!("no monitor on the primary display answers DDC/CI brightness queries")
    }

    pub fn set(level: u32) -> Result<()> {
        let monitors = PhysicalMonitors::primary()?;
        let mut applied = 0;
        for m in &monitors.0 {
            if unsafe { SetMonitorBrightness(m.hPhysicalMonitor, level) } != 0 {
                applied += 1;
            }
        }
        ensure!(applied > 0, "no monitor on the primary display accepted brightness {level}");
        Ok(())
    }
}

#[cfg(not(windows))]
mod wmi {
    use anyhow::{bail, Result};

    pub fn query() -> Result<(Vec<u8>, u8)> {
        bail!("WMI brightness is only available on Windows")
    }

    pub fn set(_level: u8) -> Result<()> {
        bail!("WMI brightness is only available on Windows")
    }
}

#[cfg(not(windows))]
mod ddc {
    use anyhow::{bail, Result};

    pub fn query() -> Result<(u32, u32, u32)> {
        bail!("DDC/CI brightness is only available on Windows")
    }

    pub fn set(_level: u32) -> Result<()> {
        bail!("DDC/CI brightness is only available on Windows")
    }
}
