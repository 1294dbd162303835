//! The real collaborators: WMI and DDC/CI brightness, installed keyboard layouts and the
//! monitor topology.
pub mod brightness;
pub mod layouts;
#[cfg(windows)]
pub mod screens;

use std::sync::{Arc, OnceLock};

use crate::modules::brightness::BrightnessControl;
use crate::modules::keyboard_layout::LayoutProvider;
use crate::modules::Collaborators;
use crate::overlay::ScreenTopology;

use self::brightness::FirstAvailable;
use self::layouts::InstalledLayouts;

/// Collaborators backed by the operating system.  Keyboard layouts are enumerated
/// on first use and shared by every module afterwards.
#[derive(Default)]
pub struct System {
    layouts: OnceLock<Arc<InstalledLayouts>>,
}

impl Collaborators for System {
    fn brightness(&self, ddc_step: u8) -> Arc<dyn BrightnessControl> {
        Arc::new(FirstAvailable::system(ddc_step))
    }

    fn layouts(&self) -> Arc<dyn LayoutProvider> {
        self.layouts
            .get_or_init(|| Arc::new(InstalledLayouts::enumerate()))
            .clone()
    }
}

/// Screen topology for the overlay host.  Without a desktop API this is a single
/// 1920×1080 screen at 96 DPI.
pub fn topology() -> Arc<dyn ScreenTopology> {
    #[cfg(windows)]
    {
        screens::enable_dpi_awareness();
        Arc::new(screens::SystemTopology)
    }
    #[cfg(not(windows))]
    {
        Arc::new(crate::overlay::StaticTopology::single(1920, 1080))
    }
}
